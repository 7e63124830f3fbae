use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use disquer::proto::frame::Frame;
use disquer::{Address, Cmd, Connection, Error};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Reads one request off the socket. Requests are tiny, a single read is
/// enough in-process.
async fn read_request(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await.unwrap();
    buf.truncate(n);
    buf
}

/// Keeps the read side open until the peer goes away, so a half-closed
/// socket is observed as EOF rather than a reset.
async fn drain_until_peer_closes(stream: &mut TcpStream) {
    let mut buf = [0u8; 1024];
    while stream.read(&mut buf).await.map(|n| n > 0).unwrap_or(false) {}
}

#[tokio::test]
async fn test_send_decodes_reply() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        assert_eq!(request, b"*2\r\n$4\r\nECHO\r\n$5\r\nhello\r\n");
        stream.write_all(b"$5\r\nhello\r\n").await.unwrap();
    });

    let mut conn = Connection::connect(&Address::from(port)).await.unwrap();
    assert!(!conn.is_closed());
    let reply = conn.send(&Cmd::new("ECHO").arg("hello")).await.unwrap();
    assert_eq!(reply, Frame::BulkString(Some("hello".into())));
    server.await.unwrap();
}

#[tokio::test]
async fn test_send_reassembles_split_reply() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        // dribble the reply out in pieces
        stream.write_all(b"*2\r\n$3\r\nfo").await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        stream.write_all(b"o\r\n$3\r\nbar\r\n").await.unwrap();
    });

    let mut conn = Connection::connect(&Address::from(port)).await.unwrap();
    let reply = conn.send(&Cmd::new("PING")).await.unwrap();
    assert_eq!(
        reply,
        Frame::Array(vec![
            Frame::BulkString(Some("foo".into())),
            Frame::BulkString(Some("bar".into())),
        ])
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_half_close_detected_on_send() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        // end our stream without replying
        stream.shutdown().await.unwrap();
        drain_until_peer_closes(&mut stream).await;
    });

    let mut conn = Connection::connect(&Address::from(port)).await.unwrap();
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_in_listener = fired.clone();
    conn.on_close(move || {
        fired_in_listener.fetch_add(1, Ordering::SeqCst);
    });

    let err = conn.send(&Cmd::new("PING")).await.unwrap_err();
    assert!(matches!(err, Error::Closed));
    // closed reports true without any further call
    assert!(conn.is_closed());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    server.await.unwrap();
}

#[tokio::test]
async fn test_protocol_error_kills_the_connection() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        stream.write_all(b"!not a valid frame\r\n").await.unwrap();
        drain_until_peer_closes(&mut stream).await;
    });

    let mut conn = Connection::connect(&Address::from(port)).await.unwrap();
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_in_listener = fired.clone();
    conn.on_close(move || {
        fired_in_listener.fetch_add(1, Ordering::SeqCst);
    });

    let err = conn.send(&Cmd::new("PING")).await.unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }));

    // never silently resumes: the connection is dead now
    let err = conn.send(&Cmd::new("PING")).await.unwrap_err();
    assert!(matches!(err, Error::Closed));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    server.await.unwrap();
}

#[tokio::test]
async fn test_close_is_idempotent_and_listeners_fire_once() {
    let (listener, port) = bind().await;
    let _guard = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        drain_until_peer_closes(&mut stream).await;
    });

    let mut conn = Connection::connect(&Address::from(port)).await.unwrap();
    let fired = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let fired = fired.clone();
        conn.on_close(move || {
            fired.fetch_add(1, Ordering::SeqCst);
        });
    }

    conn.close();
    conn.close();
    assert!(conn.is_closed());
    assert_eq!(fired.load(Ordering::SeqCst), 2);

    let err = conn.send(&Cmd::new("PING")).await.unwrap_err();
    assert!(matches!(err, Error::Closed));
}

#[tokio::test]
async fn test_listener_registered_after_close_fires_immediately() {
    let (listener, port) = bind().await;
    let _guard = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        drain_until_peer_closes(&mut stream).await;
    });

    let mut conn = Connection::connect(&Address::from(port)).await.unwrap();
    conn.close();

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_in_listener = fired.clone();
    conn.on_close(move || {
        fired_in_listener.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_last_reply_honored_when_peer_closes_after_replying() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        stream.write_all(b"+PONG\r\n").await.unwrap();
        stream.shutdown().await.unwrap();
        drain_until_peer_closes(&mut stream).await;
    });

    let mut conn = Connection::connect(&Address::from(port)).await.unwrap();
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_in_listener = fired.clone();
    conn.on_close(move || {
        fired_in_listener.fetch_add(1, Ordering::SeqCst);
    });

    // the reply arrives even though the peer is going away
    let reply = conn.send(&Cmd::new("PING")).await.unwrap();
    assert_eq!(reply, Frame::SimpleString(b"PONG".to_vec()));

    // the closed query eventually observes the dead peer
    let mut observed = false;
    for _ in 0..100 {
        if conn.is_closed() {
            observed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(observed, "is_closed never reported the dead peer");
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    server.await.unwrap();
}

#[tokio::test]
async fn test_error_reply_leaves_connection_usable() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        stream
            .write_all(b"-NOREPL Not enough reachable nodes\r\n")
            .await
            .unwrap();
        read_request(&mut stream).await;
        stream.write_all(b"+PONG\r\n").await.unwrap();
    });

    let mut conn = Connection::connect(&Address::from(port)).await.unwrap();
    let err = conn.send(&Cmd::new("ADDJOB")).await.unwrap_err();
    match err {
        Error::Server { message } => assert!(message.starts_with("NOREPL")),
        other => panic!("expected Server error, got {other:?}"),
    }

    // valid protocol: the connection stays open
    let reply = conn.send(&Cmd::new("PING")).await.unwrap();
    assert_eq!(reply, Frame::SimpleString(b"PONG".to_vec()));
    server.await.unwrap();
}

#[tokio::test]
async fn test_read_timeout_closes_the_connection() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        // never reply
        drain_until_peer_closes(&mut stream).await;
    });

    let mut conn = Connection::connect(&Address::from(port))
        .await
        .unwrap()
        .with_timeouts(Some(Duration::from_millis(50)), None);

    let err = conn.send(&Cmd::new("PING")).await.unwrap_err();
    assert!(matches!(err, Error::Timeout));
    assert!(conn.is_closed());
    server.await.unwrap();
}

#[tokio::test]
async fn test_connect_refused_is_distinguished() {
    let (listener, port) = bind().await;
    drop(listener);

    let err = Connection::connect(&Address::from(port)).await.unwrap_err();
    assert!(matches!(err, Error::ConnectionRefused));
}
