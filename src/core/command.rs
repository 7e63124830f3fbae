use std::collections::HashMap;

use crate::core::job::Job;
use crate::proto::codec::Arg;
use crate::proto::error::Error;
use crate::proto::frame::Frame;

/// A command ready to be sent to the server.
///
/// Commands are flat argument lists built with the builder pattern; the
/// connection encodes them into the wire framing.
///
/// # Example
///
/// ```
/// use disquer::Cmd;
///
/// let cmd = Cmd::new("QLEN").arg("orders");
/// ```
#[derive(Debug, Clone)]
pub struct Cmd {
    args: Vec<Arg>,
}

impl Cmd {
    /// Creates a new command with the given name.
    #[inline]
    pub fn new(name: impl Into<Arg>) -> Self {
        Self {
            args: vec![name.into()],
        }
    }

    /// Appends an argument to the command.
    #[inline]
    pub fn arg<T: Into<Arg>>(mut self, arg: T) -> Self {
        self.args.push(arg.into());
        self
    }

    pub(crate) fn args(&self) -> &[Arg] {
        &self.args
    }
}

/// Optional ADDJOB parameters. Absent options are omitted from the wire
/// entirely, never sent as empty or sentinel tokens.
#[derive(Debug, Default, Clone)]
pub struct AddJobOptions {
    /// `REPLICATE <n>` — number of nodes the job should be replicated to.
    pub replicate: Option<u32>,
    /// `DELAY <sec>` — seconds before the job is queued by any server.
    pub delay: Option<u64>,
    /// `RETRY <sec>` — re-delivery period when no ACK arrives; 0 means
    /// at-most-once delivery.
    pub retry: Option<u64>,
    /// `TTL <sec>` — maximum job lifetime.
    pub ttl: Option<u64>,
    /// `MAXLEN <count>` — refuse the job when the queue already holds this
    /// many messages.
    pub maxlen: Option<u64>,
    /// `ASYNC` — let the command return as soon as possible, replicating in
    /// the background.
    pub asap: bool,
}

/// Optional GETJOB parameters.
#[derive(Debug, Default, Clone)]
pub struct GetJobOptions {
    /// `NOHANG` — do not block when all queues are empty.
    pub nohang: bool,
    /// `TIMEOUT <ms>` — return a nil reply once this elapses.
    pub timeout_ms: Option<u64>,
    /// `COUNT <n>` — return up to `n` jobs per call.
    pub count: Option<u32>,
    /// `WITHCOUNTERS` — attach nack and additional-delivery counters to each
    /// returned job.
    pub withcounters: bool,
}

/// Optional QSCAN parameters.
#[derive(Debug, Default, Clone)]
pub struct QscanOptions {
    /// `COUNT <n>` — a hint about how much work to do per iteration.
    pub count: Option<u32>,
    /// `BUSYLOOP` — block and return all elements in one call.
    pub busyloop: bool,
    /// `MINLEN <n>` — skip queues with fewer jobs queued.
    pub minlen: Option<u64>,
    /// `MAXLEN <n>` — skip queues with more jobs queued.
    pub maxlen: Option<u64>,
    /// `IMPORTRATE <rate>` — only return queues importing jobs at or above
    /// this rate.
    pub import_rate: Option<u64>,
}

/// Optional JSCAN parameters.
#[derive(Debug, Default, Clone)]
pub struct JscanOptions {
    /// `COUNT <n>` — a hint about how much work to do per iteration.
    pub count: Option<u32>,
    /// `BUSYLOOP` — block and return all elements in one call.
    pub busyloop: bool,
    /// `QUEUE <name>` — only return jobs in the given queue.
    pub queue: Option<String>,
    /// `STATE <state>` — repeated for a logical OR over job states.
    pub states: Vec<String>,
}

/// PAUSE directives; several can be combined in one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOption {
    /// Pause the queue for input.
    In,
    /// Pause the queue for output.
    Out,
    /// Pause both directions.
    All,
    /// Clear the paused state.
    None,
    /// Just report the current state.
    State,
    /// Broadcast the change to the whole cluster.
    Bcast,
}

impl PauseOption {
    fn token(self) -> &'static str {
        match self {
            PauseOption::In => "in",
            PauseOption::Out => "out",
            PauseOption::All => "all",
            PauseOption::None => "none",
            PauseOption::State => "state",
            PauseOption::Bcast => "bcast",
        }
    }
}

/// JSCAN reply shape selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JscanReply {
    Id,
    All,
}

/// A HELLO reply: handshake data describing the cluster as seen by the
/// contacted node.
#[derive(Debug, Clone, PartialEq)]
pub struct Hello {
    /// Hello format version.
    pub version: i64,
    /// ID of the node that answered.
    pub node_id: String,
    /// All known nodes; lower priority means more available.
    pub nodes: Vec<HelloNode>,
}

/// One node entry in a HELLO reply.
#[derive(Debug, Clone, PartialEq)]
pub struct HelloNode {
    /// Node ID.
    pub id: String,
    /// Node host or IP.
    pub host: String,
    /// Node port.
    pub port: u16,
    /// Node priority, lower is better.
    pub priority: i64,
}

pub(crate) fn ping() -> Cmd {
    Cmd::new("PING")
}

pub(crate) fn add_job(
    queue: &str,
    body: impl Into<Arg>,
    ms_timeout: u64,
    options: &AddJobOptions,
) -> Cmd {
    let mut cmd = Cmd::new("ADDJOB")
        .arg(queue)
        .arg(body)
        .arg(ms_timeout.to_string());
    if let Some(replicate) = options.replicate {
        cmd = cmd.arg("REPLICATE").arg(replicate);
    }
    if let Some(delay) = options.delay {
        cmd = cmd.arg("DELAY").arg(delay.to_string());
    }
    if let Some(retry) = options.retry {
        cmd = cmd.arg("RETRY").arg(retry.to_string());
    }
    if let Some(ttl) = options.ttl {
        cmd = cmd.arg("TTL").arg(ttl.to_string());
    }
    if let Some(maxlen) = options.maxlen {
        cmd = cmd.arg("MAXLEN").arg(maxlen.to_string());
    }
    if options.asap {
        cmd = cmd.arg("ASYNC");
    }
    cmd
}

pub(crate) fn get_job(queues: &[&str], options: &GetJobOptions) -> Cmd {
    let mut cmd = Cmd::new("GETJOB");
    if options.nohang {
        cmd = cmd.arg("NOHANG");
    }
    if let Some(timeout) = options.timeout_ms {
        cmd = cmd.arg("TIMEOUT").arg(timeout.to_string());
    }
    if let Some(count) = options.count {
        cmd = cmd.arg("COUNT").arg(count);
    }
    if options.withcounters {
        cmd = cmd.arg("WITHCOUNTERS");
    }
    cmd = cmd.arg("FROM");
    for queue in queues {
        cmd = cmd.arg(*queue);
    }
    cmd
}

/// ACKJOB, FASTACK, NACK, ENQUEUE, DEQUEUE and DELJOB all take a bare list
/// of job IDs.
pub(crate) fn job_id_command(name: &'static str, ids: &[String]) -> Cmd {
    let mut cmd = Cmd::new(name);
    for id in ids {
        cmd = cmd.arg(id.as_str());
    }
    cmd
}

pub(crate) fn working(id: &str) -> Cmd {
    Cmd::new("WORKING").arg(id)
}

pub(crate) fn show(id: &str) -> Cmd {
    Cmd::new("SHOW").arg(id)
}

pub(crate) fn info() -> Cmd {
    Cmd::new("INFO")
}

pub(crate) fn hello() -> Cmd {
    Cmd::new("HELLO")
}

pub(crate) fn qlen(queue: &str) -> Cmd {
    Cmd::new("QLEN").arg(queue)
}

pub(crate) fn qstat(queue: &str) -> Cmd {
    Cmd::new("QSTAT").arg(queue)
}

pub(crate) fn qpeek(queue: &str, count: i64) -> Cmd {
    Cmd::new("QPEEK").arg(queue).arg(count)
}

pub(crate) fn pause(queue: &str, options: &[PauseOption]) -> Cmd {
    let mut cmd = Cmd::new("PAUSE").arg(queue);
    for option in options {
        cmd = cmd.arg(option.token());
    }
    cmd
}

pub(crate) fn qscan(cursor: u64, options: &QscanOptions) -> Cmd {
    let mut cmd = Cmd::new("QSCAN").arg(cursor.to_string());
    if let Some(count) = options.count {
        cmd = cmd.arg("COUNT").arg(count);
    }
    if options.busyloop {
        cmd = cmd.arg("BUSYLOOP");
    }
    if let Some(minlen) = options.minlen {
        cmd = cmd.arg("MINLEN").arg(minlen.to_string());
    }
    if let Some(maxlen) = options.maxlen {
        cmd = cmd.arg("MAXLEN").arg(maxlen.to_string());
    }
    if let Some(rate) = options.import_rate {
        cmd = cmd.arg("IMPORTRATE").arg(rate.to_string());
    }
    cmd
}

pub(crate) fn jscan(cursor: u64, options: &JscanOptions, reply: JscanReply) -> Cmd {
    let mut cmd = Cmd::new("JSCAN").arg(cursor.to_string());
    if let Some(count) = options.count {
        cmd = cmd.arg("COUNT").arg(count);
    }
    if options.busyloop {
        cmd = cmd.arg("BUSYLOOP");
    }
    if let Some(queue) = &options.queue {
        cmd = cmd.arg("QUEUE").arg(queue.as_str());
    }
    for state in &options.states {
        cmd = cmd.arg("STATE").arg(state.as_str());
    }
    match reply {
        JscanReply::Id => cmd.arg("REPLY").arg("id"),
        JscanReply::All => cmd.arg("REPLY").arg("all"),
    }
}

// -- reply shaping ----------------------------------------------------------

pub(crate) fn frame_to_text(frame: Frame) -> crate::Result<String> {
    match frame {
        Frame::Error(e) => Err(server_error(&e)),
        frame => frame
            .as_text()
            .ok_or_else(|| Error::protocol("expected a text reply")),
    }
}

pub(crate) fn frame_to_int(frame: Frame) -> crate::Result<i64> {
    match frame {
        Frame::Integer(i) => Ok(i),
        Frame::Error(e) => Err(server_error(&e)),
        _ => Err(Error::protocol("expected an integer reply")),
    }
}

pub(crate) fn frame_expect_array(frame: Frame, what: &str) -> crate::Result<Vec<Frame>> {
    match frame {
        Frame::Array(items) => Ok(items),
        Frame::Error(e) => Err(server_error(&e)),
        _ => Err(Error::protocol(format!("expected an array reply for {what}"))),
    }
}

/// Shapes a GETJOB / QPEEK reply: an array of job records, or nil.
pub(crate) fn frame_to_jobs(frame: Frame) -> crate::Result<Vec<Job>> {
    if frame.is_null() {
        return Ok(Vec::new());
    }
    let records = frame_expect_array(frame, "jobs")?;
    records.into_iter().map(Job::from_record).collect()
}

/// Shapes a scan reply `[cursor, [item, ...]]` into its raw parts.
pub(crate) fn frame_to_scan_page(frame: Frame) -> crate::Result<(u64, Vec<Frame>)> {
    let mut parts = frame_expect_array(frame, "scan")?;
    if parts.len() != 2 {
        return Err(Error::protocol("scan reply must have 2 elements"));
    }
    let items = parts
        .pop()
        .and_then(Frame::into_array)
        .ok_or_else(|| Error::protocol("scan items must be an array"))?;
    let cursor = parts
        .pop()
        .and_then(|f| f.as_text())
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| Error::protocol("invalid scan cursor"))?;
    Ok((cursor, items))
}

/// Shapes an INFO reply: `key:value` lines, `#` section headers skipped.
pub(crate) fn frame_to_info(frame: Frame) -> crate::Result<HashMap<String, String>> {
    let text = frame_to_text(frame)?;
    let mut result = HashMap::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            result.insert(key.to_string(), value.to_string());
        }
    }
    Ok(result)
}

/// Shapes a HELLO reply: version, this node's ID, then one 4-element array
/// per known node.
pub(crate) fn frame_to_hello(frame: Frame) -> crate::Result<Hello> {
    let items = frame_expect_array(frame, "HELLO")?;
    if items.len() < 2 {
        return Err(Error::protocol("HELLO reply too short"));
    }
    let mut items = items.into_iter();
    let version = items
        .next()
        .and_then(|f| f.to_int())
        .ok_or_else(|| Error::protocol("HELLO version must be an integer"))?;
    let node_id = items
        .next()
        .and_then(|f| f.as_text())
        .ok_or_else(|| Error::protocol("HELLO node id must be a string"))?;
    let mut nodes = Vec::new();
    for node in items {
        let fields = node
            .into_array()
            .filter(|fields| fields.len() == 4)
            .ok_or_else(|| Error::protocol("HELLO node entry must have 4 fields"))?;
        let mut texts = fields.iter().map(Frame::as_text);
        let id = texts.next().flatten();
        let host = texts.next().flatten();
        let port = texts.next().flatten().and_then(|p| p.parse::<u16>().ok());
        let priority = texts.next().flatten().and_then(|p| p.parse::<i64>().ok());
        match (id, host, port, priority) {
            (Some(id), Some(host), Some(port), Some(priority)) => nodes.push(HelloNode {
                id,
                host,
                port,
                priority,
            }),
            _ => return Err(Error::protocol("malformed HELLO node entry")),
        }
    }
    Ok(Hello {
        version,
        node_id,
        nodes,
    })
}

/// Shapes a QSTAT reply: alternating key/value pairs, or nil for a queue the
/// node does not currently know about.
pub(crate) fn frame_to_qstat(frame: Frame) -> crate::Result<Option<HashMap<String, Frame>>> {
    if frame.is_null() {
        return Ok(None);
    }
    let pairs = frame_expect_array(frame, "QSTAT")?;
    Ok(Some(pairs_to_map(pairs)?))
}

/// Folds alternating `[key, value, ...]` frames into a map. Keys are kept
/// exactly as the server sends them.
pub(crate) fn pairs_to_map(pairs: Vec<Frame>) -> crate::Result<HashMap<String, Frame>> {
    if pairs.len() % 2 != 0 {
        return Err(Error::protocol("key/value reply with odd element count"));
    }
    let mut map = HashMap::with_capacity(pairs.len() / 2);
    let mut iter = pairs.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        let key = key
            .as_text()
            .ok_or_else(|| Error::protocol("non-text key in key/value reply"))?;
        map.insert(key, value);
    }
    Ok(map)
}

fn server_error(message: &[u8]) -> Error {
    Error::Server {
        message: String::from_utf8_lossy(message).into_owned(),
    }
}
