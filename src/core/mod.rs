//! Core client: connection lifecycle, command construction and the typed
//! facade over the Disque command set.
//!
//! ## Modules
//!
//! - [`connection`] - single connection management
//! - [`command`] - command builders and reply shaping
//! - [`address`] - transport addressing
//! - [`scanner`] - resumable cursor iteration
//! - [`builder`] - client builder

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::proto::error::Error;
use crate::proto::frame::Frame;

pub use crate::proto::error::Result;

/// Transport addressing.
pub mod address;
/// Client builder configuration.
pub mod builder;
/// Command construction and reply shaping.
pub mod command;
/// Low-level connection management.
pub mod connection;
/// Job records.
pub mod job;
/// Cursor scan iteration.
pub mod scanner;

use address::Address;
use command::{
    AddJobOptions, Cmd, GetJobOptions, Hello, JscanOptions, JscanReply, PauseOption, QscanOptions,
};
use connection::Connection;
use job::{Job, JobRef};
use scanner::{JobIdScan, JobScan, JobsIterator, QueueScan, ScanIterator, ScanPage};

/// High-level Disque client.
///
/// Owns one [`Connection`] at a time; when auto-reconnect is enabled a call
/// that fails with [`Error::Closed`] is retried exactly once against a
/// freshly opened connection. No other error kind is ever retried.
///
/// # Example
///
/// ```no_run
/// use disquer::{AddJobOptions, Client, GetJobOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut client = Client::connect("disque://localhost:7711").await?;
///     client.add_job("orders", "payload", 0, &AddJobOptions::default()).await?;
///     let jobs = client.get_job(&["orders"], &GetJobOptions::default()).await?;
///     for job in &jobs {
///         println!("{} from {}", job.id, job.queue);
///     }
///     client.ack_job(&jobs).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Client {
    address: Address,
    connection: Connection,
    auto_reconnect: bool,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl Client {
    pub(crate) async fn connect_inner(
        address: Address,
        auto_reconnect: bool,
        connect_timeout: Option<Duration>,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> Result<Self> {
        let connection = open(&address, connect_timeout, read_timeout, write_timeout).await?;
        Ok(Self {
            address,
            connection,
            auto_reconnect,
            connect_timeout,
            read_timeout,
            write_timeout,
        })
    }

    /// Connects to a Disque server.
    ///
    /// Accepts any form [`Address::parse`] understands, e.g.
    /// `disque://host:port`, `host:port`, a bare port, or a Unix socket
    /// path. Auto-reconnect is off; use [`ClientBuilder`](crate::ClientBuilder)
    /// to opt in.
    pub async fn connect(addr: impl AsRef<str>) -> Result<Self> {
        let address = Address::parse(addr.as_ref())?;
        Self::connect_inner(address, false, None, None, None).await
    }

    /// Returns a builder for configured connections.
    pub fn builder() -> builder::ClientBuilder {
        builder::ClientBuilder::new()
    }

    /// Sends a raw command and returns the raw reply frame.
    ///
    /// On [`Error::Closed`], when auto-reconnect is enabled, opens exactly
    /// one fresh connection and retries the call once.
    pub async fn execute(&mut self, cmd: &Cmd) -> Result<Frame> {
        match self.connection.send(cmd).await {
            Err(Error::Closed) if self.auto_reconnect => {
                debug!(address = %self.address, "connection closed, reconnecting once");
                self.connection = open(
                    &self.address,
                    self.connect_timeout,
                    self.read_timeout,
                    self.write_timeout,
                )
                .await?;
                self.connection.send(cmd).await
            }
            result => result,
        }
    }

    /// Closes the underlying connection. Idempotent; with auto-reconnect
    /// enabled the next call will open a fresh one.
    pub fn close(&mut self) {
        self.connection.close();
    }

    /// True if the underlying connection is closed (probes the peer, see
    /// [`Connection::is_closed`]).
    pub fn is_closed(&mut self) -> bool {
        self.connection.is_closed()
    }

    /// PING the server.
    pub async fn ping(&mut self) -> Result<()> {
        let reply = self.execute(&command::ping()).await?;
        command::frame_to_text(reply)?;
        Ok(())
    }

    /// Adds a job to a queue, returning the job ID.
    ///
    /// `ms_timeout` is the command timeout in milliseconds (0 = server
    /// default); replication, delay, retry, TTL, queue length cap and
    /// async replication come from `options`.
    pub async fn add_job(
        &mut self,
        queue: &str,
        body: impl Into<crate::proto::codec::Arg>,
        ms_timeout: u64,
        options: &AddJobOptions,
    ) -> Result<String> {
        let reply = self
            .execute(&command::add_job(queue, body, ms_timeout, options))
            .await?;
        command::frame_to_text(reply)
    }

    /// Fetches jobs from the given queues.
    ///
    /// Blocks until a job is available unless `options.nohang` or
    /// `options.timeout_ms` says otherwise; a nil reply (timeout reached)
    /// yields an empty vector.
    pub async fn get_job(&mut self, queues: &[&str], options: &GetJobOptions) -> Result<Vec<Job>> {
        if queues.is_empty() {
            return Err(Error::invalid_argument("at least one queue required"));
        }
        let reply = self.execute(&command::get_job(queues, options)).await?;
        command::frame_to_jobs(reply)
    }

    /// Acknowledges jobs, replicating the ACK cluster-wide. Returns the
    /// number of jobs actually acknowledged.
    pub async fn ack_job(&mut self, jobs: &[impl JobRef]) -> Result<i64> {
        self.job_id_call("ACKJOB", jobs).await
    }

    /// Best-effort cluster-wide deletion of jobs; faster than
    /// [`ack_job`](Client::ack_job) but more likely to allow duplicate
    /// deliveries during failures.
    pub async fn fast_ack(&mut self, jobs: &[impl JobRef]) -> Result<i64> {
        self.job_id_call("FASTACK", jobs).await
    }

    /// Puts jobs back into their queue as soon as possible, incrementing
    /// their nack counters.
    pub async fn nack(&mut self, jobs: &[impl JobRef]) -> Result<i64> {
        self.job_id_call("NACK", jobs).await
    }

    /// Queues jobs that are not already queued.
    pub async fn enqueue(&mut self, jobs: &[impl JobRef]) -> Result<i64> {
        self.job_id_call("ENQUEUE", jobs).await
    }

    /// Removes jobs from their queue without acknowledging them.
    pub async fn dequeue(&mut self, jobs: &[impl JobRef]) -> Result<i64> {
        self.job_id_call("DEQUEUE", jobs).await
    }

    /// Deletes jobs from this node only (no cluster bus message).
    pub async fn del_job(&mut self, jobs: &[impl JobRef]) -> Result<i64> {
        self.job_id_call("DELJOB", jobs).await
    }

    /// Claims to still be working on a job, postponing its next delivery.
    /// Returns the number of seconds the visibility was (likely) postponed.
    pub async fn working(&mut self, job: impl JobRef) -> Result<i64> {
        let reply = self.execute(&command::working(job.job_id())).await?;
        command::frame_to_int(reply)
    }

    /// Describes a job, or returns `None` when the node does not know it.
    pub async fn show(&mut self, job: impl JobRef) -> Result<Option<Job>> {
        let reply = self.execute(&command::show(job.job_id())).await?;
        if reply.is_null() {
            return Ok(None);
        }
        let pairs = command::frame_expect_array(reply, "SHOW")?;
        Ok(Some(Job::from_pairs(pairs)?))
    }

    /// Server information and stats as key/value pairs.
    pub async fn info(&mut self) -> Result<HashMap<String, String>> {
        let reply = self.execute(&command::info()).await?;
        command::frame_to_info(reply)
    }

    /// The HELLO handshake: hello format version, the contacted node's ID
    /// and the known cluster members.
    pub async fn hello(&mut self) -> Result<Hello> {
        let reply = self.execute(&command::hello()).await?;
        command::frame_to_hello(reply)
    }

    /// Length of a queue.
    pub async fn qlen(&mut self, queue: &str) -> Result<i64> {
        let reply = self.execute(&command::qlen(queue)).await?;
        command::frame_to_int(reply)
    }

    /// Queue statistics, or `None` when the node currently knows nothing
    /// about the queue (queues are evicted when idle; this does not mean
    /// the cluster holds no jobs for it).
    pub async fn qstat(&mut self, queue: &str) -> Result<Option<HashMap<String, Frame>>> {
        let reply = self.execute(&command::qstat(queue)).await?;
        command::frame_to_qstat(reply)
    }

    /// Returns up to `count` jobs from a queue without consuming them.
    /// A positive count peeks oldest-first, a negative count newest-first.
    pub async fn qpeek(&mut self, queue: &str, count: i64) -> Result<Vec<Job>> {
        let reply = self.execute(&command::qpeek(queue, count)).await?;
        command::frame_to_jobs(reply)
    }

    /// Controls the paused state of a queue. Returns the resulting state.
    pub async fn pause(&mut self, queue: &str, options: &[PauseOption]) -> Result<String> {
        if options.is_empty() {
            return Err(Error::invalid_argument("at least one pause option required"));
        }
        let reply = self.execute(&command::pause(queue, options)).await?;
        command::frame_to_text(reply)
    }

    /// One QSCAN step: queue names at `cursor`, plus the next cursor
    /// (0 = done). First call passes cursor 0. The scan is complete but may
    /// return duplicates.
    pub async fn qscan(&mut self, cursor: u64, options: &QscanOptions) -> Result<ScanPage<String>> {
        let reply = self.execute(&command::qscan(cursor, options)).await?;
        let (cursor, items) = command::frame_to_scan_page(reply)?;
        Ok(ScanPage {
            cursor,
            items: text_items(items)?,
        })
    }

    /// One JSCAN step returning job IDs. Same cursor contract as
    /// [`qscan`](Client::qscan).
    pub async fn jscan(&mut self, cursor: u64, options: &JscanOptions) -> Result<ScanPage<String>> {
        let reply = self
            .execute(&command::jscan(cursor, options, JscanReply::Id))
            .await?;
        let (cursor, items) = command::frame_to_scan_page(reply)?;
        Ok(ScanPage {
            cursor,
            items: text_items(items)?,
        })
    }

    /// One JSCAN step returning full job records (`REPLY all`).
    pub async fn jscan_full(
        &mut self,
        cursor: u64,
        options: &JscanOptions,
    ) -> Result<ScanPage<Job>> {
        let reply = self
            .execute(&command::jscan(cursor, options, JscanReply::All))
            .await?;
        let (cursor, items) = command::frame_to_scan_page(reply)?;
        let items = items
            .into_iter()
            .map(|item| {
                item.into_array()
                    .ok_or_else(|| Error::protocol("JSCAN job entry must be an array"))
                    .and_then(Job::from_pairs)
            })
            .collect::<Result<Vec<Job>>>()?;
        Ok(ScanPage { cursor, items })
    }

    /// Iterates all queue names on the contacted node.
    pub fn qscan_iter(&mut self, options: QscanOptions) -> ScanIterator<QueueScan<'_>> {
        ScanIterator::new(QueueScan::new(self, options))
    }

    /// Iterates job IDs on the contacted node.
    pub fn jscan_iter(&mut self, options: JscanOptions) -> ScanIterator<JobIdScan<'_>> {
        ScanIterator::new(JobIdScan::new(self, options))
    }

    /// Iterates full job records on the contacted node.
    pub fn jscan_full_iter(&mut self, options: JscanOptions) -> ScanIterator<JobScan<'_>> {
        ScanIterator::new(JobScan::new(self, options))
    }

    /// Iterates GETJOB batches from the given queues.
    pub fn jobs_iter(&mut self, queues: &[&str], options: GetJobOptions) -> JobsIterator<'_> {
        JobsIterator::new(self, queues, options)
    }

    async fn job_id_call(&mut self, name: &'static str, jobs: &[impl JobRef]) -> Result<i64> {
        if jobs.is_empty() {
            return Err(Error::invalid_argument("at least one job required"));
        }
        let ids: Vec<String> = jobs.iter().map(|job| job.job_id().to_string()).collect();
        let reply = self.execute(&command::job_id_command(name, &ids)).await?;
        command::frame_to_int(reply)
    }
}

async fn open(
    address: &Address,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
) -> Result<Connection> {
    let connecting = Connection::connect(address);
    let connection = match connect_timeout {
        Some(limit) => tokio::time::timeout(limit, connecting)
            .await
            .map_err(|_| Error::Timeout)??,
        None => connecting.await?,
    };
    Ok(connection.with_timeouts(read_timeout, write_timeout))
}

fn text_items(items: Vec<Frame>) -> Result<Vec<String>> {
    items
        .into_iter()
        .map(|item| {
            item.as_text()
                .ok_or_else(|| Error::protocol("scan item must be a string"))
        })
        .collect()
}
