use std::collections::VecDeque;

use futures::Stream;

use crate::core::command::{GetJobOptions, JscanOptions, QscanOptions};
use crate::core::job::Job;
use crate::core::Client;

/// One page of a cursor scan: the cursor to pass to the next call, and the
/// items the server returned for this step. Cursor `0` signals completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPage<T> {
    /// Cursor for the next call; `0` means the scan is complete.
    pub cursor: u64,
    /// Items returned for this page, in server order.
    pub items: Vec<T>,
}

/// A scan-style operation: given a cursor, produce the next page.
///
/// The scan contract is at-least-once: every element present when the scan
/// started is returned eventually, but elements may repeat across pages.
#[allow(async_fn_in_trait)]
pub trait ScanSource {
    /// Item type yielded by the scan.
    type Item;

    /// Fetches the page at `cursor`.
    async fn page(&mut self, cursor: u64) -> crate::Result<ScanPage<Self::Item>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Waiting,
    Running,
    Finished,
}

/// A resumable iterator over a cursor scan.
///
/// Items are yielded in the order the server returned them; duplicates
/// across pages are possible and are not filtered (deduplicate on the
/// consumer side if needed). Once exhausted the iterator stays exhausted:
/// there is no restart, construct a new iterator to scan again.
///
/// # Example
///
/// ```no_run
/// use disquer::{Client, QscanOptions};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut client = Client::connect("disque://localhost:7711").await?;
/// let mut queues = client.qscan_iter(QscanOptions::default());
/// while let Some(queue) = queues.next().await? {
///     println!("{queue}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct ScanIterator<S: ScanSource> {
    source: S,
    cursor: u64,
    buffer: VecDeque<S::Item>,
    state: ScanState,
}

impl<S: ScanSource> ScanIterator<S> {
    /// Creates an iterator that will start scanning from cursor `0`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            cursor: 0,
            buffer: VecDeque::new(),
            state: ScanState::Waiting,
        }
    }

    /// Returns the next item, fetching pages as needed.
    ///
    /// `Ok(None)` signals end of the scan. An empty non-final page triggers
    /// another fetch rather than a premature end.
    pub async fn next(&mut self) -> crate::Result<Option<S::Item>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            if self.state == ScanState::Finished {
                return Ok(None);
            }
            let page = self.source.page(self.cursor).await?;
            self.cursor = page.cursor;
            self.state = if page.cursor == 0 {
                ScanState::Finished
            } else {
                ScanState::Running
            };
            self.buffer.extend(page.items);
        }
    }

    /// True once the server reported the final page and the local buffer
    /// has drained.
    pub fn is_exhausted(&self) -> bool {
        self.state == ScanState::Finished && self.buffer.is_empty()
    }

    /// Adapts the iterator into a [`futures::Stream`](futures::Stream).
    pub fn into_stream(self) -> impl Stream<Item = crate::Result<S::Item>> {
        futures::stream::unfold(self, |mut iter| async move {
            iter.next().await.transpose().map(|item| (item, iter))
        })
    }
}

/// QSCAN source: iterates queue names known to the contacted node.
#[derive(Debug)]
pub struct QueueScan<'a> {
    client: &'a mut Client,
    options: QscanOptions,
}

impl<'a> QueueScan<'a> {
    pub(crate) fn new(client: &'a mut Client, options: QscanOptions) -> Self {
        Self { client, options }
    }
}

impl ScanSource for QueueScan<'_> {
    type Item = String;

    async fn page(&mut self, cursor: u64) -> crate::Result<ScanPage<String>> {
        self.client.qscan(cursor, &self.options).await
    }
}

/// JSCAN source yielding job IDs (`REPLY id`).
#[derive(Debug)]
pub struct JobIdScan<'a> {
    client: &'a mut Client,
    options: JscanOptions,
}

impl<'a> JobIdScan<'a> {
    pub(crate) fn new(client: &'a mut Client, options: JscanOptions) -> Self {
        Self { client, options }
    }
}

impl ScanSource for JobIdScan<'_> {
    type Item = String;

    async fn page(&mut self, cursor: u64) -> crate::Result<ScanPage<String>> {
        self.client.jscan(cursor, &self.options).await
    }
}

/// JSCAN source yielding full job records (`REPLY all`).
#[derive(Debug)]
pub struct JobScan<'a> {
    client: &'a mut Client,
    options: JscanOptions,
}

impl<'a> JobScan<'a> {
    pub(crate) fn new(client: &'a mut Client, options: JscanOptions) -> Self {
        Self { client, options }
    }
}

impl ScanSource for JobScan<'_> {
    type Item = Job;

    async fn page(&mut self, cursor: u64) -> crate::Result<ScanPage<Job>> {
        self.client.jscan_full(cursor, &self.options).await
    }
}

/// Iterates GETJOB batches until a fetch comes back empty.
///
/// Unlike the cursor scanners this hits the blocking GETJOB path; pair it
/// with [`GetJobOptions::nohang`] or a timeout to guarantee termination.
#[derive(Debug)]
pub struct JobsIterator<'a> {
    client: &'a mut Client,
    queues: Vec<String>,
    options: GetJobOptions,
}

impl<'a> JobsIterator<'a> {
    pub(crate) fn new(client: &'a mut Client, queues: &[&str], options: GetJobOptions) -> Self {
        Self {
            client,
            queues: queues.iter().map(|q| q.to_string()).collect(),
            options,
        }
    }

    /// Fetches the next batch of jobs; `Ok(None)` when the fetch comes back
    /// empty.
    pub async fn next(&mut self) -> crate::Result<Option<Vec<Job>>> {
        let queues: Vec<&str> = self.queues.iter().map(String::as_str).collect();
        let jobs = self.client.get_job(&queues, &self.options).await?;
        if jobs.is_empty() {
            Ok(None)
        } else {
            Ok(Some(jobs))
        }
    }
}
