//! # Disquer
//!
//! Async Disque job-queue client for Rust.
//!
//! Disque speaks a Redis-like request/response protocol; this crate provides
//! the wire codec, a single-request-at-a-time connection with half-close and
//! protocol-fault detection, a typed command facade, and resumable cursor
//! iteration over server-side queue and job scans.
//!
//! ## Example
//!
//! ```no_run
//! use disquer::{AddJobOptions, Client};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("disque://localhost:7711").await?;
//!     let id = client
//!         .add_job("orders", "order-payload", 0, &AddJobOptions::default())
//!         .await?;
//!     println!("queued {id}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub(crate) mod core;
pub mod proto;

// Re-export the high-level client types for convenience
pub use crate::core::address::Address;
pub use crate::core::builder::ClientBuilder;
pub use crate::core::command::{
    AddJobOptions, Cmd, GetJobOptions, Hello, HelloNode, JscanOptions, PauseOption, QscanOptions,
};
pub use crate::core::connection::Connection;
pub use crate::core::job::{Job, JobRef};
pub use crate::core::scanner::{
    JobIdScan, JobScan, JobsIterator, QueueScan, ScanIterator, ScanPage, ScanSource,
};
pub use crate::core::Client;
pub use crate::proto::error::{Error, Result};
