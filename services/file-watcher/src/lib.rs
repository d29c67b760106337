//! File Watcher
//!
//! Watches an S3 bucket for newly uploaded files and submits an ingest job to
//! the Piazza gateway for each one it can classify. Names of successfully
//! submitted files are appended to a local record so they are never sent
//! again, including across restarts.
//!
//! ## Architecture
//!
//! ```text
//!  S3 Bucket               Ingested Set              Ingest Gateway
//! ┌──────────────┐        ┌──────────────┐          ┌──────────────┐
//! │ uploads/...  │        │ Ingested     │          │ POST /job    │
//! └──────────────┘        │ Files.txt    │          └──────────────┘
//!        │                └──────────────┘                 ▲
//!        ▼                    ▲      │                     │
//! ┌──────────────┐  new?      │      │              ┌──────────────┐
//! │ Bucket       │────────────┼──────┘              │ Gateway      │
//! │ Scanner      │            │ record on 201       │ Client       │
//! └──────────────┘            │                     └──────────────┘
//!        │                    │                            ▲
//!        ▼                    │                            │
//! ┌──────────────┐     ┌──────────────┐           ┌──────────────┐
//! │ Classifier   │────▶│ Watcher      │──────────▶│ Job Payload  │
//! └──────────────┘     │ Loop         │           │ Builder      │
//!                      └──────────────┘           └──────────────┘
//! ```

pub mod classifier;
pub mod config;
pub mod gateway;
pub mod ingested_store;
pub mod payload;
pub mod scanner;
pub mod watcher;

pub use classifier::{classify, DataType};
pub use config::{ConfigError, Overrides, WatcherConfig};
pub use gateway::{GatewayClient, JobSubmitter, SubmissionResult};
pub use ingested_store::{IngestedStore, PersistenceError};
pub use payload::{IngestJobRequest, JobPayloadBuilder};
pub use scanner::{BucketLister, CandidateFile, S3BucketScanner, StorageError};
pub use watcher::{CycleReport, FileWatcher, WatcherError, WatcherStats};
