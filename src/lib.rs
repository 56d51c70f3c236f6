//! subsieve - subscription endpoint latency filter
//!
//! A Rust library and CLI that aggregates proxy server descriptors from
//! upstream subscription feeds, probes each endpoint's TCP connect latency
//! under a bounded concurrency and wall-clock budget, and emits a filtered
//! subscription containing only the endpoints fast enough to keep.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use subsieve::{Config, SubscriptionFilter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::builder()
//!         .max_concurrency(50)
//!         .probe_timeout(Duration::from_secs(2))
//!         .latency_threshold(Duration::from_millis(800))
//!         .build()?;
//!
//!     let raw = vec!["vmess://eyJhZGQiOiJob3N0IiwicG9ydCI6NDQzfQ==".to_string()];
//!     let accepted = SubscriptionFilter::new(config).execute(raw).await;
//!
//!     println!("Kept {} endpoints", accepted.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod descriptor;
pub mod error;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod probe;

// Re-exports for convenience
pub use config::{Config, ConfigBuilder, ConfigFile, Settings};
pub use descriptor::{parse, ParseError, ParsedEndpoint, Scheme};
pub use error::{ConfigError, Error, FetchError, OutputError, Result};
pub use fetch::FeedFetcher;
pub use output::{encode_subscription, write_subscription, OutputFormat};
pub use pipeline::{FilterProgress, FilterReport, RejectCounts, SubscriptionFilter};
pub use probe::{
    Outcome, ProbeFailure, ProbeResult, ProbeScheduler, Prober, RejectReason, RunBudget, TcpProber,
};
