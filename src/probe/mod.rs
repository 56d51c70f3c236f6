//! Endpoint probing: latency measurement and bounded-concurrency scheduling

mod prober;
mod scheduler;

pub use prober::{ProbeFailure, Prober, TcpProber};
pub use scheduler::{Outcome, ProbeResult, ProbeScheduler, RejectReason, RunBudget};
