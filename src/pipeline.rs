//! End-to-end filter pipeline
//!
//! Dedups the raw descriptor lines, drives the probe scheduler under the
//! configured budget, and partitions the verdicts into the accepted
//! subscription and the reject tallies.

use crate::config::Config;
use crate::probe::{Outcome, ProbeResult, ProbeScheduler, Prober, RejectReason, TcpProber};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Progress callback type
pub type ProgressCallback = Arc<dyn Fn(FilterProgress) + Send + Sync>;

/// Filter progress information
#[derive(Debug, Clone)]
pub struct FilterProgress {
    /// Descriptors probed so far
    pub tested: u64,
    /// Unique descriptors queued for this run
    pub total: u64,
    /// Accepted so far
    pub accepted: u64,
}

/// Reject tallies for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RejectCounts {
    pub parse_failed: u64,
    pub connect_failed: u64,
    pub timed_out: u64,
    pub too_slow: u64,
}

impl RejectCounts {
    fn record(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::ParseFailed => self.parse_failed += 1,
            RejectReason::ConnectFailed => self.connect_failed += 1,
            RejectReason::Timeout => self.timed_out += 1,
            RejectReason::LatencyExceeded => self.too_slow += 1,
        }
    }
}

/// Outcome of one filter run
#[derive(Debug, Clone)]
pub struct FilterReport {
    /// Accepted descriptors, original string form
    pub accepted: Vec<String>,
    /// Reject tallies
    pub rejected: RejectCounts,
    /// Unique descriptors after dedup
    pub unique: usize,
    /// Descriptors that received a verdict before the deadline
    pub tested: usize,
}

impl FilterReport {
    /// Whether the run budget truncated the queue
    pub fn truncated(&self) -> bool {
        self.tested < self.unique
    }
}

/// Main filter pipeline
pub struct SubscriptionFilter {
    /// Configuration
    config: Config,
    /// Latency prober shared by all probe tasks
    prober: Arc<dyn Prober>,
    /// Progress callback
    progress_callback: Option<ProgressCallback>,
}

impl SubscriptionFilter {
    /// Create a pipeline probing over real TCP
    pub fn new(config: Config) -> Self {
        Self::with_prober(config, Arc::new(TcpProber))
    }

    /// Create a pipeline with a custom prober
    pub fn with_prober(config: Config, prober: Arc<dyn Prober>) -> Self {
        Self {
            config,
            prober,
            progress_callback: None,
        }
    }

    /// Set progress callback
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(FilterProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full pipeline and return the accepted descriptors
    /// (original string form, ready for encoding).
    ///
    /// Nothing here fails: per-descriptor problems become rejections and an
    /// exhausted budget yields a valid partial result, so empty output is a
    /// normal outcome.
    pub async fn execute(&self, raw_descriptors: Vec<String>) -> Vec<String> {
        self.run(raw_descriptors).await.accepted
    }

    /// Run the full pipeline and return the detailed report
    pub async fn run(&self, raw_descriptors: Vec<String>) -> FilterReport {
        let descriptors = dedup(raw_descriptors);
        let unique = descriptors.len();

        tracing::info!("Probing {} unique descriptors", unique);

        let budget = self.config.budget();
        let scheduler = self.scheduler(unique as u64);
        let results = scheduler.run(descriptors, &budget).await;

        let tested = results.len();
        if tested < unique {
            tracing::info!(
                "Run budget exhausted: {} of {} descriptors probed",
                tested,
                unique
            );
        }

        let mut accepted = Vec::new();
        let mut rejected = RejectCounts::default();

        for result in results {
            match result.outcome {
                Outcome::Accepted => accepted.push(result.descriptor),
                Outcome::Rejected(reason) => rejected.record(reason),
            }
        }

        tracing::info!("Accepted {} of {} probed descriptors", accepted.len(), tested);

        FilterReport {
            accepted,
            rejected,
            unique,
            tested,
        }
    }

    /// Build the scheduler, wiring the progress callback into its fan-in
    fn scheduler(&self, total: u64) -> ProbeScheduler {
        let scheduler = ProbeScheduler::new(self.prober.clone());

        match &self.progress_callback {
            Some(callback) => {
                let callback = callback.clone();
                let tested = AtomicU64::new(0);
                let accepted = AtomicU64::new(0);

                scheduler.with_observer(move |result: &ProbeResult| {
                    let tested = tested.fetch_add(1, Ordering::Relaxed) + 1;
                    let accepted = if result.is_accepted() {
                        accepted.fetch_add(1, Ordering::Relaxed) + 1
                    } else {
                        accepted.load(Ordering::Relaxed)
                    };

                    callback(FilterProgress {
                        tested,
                        total,
                        accepted,
                    });
                })
            }
            None => scheduler,
        }
    }
}

/// Collapse duplicates by exact string equality, keeping first occurrence.
/// Blank lines carry no descriptor and are dropped here too.
fn dedup(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| seen.insert(line.clone()))
        .collect()
}
