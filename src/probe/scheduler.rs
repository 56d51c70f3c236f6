//! Probe scheduling
//!
//! Fans a deduplicated descriptor set out across a bounded pool of
//! concurrent probe tasks and fans the results back in. The global deadline
//! is cooperative: it gates the dispatch of each new descriptor, never
//! interrupting probes already in flight, so a truncated run still returns a
//! valid partial result list.

use crate::descriptor::{self, ParsedEndpoint};
use crate::probe::{ProbeFailure, Prober};
use futures::future;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-run limits, built once at run start and read-only thereafter
#[derive(Debug, Clone)]
pub struct RunBudget {
    /// Concurrent probe tasks (minimum 1)
    pub max_concurrency: usize,
    /// Hard bound on each connection attempt
    pub probe_timeout: Duration,
    /// Wall-clock cutoff for dispatching new work; `None` = unbounded
    pub deadline: Option<Instant>,
    /// Accept endpoints strictly faster than this
    pub latency_threshold: Duration,
}

impl RunBudget {
    /// Whether the dispatch cutoff has passed
    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Why a descriptor was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Malformed or unsupported descriptor; never probed
    ParseFailed,
    /// Endpoint refused, reset, or failed to resolve
    ConnectFailed,
    /// Connect did not complete within the per-probe timeout
    Timeout,
    /// Reachable, but slower than the configured threshold
    LatencyExceeded,
}

/// Terminal classification of one descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Rejected(RejectReason),
}

/// One probe verdict. Exactly one is produced per descriptor dispatched
/// before the deadline; descriptors truncated by the deadline produce none.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Original descriptor string, unmodified
    pub descriptor: String,
    /// Probe target, when parsing succeeded
    pub endpoint: Option<ParsedEndpoint>,
    /// Measured connect latency, when the probe completed
    pub latency: Option<Duration>,
    pub outcome: Outcome,
}

impl ProbeResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, Outcome::Accepted)
    }

    /// Latency truncated to whole milliseconds, for display and comparison
    pub fn latency_ms(&self) -> Option<u64> {
        self.latency.map(|l| l.as_millis() as u64)
    }
}

/// Called at the fan-in point with each result as it completes
pub type ResultObserver = Box<dyn Fn(&ProbeResult) + Send + Sync>;

/// Bounded-concurrency parse+probe executor
pub struct ProbeScheduler {
    prober: Arc<dyn Prober>,
    observer: Option<ResultObserver>,
}

impl ProbeScheduler {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self {
            prober,
            observer: None,
        }
    }

    /// Observe each result as it is collected (progress reporting)
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ProbeResult) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Probe every descriptor, at most `budget.max_concurrency` at a time.
    ///
    /// Returns one result per descriptor dispatched before the deadline.
    /// Results arrive in completion order; no relation to input order is
    /// guaranteed.
    pub async fn run(&self, descriptors: Vec<String>, budget: &RunBudget) -> Vec<ProbeResult> {
        let concurrency = budget.max_concurrency.max(1);

        stream::iter(descriptors)
            // Deadline gate: checked once per dispatch, between units of
            // work. In-flight probes are left to finish naturally.
            .take_while(|_| future::ready(!budget.expired()))
            .map(|descriptor| {
                let prober = self.prober.clone();
                let timeout = budget.probe_timeout;
                let threshold = budget.latency_threshold;
                async move { process(prober, descriptor, timeout, threshold).await }
            })
            .buffer_unordered(concurrency)
            .inspect(|result| {
                if let Some(observer) = &self.observer {
                    observer(result);
                }
            })
            .collect()
            .await
    }
}

/// Handle one descriptor end-to-end: parse, probe, classify
async fn process(
    prober: Arc<dyn Prober>,
    descriptor: String,
    timeout: Duration,
    threshold: Duration,
) -> ProbeResult {
    let endpoint = match descriptor::parse(&descriptor) {
        Ok(ep) => ep,
        Err(e) => {
            tracing::debug!("Rejecting {}: {}", preview(&descriptor), e);
            return ProbeResult {
                descriptor,
                endpoint: None,
                latency: None,
                outcome: Outcome::Rejected(RejectReason::ParseFailed),
            };
        }
    };

    match prober.probe(&endpoint.address, endpoint.port, timeout).await {
        Ok(latency) => {
            let latency_ms = latency.as_millis() as u64;
            let outcome = if latency_ms < threshold.as_millis() as u64 {
                Outcome::Accepted
            } else {
                Outcome::Rejected(RejectReason::LatencyExceeded)
            };

            tracing::debug!(
                "{}:{} answered in {}ms ({:?})",
                endpoint.address,
                endpoint.port,
                latency_ms,
                outcome
            );

            ProbeResult {
                descriptor,
                endpoint: Some(endpoint),
                latency: Some(latency),
                outcome,
            }
        }
        Err(failure) => {
            let reason = match failure {
                ProbeFailure::Timeout => RejectReason::Timeout,
                ProbeFailure::Unreachable => RejectReason::ConnectFailed,
            };

            tracing::debug!("{}:{} {}", endpoint.address, endpoint.port, failure);

            ProbeResult {
                descriptor,
                endpoint: Some(endpoint),
                latency: None,
                outcome: Outcome::Rejected(reason),
            }
        }
    }
}

/// Truncate a descriptor for log lines
fn preview(descriptor: &str) -> &str {
    let end = descriptor
        .char_indices()
        .nth(30)
        .map_or(descriptor.len(), |(i, _)| i);
    &descriptor[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use std::collections::HashMap;

    /// Deterministic prober driven by an `address:port` lookup table
    struct FakeProber {
        latencies: HashMap<String, Result<Duration, ProbeFailure>>,
    }

    impl FakeProber {
        fn new(
            entries: impl IntoIterator<Item = (String, Result<Duration, ProbeFailure>)>,
        ) -> Self {
            Self {
                latencies: entries.into_iter().collect(),
            }
        }
    }

    #[async_trait]
    impl Prober for FakeProber {
        async fn probe(
            &self,
            address: &str,
            port: u16,
            _timeout: Duration,
        ) -> Result<Duration, ProbeFailure> {
            self.latencies
                .get(&format!("{}:{}", address, port))
                .copied()
                .unwrap_or(Err(ProbeFailure::Unreachable))
        }
    }

    fn vmess(host: &str, port: u16) -> String {
        format!(
            "vmess://{}",
            STANDARD.encode(format!(r#"{{"add":"{}","port":{}}}"#, host, port))
        )
    }

    fn budget(threshold_ms: u64) -> RunBudget {
        RunBudget {
            max_concurrency: 4,
            probe_timeout: Duration::from_secs(2),
            deadline: None,
            latency_threshold: Duration::from_millis(threshold_ms),
        }
    }

    #[tokio::test]
    async fn test_accept_reject_split() {
        let prober = FakeProber::new([
            ("fast.example:443".to_string(), Ok(Duration::from_millis(50))),
            ("slow.example:443".to_string(), Ok(Duration::from_millis(900))),
            ("down.example:443".to_string(), Err(ProbeFailure::Unreachable)),
            ("stuck.example:443".to_string(), Err(ProbeFailure::Timeout)),
        ]);
        let scheduler = ProbeScheduler::new(Arc::new(prober));

        let descriptors = vec![
            vmess("fast.example", 443),
            vmess("slow.example", 443),
            vmess("down.example", 443),
            vmess("stuck.example", 443),
            "garbage-line".to_string(),
        ];

        let results = scheduler.run(descriptors, &budget(800)).await;
        assert_eq!(results.len(), 5);

        let outcome_for = |host: &str| {
            results
                .iter()
                .find(|r| r.descriptor == vmess(host, 443))
                .unwrap()
                .outcome
        };

        assert_eq!(outcome_for("fast.example"), Outcome::Accepted);
        assert_eq!(
            outcome_for("slow.example"),
            Outcome::Rejected(RejectReason::LatencyExceeded)
        );
        assert_eq!(
            outcome_for("down.example"),
            Outcome::Rejected(RejectReason::ConnectFailed)
        );
        assert_eq!(
            outcome_for("stuck.example"),
            Outcome::Rejected(RejectReason::Timeout)
        );

        let garbage = results
            .iter()
            .find(|r| r.descriptor == "garbage-line")
            .unwrap();
        assert_eq!(garbage.outcome, Outcome::Rejected(RejectReason::ParseFailed));
        assert!(garbage.endpoint.is_none());
        assert!(garbage.latency.is_none());
    }

    #[tokio::test]
    async fn test_outcome_consistent_with_latency() {
        let prober = FakeProber::new((0..20).map(|i| {
            (
                format!("host{}.example:443", i),
                Ok(Duration::from_millis(i * 100)),
            )
        }));
        let scheduler = ProbeScheduler::new(Arc::new(prober));

        let descriptors: Vec<String> = (0..20)
            .map(|i| vmess(&format!("host{}.example", i), 443))
            .collect();

        let results = scheduler.run(descriptors, &budget(800)).await;
        for r in &results {
            match r.outcome {
                Outcome::Accepted => assert!(r.latency_ms().unwrap() < 800),
                Outcome::Rejected(RejectReason::LatencyExceeded) => {
                    assert!(r.latency_ms().unwrap() >= 800)
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_expired_deadline_dispatches_nothing() {
        let prober = FakeProber::new([(
            "fast.example:443".to_string(),
            Ok(Duration::from_millis(10)),
        )]);
        let scheduler = ProbeScheduler::new(Arc::new(prober));

        let mut expired = budget(800);
        expired.deadline = Some(Instant::now() - Duration::from_secs(1));

        let results = scheduler
            .run(vec![vmess("fast.example", 443)], &expired)
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_empty_input() {
        let scheduler = ProbeScheduler::new(Arc::new(FakeProber::new([])));
        let results = scheduler.run(Vec::new(), &budget(800)).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_one_result_per_descriptor() {
        let prober = FakeProber::new((0..50).map(|i| {
            (
                format!("host{}.example:443", i),
                Ok(Duration::from_millis(1)),
            )
        }));
        let scheduler = ProbeScheduler::new(Arc::new(prober));

        let descriptors: Vec<String> = (0..50)
            .map(|i| vmess(&format!("host{}.example", i), 443))
            .collect();

        let results = scheduler.run(descriptors.clone(), &budget(800)).await;
        assert_eq!(results.len(), 50);

        let mut seen: Vec<&str> = results.iter().map(|r| r.descriptor.as_str()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 50, "each descriptor claimed exactly once");
    }
}
