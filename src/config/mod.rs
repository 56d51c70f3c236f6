//! Runtime configuration

mod file;

pub use file::{ConfigFile, Settings};

use crate::error::{ConfigError, Result};
use crate::probe::RunBudget;
use std::time::{Duration, Instant};

/// Configuration for one filter run
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream subscription feed URLs
    pub feeds: Vec<String>,
    /// Concurrent probe tasks
    pub max_concurrency: usize,
    /// Per-probe connect timeout
    pub probe_timeout: Duration,
    /// Wall-clock budget for the whole run; zero = unbounded
    pub run_budget: Duration,
    /// Accept endpoints strictly faster than this
    pub latency_threshold: Duration,
}

impl Config {
    /// Start building a config
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Materialize the budget for a run starting now
    pub fn budget(&self) -> RunBudget {
        let deadline = if self.run_budget.is_zero() {
            None
        } else {
            Some(Instant::now() + self.run_budget)
        };

        RunBudget {
            max_concurrency: self.max_concurrency,
            probe_timeout: self.probe_timeout,
            deadline,
            latency_threshold: self.latency_threshold,
        }
    }
}

/// Builder for [`Config`]
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    feeds: Vec<String>,
    max_concurrency: usize,
    probe_timeout: Duration,
    run_budget: Duration,
    latency_threshold: Duration,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            feeds: Vec::new(),
            max_concurrency: settings.concurrency,
            probe_timeout: Duration::from_secs(settings.timeout_seconds),
            run_budget: Duration::from_secs(settings.budget_seconds),
            latency_threshold: Duration::from_millis(settings.latency_threshold_ms),
        }
    }
}

impl ConfigBuilder {
    pub fn feed(mut self, url: impl Into<String>) -> Self {
        self.feeds.push(url.into());
        self
    }

    pub fn feeds(mut self, urls: impl IntoIterator<Item = String>) -> Self {
        self.feeds.extend(urls);
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn run_budget(mut self, budget: Duration) -> Self {
        self.run_budget = budget;
        self
    }

    pub fn latency_threshold(mut self, threshold: Duration) -> Self {
        self.latency_threshold = threshold;
        self
    }

    pub fn build(self) -> Result<Config> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue("concurrency must be at least 1".into()).into());
        }

        if self.probe_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("probe timeout must be positive".into()).into());
        }

        if self.latency_threshold.is_zero() {
            return Err(
                ConfigError::InvalidValue("latency threshold must be positive".into()).into(),
            );
        }

        Ok(Config {
            feeds: self.feeds,
            max_concurrency: self.max_concurrency,
            probe_timeout: self.probe_timeout,
            run_budget: self.run_budget,
            latency_threshold: self.latency_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = Config::builder().build().unwrap();
        assert!(config.max_concurrency >= 1);
        assert!(!config.probe_timeout.is_zero());
        assert!(!config.latency_threshold.is_zero());
    }

    #[test]
    fn test_builder_rejects_zero_concurrency() {
        assert!(Config::builder().max_concurrency(0).build().is_err());
    }

    #[test]
    fn test_builder_rejects_zero_threshold() {
        assert!(Config::builder()
            .latency_threshold(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_zero_budget_is_unbounded() {
        let config = Config::builder().run_budget(Duration::ZERO).build().unwrap();
        assert!(config.budget().deadline.is_none());
    }

    #[test]
    fn test_nonzero_budget_sets_deadline() {
        let config = Config::builder()
            .run_budget(Duration::from_secs(60))
            .build()
            .unwrap();
        assert!(config.budget().deadline.is_some());
    }
}
