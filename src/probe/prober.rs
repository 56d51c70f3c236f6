//! Latency probing
//!
//! A probe is a single TCP connection attempt used as a liveness and latency
//! signal. No application-level handshake is performed and nothing is sent;
//! connect success is the only signal, and the socket is dropped as soon as
//! the measurement is taken.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpStream;

/// Why a probe did not produce a latency measurement
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    #[error("Connect timed out")]
    Timeout,

    #[error("Connect failed")]
    Unreachable,
}

/// Latency measurement seam.
///
/// The scheduler only sees this trait, so tests can inject deterministic
/// probers instead of touching the network.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Attempt one connection to `address:port`, returning the wall-clock
    /// time to handshake completion. May block the task for up to `timeout`.
    /// No retries.
    async fn probe(
        &self,
        address: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Duration, ProbeFailure>;
}

/// Real prober backed by a TCP connect
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProber;

#[async_trait]
impl Prober for TcpProber {
    async fn probe(
        &self,
        address: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Duration, ProbeFailure> {
        let start = Instant::now();

        match tokio::time::timeout(timeout, TcpStream::connect((address, port))).await {
            Ok(Ok(stream)) => {
                let elapsed = start.elapsed();
                // Release the connection immediately; the measurement is done
                drop(stream);
                Ok(elapsed)
            }
            // Refused, reset, unreachable, or failed resolution
            Ok(Err(_)) => Err(ProbeFailure::Unreachable),
            Err(_) => Err(ProbeFailure::Timeout),
        }
    }
}
