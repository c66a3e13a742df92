//! Rate-limited, failure-isolated broadcast fan-out.
//!
//! Delivery is best-effort and strictly sequential. The fixed inter-send
//! delay is deliberate backpressure against the messaging gateway's rate
//! limit, trading throughput for reliability; wall-clock time is linear in
//! the target count. A failed send is permanent for that recipient within
//! the job; there are no retries and no cancellation.

use crate::gateway::GatewayError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{info, warn};

/// Fixed-interval ticker pacing the fan-out loop.
///
/// The first tick completes immediately; each later tick waits out the
/// period. A zero period disables pacing entirely, which keeps tests and
/// single-recipient jobs instant.
pub struct Throttle {
    inner: Option<Interval>,
}

impl Throttle {
    /// Ticker firing once per `period`.
    #[must_use]
    pub fn every(period: Duration) -> Self {
        if period.is_zero() {
            return Self { inner: None };
        }
        let mut inner = interval(period);
        inner.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { inner: Some(inner) }
    }

    /// Wait until the next send slot opens.
    pub async fn tick(&mut self) {
        if let Some(inner) = &mut self.inner {
            inner.tick().await;
        }
    }
}

/// Outcome of one broadcast job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients the gateway accepted the payload for.
    pub succeeded: usize,
    /// Recipients whose single delivery attempt failed.
    pub failed: usize,
}

impl BroadcastReport {
    /// Total number of attempted recipients.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Sequential fan-out engine over a registry snapshot.
#[derive(Clone)]
pub struct Broadcaster {
    delay: Duration,
}

impl Broadcaster {
    /// Engine with a fixed `delay` between sends.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Send one payload per target, pacing sends with the throttle.
    ///
    /// `send` produces the (possibly per-recipient, e.g. localized) payload
    /// future. Failures are recorded and logged but never abort the
    /// remaining iteration.
    pub async fn run<F, Fut>(&self, targets: &[i64], mut send: F) -> BroadcastReport
    where
        F: FnMut(i64) -> Fut,
        Fut: Future<Output = Result<(), GatewayError>>,
    {
        let mut throttle = Throttle::every(self.delay);
        let mut report = BroadcastReport::default();

        for &target in targets {
            throttle.tick().await;
            match send(target).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("Broadcast delivery to {target} failed: {e}");
                }
            }
        }

        info!(
            "Broadcast finished: {} delivered, {} failed",
            report.succeeded, report.failed
        );
        report
    }
}
