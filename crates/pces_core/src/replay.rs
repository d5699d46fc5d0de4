//! Startup replay of the stream into the consensus pipeline.
//!
//! ```text
//! Idle --replay()--> Replaying --iterator exhausted, flushed--> Drained
//! ```
//!
//! For each event the replayer first blocks while the downstream reports
//! itself unhealthy, polling every [`HEALTH_POLL_INTERVAL`]. This is the only
//! backpressure between the stream and intake. If the replay throttle is on,
//! the event is then held back until the rate limiter admits it; it is
//! retried, never dropped. After the last event the intake and transaction
//! handling pipelines are flushed and a summary is logged.

use crate::clock::Time;
use crate::config::PcesConfig;
use crate::error::{CoreError, CoreResult};
use crate::metrics::PcesMetrics;
use crate::types::Event;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How long to sleep between health checks.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The downstream pipeline replayed events are delivered to.
pub trait ReplayTarget {
    /// Delivers one event.
    ///
    /// # Errors
    ///
    /// Any error aborts the replay.
    fn forward(&mut self, event: Event) -> CoreResult<()>;

    /// Returns `false` while the downstream backlog is too large.
    fn is_healthy(&self) -> bool;

    /// Blocks until every forwarded event has passed intake.
    ///
    /// # Errors
    ///
    /// Any error aborts the replay.
    fn flush_intake(&mut self) -> CoreResult<()>;

    /// Blocks until transaction handling has caught up.
    ///
    /// # Errors
    ///
    /// Any error aborts the replay.
    fn flush_transaction_handling(&mut self) -> CoreResult<()>;
}

/// Round and consensus time of a durable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateInfo {
    /// Round of the state.
    pub round: i64,
    /// Consensus timestamp of the state, if known.
    pub consensus_timestamp: Option<DateTime<Utc>>,
}

/// Supplies the latest durable state. Only used for the replay summary.
pub trait LatestState {
    /// Returns the latest state, if any.
    fn latest_state(&self) -> Option<StateInfo>;
}

impl<F> LatestState for F
where
    F: Fn() -> Option<StateInfo>,
{
    fn latest_state(&self) -> Option<StateInfo> {
        self()
    }
}

/// Lifecycle of a [`Replayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    /// Not yet started.
    Idle,
    /// Delivering events, or failed part way.
    Replaying,
    /// Finished. Terminal.
    Drained,
}

/// Handle that cancels a replay blocked on an unhealthy downstream.
#[derive(Debug, Clone, Default)]
pub struct ReplayInterrupt(Arc<AtomicBool>);

impl ReplayInterrupt {
    /// Creates a handle that is not interrupted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests interruption.
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once interruption was requested.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Admits at most one operation per `1 / max_frequency` seconds.
pub struct RateLimiter {
    time: Arc<dyn Time>,
    minimum_period: chrono::Duration,
    last_trigger: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("minimum_period", &self.minimum_period)
            .field("last_trigger", &self.last_trigger)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Creates a limiter for `max_frequency` operations per second.
    #[must_use]
    pub fn new(time: Arc<dyn Time>, max_frequency: u32) -> Self {
        let nanos = 1_000_000_000 / i64::from(max_frequency.max(1));
        Self {
            time,
            minimum_period: chrono::Duration::nanoseconds(nanos),
            last_trigger: None,
        }
    }

    /// Returns `true` if an operation would be admitted now.
    #[must_use]
    pub fn request(&self) -> bool {
        match self.last_trigger {
            None => true,
            Some(last) => self.time.now() - last >= self.minimum_period,
        }
    }

    /// Records that an operation happened now.
    pub fn trigger(&mut self) {
        self.last_trigger = Some(self.time.now());
    }

    /// Admits and records an operation if allowed.
    pub fn request_and_trigger(&mut self) -> bool {
        if self.request() {
            self.trigger();
            true
        } else {
            false
        }
    }
}

/// What a replay delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Events forwarded.
    pub events_replayed: u64,
    /// Transactions contained in forwarded events.
    pub transactions_replayed: u64,
    /// Latest state round after replay, if any state exists.
    pub latest_round: Option<i64>,
    /// Rounds that reached consensus during replay.
    pub rounds_advanced: i64,
    /// Consensus time covered by those rounds, if known.
    pub consensus_time_advanced: Option<chrono::Duration>,
    /// Wall time the replay took.
    pub elapsed: chrono::Duration,
}

/// Replays stream events into a [`ReplayTarget`], once.
pub struct Replayer<T> {
    target: T,
    latest_state: Box<dyn LatestState + Send>,
    time: Arc<dyn Time>,
    metrics: Arc<PcesMetrics>,
    rate_limiter: Option<RateLimiter>,
    interrupt: ReplayInterrupt,
    poll_interval: Duration,
    state: ReplayState,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Replayer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replayer")
            .field("target", &self.target)
            .field("rate_limiter", &self.rate_limiter)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<T: ReplayTarget> Replayer<T> {
    /// Creates an idle replayer.
    #[must_use]
    pub fn new(
        config: &PcesConfig,
        target: T,
        latest_state: Box<dyn LatestState + Send>,
        time: Arc<dyn Time>,
        metrics: Arc<PcesMetrics>,
    ) -> Self {
        let rate_limiter = config
            .limit_replay_frequency
            .then(|| RateLimiter::new(time.clone(), config.max_event_replay_frequency));
        Self {
            target,
            latest_state,
            time,
            metrics,
            rate_limiter,
            interrupt: ReplayInterrupt::new(),
            poll_interval: HEALTH_POLL_INTERVAL,
            state: ReplayState::Idle,
        }
    }

    /// Uses `interrupt` to cancel health waits.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: ReplayInterrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Overrides the health poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Returns a handle that cancels health waits.
    #[must_use]
    pub fn interrupt_handle(&self) -> ReplayInterrupt {
        self.interrupt.clone()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> ReplayState {
        self.state
    }

    /// Returns the downstream target.
    #[must_use]
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Consumes the replayer and returns the target.
    #[must_use]
    pub fn into_target(self) -> T {
        self.target
    }

    /// Delivers every event from `events`, in order, then flushes downstream.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error if called more than once,
    /// [`CoreError::Interrupted`] if a health wait is interrupted, or the
    /// first error from reading events or from the target.
    pub fn replay<I>(&mut self, events: I) -> CoreResult<ReplaySummary>
    where
        I: IntoIterator<Item = CoreResult<Event>>,
    {
        if self.state != ReplayState::Idle {
            return Err(CoreError::invalid_state(
                "the stream has already been replayed",
            ));
        }
        self.state = ReplayState::Replaying;

        let start = self.time.now();
        let initial_state = self.latest_state.latest_state();

        let mut events_replayed = 0u64;
        let mut transactions_replayed = 0u64;
        let mut events = events.into_iter().peekable();

        while events.peek().is_some() {
            self.wait_until_healthy()?;

            if let Some(limiter) = self.rate_limiter.as_mut() {
                if !limiter.request_and_trigger() {
                    std::thread::yield_now();
                    continue;
                }
            }

            let Some(event) = events.next() else {
                break;
            };
            let event = event?;
            let transactions = u64::from(event.transaction_count());

            self.target.forward(event)?;
            events_replayed += 1;
            transactions_replayed += transactions;
            self.metrics.record_event_replayed(transactions);
        }

        self.target.flush_intake()?;
        self.target.flush_transaction_handling()?;

        let final_state = self.latest_state.latest_state();
        let summary = ReplaySummary {
            events_replayed,
            transactions_replayed,
            latest_round: final_state.map(|s| s.round),
            rounds_advanced: final_state.map_or(0, |after| {
                after.round - initial_state.map_or(0, |before| before.round)
            }),
            consensus_time_advanced: match (initial_state, final_state) {
                (Some(before), Some(after)) => after
                    .consensus_timestamp
                    .zip(before.consensus_timestamp)
                    .map(|(a, b)| a - b),
                _ => None,
            },
            elapsed: self.time.now() - start,
        };
        log_summary(&summary);

        self.state = ReplayState::Drained;
        Ok(summary)
    }

    fn wait_until_healthy(&self) -> CoreResult<()> {
        while !self.target.is_healthy() {
            if self.interrupt.is_interrupted() {
                return Err(CoreError::Interrupted);
            }
            std::thread::sleep(self.poll_interval);
        }
        Ok(())
    }
}

fn log_summary(summary: &ReplaySummary) {
    let elapsed_ms = summary.elapsed.num_milliseconds();
    match summary.latest_round {
        None => info!(
            events = summary.events_replayed,
            transactions = summary.transactions_replayed,
            elapsed_ms,
            "replayed {} preconsensus events; no rounds reached consensus",
            summary.events_replayed
        ),
        Some(latest_round) => info!(
            events = summary.events_replayed,
            transactions = summary.transactions_replayed,
            rounds = summary.rounds_advanced,
            consensus_time = ?summary.consensus_time_advanced,
            latest_round,
            elapsed_ms,
            "replayed {} preconsensus events containing {} transactions; {} rounds reached consensus, latest round {}",
            summary.events_replayed,
            summary.transactions_replayed,
            summary.rounds_advanced,
            latest_round
        ),
    }
}
