use std::time::Duration;

use tokio::{
    sync::mpsc,
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;

use super::state::{QuietOutcome, SessionState};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverExit {
    /// The running total reached the limit.
    Tripped { total: Duration },
    /// Tracking was cancelled (teardown, or a block arrived from elsewhere).
    Cancelled,
    /// Every activity sender was dropped.
    Closed,
}

/// Feeds timestamped activity events into a [`SessionState`] and fires its
/// quiet timer.
pub struct SessionDriver {
    label: String,
    state: SessionState,
    events: mpsc::Receiver<Instant>,
    cancel: CancellationToken,
}

impl SessionDriver {
    pub fn new(
        label: impl Into<String>,
        limit: Duration,
        events: mpsc::Receiver<Instant>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            label: label.into(),
            state: SessionState::new(limit),
            events,
            cancel,
        }
    }

    pub async fn run(mut self) -> DriverExit {
        loop {
            let timer = self.state.timer();
            let deadline = timer.map(|t| t.deadline).unwrap_or_else(Instant::now);

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return DriverExit::Cancelled,
                event = self.events.recv() => match event {
                    Some(at) => self.state.on_activity(at),
                    None => return DriverExit::Closed,
                },
                _ = sleep_until(deadline), if timer.is_some() => {
                    timer.map(|fired| self.state.on_quiet(fired, fired.deadline))
                }
            };

            if let Some(total) = outcome.and_then(|outcome| self.report(outcome)) {
                return DriverExit::Tripped { total };
            }
        }
    }

    /// Logs a closed session; returns the total when it reached the limit.
    fn report(&self, outcome: QuietOutcome) -> Option<Duration> {
        match outcome {
            QuietOutcome::Stale => None,
            QuietOutcome::SessionEnded { session, total } => {
                log_debug!(
                    "{}: scroll session {} ms, total {} / {} ms",
                    self.label,
                    session.as_millis(),
                    total.as_millis(),
                    self.state.limit().as_millis()
                );
                None
            }
            QuietOutcome::LimitReached { session, total } => {
                log_debug!(
                    "{}: scroll session {} ms reached limit ({} ms)",
                    self.label,
                    session.as_millis(),
                    total.as_millis()
                );
                Some(total)
            }
        }
    }
}
