use std::time::Duration;

use tokio::time::Instant;

/// Quiet period after the last activity event that closes a session.
pub const QUIET_PERIOD: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Scrolling,
}

/// The pending quiet-period timer. A timer is only honoured while its
/// generation is current; every activity event bumps the generation, which
/// cancels the old timer and arms the new one in the same step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietTimer {
    pub deadline: Instant,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuietOutcome {
    /// The timer was superseded by later activity or the session already
    /// tripped.
    Stale,
    /// A session closed; the running total is still under the limit.
    SessionEnded { session: Duration, total: Duration },
    /// A session closed and pushed the total over the limit for the first
    /// time this page load.
    LimitReached { session: Duration, total: Duration },
}

/// Per-tab scroll accounting. Lives for one page load and is never shared.
#[derive(Debug, Clone)]
pub struct SessionState {
    phase: SessionPhase,
    session_started_at: Option<Instant>,
    accumulated: Duration,
    limit: Duration,
    tripped: bool,
    generation: u64,
    timer: Option<QuietTimer>,
}

impl SessionState {
    pub fn new(limit: Duration) -> Self {
        Self {
            phase: SessionPhase::Idle,
            session_started_at: None,
            accumulated: Duration::ZERO,
            limit,
            tripped: false,
            generation: 0,
            timer: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn has_tripped(&self) -> bool {
        self.tripped
    }

    pub fn timer(&self) -> Option<QuietTimer> {
        self.timer
    }

    /// Records one activity event and re-arms the quiet timer.
    ///
    /// An event stamped at or after the pending deadline first closes the
    /// running session at that deadline, and the outcome is returned. When
    /// that close reaches the limit the event itself is dropped. Once the
    /// limit has been reached for this load, events are ignored.
    pub fn on_activity(&mut self, at: Instant) -> Option<QuietOutcome> {
        if self.tripped {
            return None;
        }

        let closed = match self.timer {
            Some(timer) if at >= timer.deadline => Some(self.on_quiet(timer, timer.deadline)),
            _ => None,
        };
        if self.tripped {
            return closed;
        }

        if self.phase == SessionPhase::Idle {
            self.phase = SessionPhase::Scrolling;
            self.session_started_at = Some(at);
        }

        self.generation = self.generation.wrapping_add(1);
        self.timer = Some(QuietTimer {
            deadline: at + QUIET_PERIOD,
            generation: self.generation,
        });
        closed
    }

    /// Handles a quiet timer firing at `now`.
    pub fn on_quiet(&mut self, fired: QuietTimer, now: Instant) -> QuietOutcome {
        if self.tripped || self.timer != Some(fired) || self.phase != SessionPhase::Scrolling {
            return QuietOutcome::Stale;
        }

        let started = self.session_started_at.take().unwrap_or(now);
        let session = now.saturating_duration_since(started);
        self.accumulated = self.accumulated.saturating_add(session);
        self.phase = SessionPhase::Idle;
        self.timer = None;

        if self.accumulated >= self.limit {
            self.tripped = true;
            QuietOutcome::LimitReached {
                session,
                total: self.accumulated,
            }
        } else {
            QuietOutcome::SessionEnded {
                session,
                total: self.accumulated,
            }
        }
    }
}
