//! Single-shot provider timers.
//!
//! Timers are plain deadlines. The daemon sleeps until the nearest one and
//! hands expired timers back to the provider; nothing runs on its own.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// The provider's timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Releases positioning after the last reference is dropped.
    Idle,
    /// Demotes Available to Acquiring when no new fix arrives.
    FixLost,
    /// Periodic recalculation while positioning runs.
    RecalculatePosition,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerKind::Idle => "idle",
            TimerKind::FixLost => "fix-lost",
            TimerKind::RecalculatePosition => "recalculate",
        };
        f.write_str(name)
    }
}

/// Deadlines of all provider timers.
#[derive(Debug, Default, Clone)]
pub struct ProviderTimers {
    idle: Option<Instant>,
    fix_lost: Option<Instant>,
    recalculate: Option<Instant>,
}

impl ProviderTimers {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, kind: TimerKind) -> &mut Option<Instant> {
        match kind {
            TimerKind::Idle => &mut self.idle,
            TimerKind::FixLost => &mut self.fix_lost,
            TimerKind::RecalculatePosition => &mut self.recalculate,
        }
    }

    /// (Re)start `kind` to fire `after` from `now`.
    pub fn arm(&mut self, kind: TimerKind, now: Instant, after: Duration) {
        *self.slot(kind) = Some(now + after);
    }

    pub fn disarm(&mut self, kind: TimerKind) {
        *self.slot(kind) = None;
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        match kind {
            TimerKind::Idle => self.idle,
            TimerKind::FixLost => self.fix_lost,
            TimerKind::RecalculatePosition => self.recalculate,
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.deadline(kind).is_some()
    }

    /// The nearest armed deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.idle, self.fix_lost, self.recalculate]
            .into_iter()
            .flatten()
            .min()
    }

    /// Disarm and return the earliest timer due at `now`.
    ///
    /// Timers with equal deadlines come out in declaration order. Handling
    /// one timer may re-arm another, so callers take them one at a time.
    pub fn pop_expired(&mut self, now: Instant) -> Option<TimerKind> {
        let kind = [
            TimerKind::Idle,
            TimerKind::FixLost,
            TimerKind::RecalculatePosition,
        ]
        .into_iter()
        .filter_map(|kind| {
            self.deadline(kind)
                .filter(|deadline| *deadline <= now)
                .map(|deadline| (deadline, kind))
        })
        .min_by_key(|(deadline, _)| *deadline)
        .map(|(_, kind)| kind)?;

        self.disarm(kind);
        Some(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_deadline_is_nearest() {
        let now = Instant::now();
        let mut timers = ProviderTimers::new();
        assert!(timers.next_deadline().is_none());

        timers.arm(TimerKind::Idle, now, Duration::from_secs(30));
        timers.arm(TimerKind::RecalculatePosition, now, Duration::from_secs(10));
        assert_eq!(timers.next_deadline(), Some(now + Duration::from_secs(10)));

        timers.disarm(TimerKind::RecalculatePosition);
        assert_eq!(timers.next_deadline(), Some(now + Duration::from_secs(30)));
    }

    #[test]
    fn test_pop_expired_in_deadline_order() {
        let now = Instant::now();
        let mut timers = ProviderTimers::new();
        timers.arm(TimerKind::Idle, now, Duration::from_secs(5));
        timers.arm(TimerKind::FixLost, now, Duration::from_secs(2));
        timers.arm(TimerKind::RecalculatePosition, now, Duration::from_secs(60));

        let at = now + Duration::from_secs(5);
        assert_eq!(timers.pop_expired(at), Some(TimerKind::FixLost));
        assert_eq!(timers.pop_expired(at), Some(TimerKind::Idle));
        assert_eq!(timers.pop_expired(at), None);
        assert!(timers.is_armed(TimerKind::RecalculatePosition));
    }

    #[test]
    fn test_equal_deadlines_in_declaration_order() {
        let now = Instant::now();
        let mut timers = ProviderTimers::new();
        timers.arm(TimerKind::RecalculatePosition, now, Duration::from_secs(3));
        timers.arm(TimerKind::FixLost, now, Duration::from_secs(3));
        let at = now + Duration::from_secs(3);
        assert_eq!(timers.pop_expired(at), Some(TimerKind::FixLost));
        assert_eq!(timers.pop_expired(at), Some(TimerKind::RecalculatePosition));
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let now = Instant::now();
        let mut timers = ProviderTimers::new();
        timers.arm(TimerKind::FixLost, now, Duration::from_secs(5));
        timers.arm(TimerKind::FixLost, now, Duration::from_secs(50));
        assert_eq!(timers.pop_expired(now + Duration::from_secs(10)), None);
    }
}
