//! Idle timeout. Any user input pushes the deadline back; expiry fires once.

use std::time::{Duration, Instant};

use crate::ports::{Clock, RealClock};

pub struct InactivityMonitor<C: Clock = RealClock> {
    timeout: Duration,
    deadline: Option<Instant>,
    fired: bool,
    clock: C,
}

impl InactivityMonitor<RealClock> {
    pub fn new(timeout: Duration) -> Self {
        Self::with_clock(timeout, RealClock)
    }
}

impl<C: Clock> InactivityMonitor<C> {
    pub fn with_clock(timeout: Duration, clock: C) -> Self {
        Self {
            timeout,
            deadline: None,
            fired: false,
            clock,
        }
    }

    /// Start the timer. Later calls are no-ops.
    pub fn arm(&mut self) {
        if self.deadline.is_none() && !self.fired {
            self.deadline = Some(self.clock.now() + self.timeout);
        }
    }

    pub fn record_activity(&mut self) {
        if self.deadline.is_some() {
            self.deadline = Some(self.clock.now() + self.timeout);
        }
    }

    /// True exactly once, on the first poll at or past the deadline.
    pub fn poll(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if self.clock.now() >= deadline => {
                self.deadline = None;
                self.fired = true;
                log::info!("Inactivity timeout of {:?} reached", self.timeout);
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockClock;

    const THIRTY_MIN: Duration = Duration::from_secs(30 * 60);

    #[test]
    fn unarmed_monitor_never_fires() {
        let clock = MockClock::new();
        let mut monitor = InactivityMonitor::with_clock(THIRTY_MIN, clock.clone());
        clock.advance(THIRTY_MIN * 2);
        assert!(!monitor.poll());
        assert!(monitor.remaining().is_none());
    }

    #[test]
    fn fires_once_at_threshold() {
        let clock = MockClock::new();
        let mut monitor = InactivityMonitor::with_clock(THIRTY_MIN, clock.clone());
        monitor.arm();

        clock.advance(THIRTY_MIN - Duration::from_secs(1));
        assert!(!monitor.poll());
        clock.advance(Duration::from_secs(1));
        assert!(monitor.poll());
        assert!(!monitor.poll());

        monitor.arm();
        clock.advance(THIRTY_MIN);
        assert!(!monitor.poll(), "cannot be re-armed after firing");
    }

    #[test]
    fn activity_resets_the_deadline() {
        let clock = MockClock::new();
        let mut monitor = InactivityMonitor::with_clock(THIRTY_MIN, clock.clone());
        monitor.arm();

        clock.advance(Duration::from_secs(25 * 60));
        monitor.record_activity();
        clock.advance(Duration::from_secs(25 * 60));
        assert!(!monitor.poll());
        assert_eq!(monitor.remaining(), Some(Duration::from_secs(5 * 60)));

        clock.advance(Duration::from_secs(5 * 60));
        assert!(monitor.poll());
    }
}
