//! Fixed-interval auto-save tick.

use std::time::{Duration, Instant};

use crate::ports::{Clock, RealClock};

pub struct AutoSave<C: Clock = RealClock> {
    interval: Duration,
    next_tick: Option<Instant>,
    clock: C,
}

impl AutoSave<RealClock> {
    pub fn new(interval: Duration) -> Self {
        Self::with_clock(interval, RealClock)
    }
}

impl<C: Clock> AutoSave<C> {
    pub fn with_clock(interval: Duration, clock: C) -> Self {
        Self {
            interval,
            next_tick: None,
            clock,
        }
    }

    pub fn start(&mut self) {
        if self.next_tick.is_none() && !self.interval.is_zero() {
            self.next_tick = Some(self.clock.now() + self.interval);
        }
    }

    /// True when a tick has elapsed and there is something to save.
    /// Missed ticks collapse into one.
    pub fn poll(&mut self, dirty: bool) -> bool {
        let Some(mut next) = self.next_tick else {
            return false;
        };
        let now = self.clock.now();
        if now < next {
            return false;
        }
        while next <= now {
            next += self.interval;
        }
        self.next_tick = Some(next);
        dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockClock;

    const TICK: Duration = Duration::from_secs(30);

    #[test]
    fn saves_only_when_dirty_on_tick() {
        let clock = MockClock::new();
        let mut autosave = AutoSave::with_clock(TICK, clock.clone());
        autosave.start();

        assert!(!autosave.poll(true), "before the first tick");
        clock.advance(TICK);
        assert!(!autosave.poll(false));
        clock.advance(TICK);
        assert!(autosave.poll(true));
        assert!(!autosave.poll(true), "same tick only once");
    }

    #[test]
    fn missed_ticks_collapse() {
        let clock = MockClock::new();
        let mut autosave = AutoSave::with_clock(TICK, clock.clone());
        autosave.start();

        clock.advance(TICK * 5);
        assert!(autosave.poll(true));
        assert!(!autosave.poll(true));
        clock.advance(TICK);
        assert!(autosave.poll(true));
    }

    #[test]
    fn not_started_or_zero_interval_never_ticks() {
        let clock = MockClock::new();
        let mut autosave = AutoSave::with_clock(TICK, clock.clone());
        clock.advance(TICK);
        assert!(!autosave.poll(true));

        let mut disabled = AutoSave::with_clock(Duration::ZERO, clock.clone());
        disabled.start();
        clock.advance(TICK);
        assert!(!disabled.poll(true));
    }
}
