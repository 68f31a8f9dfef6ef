use std::time::{Duration, Instant};

pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebouncePoll {
    /// Nothing scheduled.
    Idle,
    /// A call is scheduled and fires after the remaining quiet period.
    Waiting(Duration),
    /// The quiet period elapsed; the caller should run now.
    Fire,
    /// The quiet period elapsed while a previous run was still in flight;
    /// the scheduled call is discarded.
    Dropped,
}

/// Trailing-edge debouncer with a single pending timer and a busy guard.
///
/// Time is passed in by the caller so the owner can drive it from its own
/// event loop and tests can step it deterministically.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
    in_flight: bool,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            in_flight: false,
        }
    }

    /// Replaces any pending call with one firing `delay` after `now`.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Time until the pending call fires; zero once it is due.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn poll(&mut self, now: Instant) -> DebouncePoll {
        let Some(deadline) = self.deadline else {
            return DebouncePoll::Idle;
        };
        if now < deadline {
            return DebouncePoll::Waiting(deadline - now);
        }
        self.deadline = None;
        if self.in_flight {
            return DebouncePoll::Dropped;
        }
        self.in_flight = true;
        DebouncePoll::Fire
    }

    /// Marks the run started by the last [`DebouncePoll::Fire`] as complete.
    pub fn finish(&mut self) {
        self.in_flight = false;
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn idle_until_scheduled() {
        let mut d = Debouncer::default();
        assert_eq!(d.poll(Instant::now()), DebouncePoll::Idle);
    }

    #[test]
    fn burst_within_quiet_window_fires_once() {
        let t0 = Instant::now();
        let mut d = Debouncer::default();
        let mut fired = 0;
        for i in 0..10 {
            let now = t0 + ms(i * 20);
            d.schedule(now);
            if d.poll(now) == DebouncePoll::Fire {
                fired += 1;
            }
        }
        // last schedule at 180ms, so nothing fires before 280ms
        assert_eq!(d.poll(t0 + ms(279)), DebouncePoll::Waiting(ms(1)));
        if d.poll(t0 + ms(280)) == DebouncePoll::Fire {
            fired += 1;
        }
        d.finish();
        assert_eq!(d.poll(t0 + ms(500)), DebouncePoll::Idle);
        assert_eq!(fired, 1);
    }

    #[test]
    fn reschedule_pushes_deadline_back() {
        let t0 = Instant::now();
        let mut d = Debouncer::default();
        d.schedule(t0);
        d.schedule(t0 + ms(90));
        assert!(matches!(d.poll(t0 + ms(120)), DebouncePoll::Waiting(_)));
        assert_eq!(d.poll(t0 + ms(190)), DebouncePoll::Fire);
    }

    #[test]
    fn fire_while_in_flight_is_dropped() {
        let t0 = Instant::now();
        let mut d = Debouncer::default();
        d.schedule(t0);
        assert_eq!(d.poll(t0 + ms(100)), DebouncePoll::Fire);
        assert!(d.in_flight());

        d.schedule(t0 + ms(110));
        assert_eq!(d.poll(t0 + ms(210)), DebouncePoll::Dropped);
        assert_eq!(d.remaining(t0 + ms(210)), None);

        d.finish();
        d.schedule(t0 + ms(300));
        assert_eq!(d.poll(t0 + ms(400)), DebouncePoll::Fire);
    }
}
