//! Stop signalling and fixed-rate pacing for detection loops.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Shared cooperative stop flag.
///
/// Cloning shares the flag. Waiters wake as soon as it is raised; loops
/// still decide themselves where they honour it.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock().unwrap_or_else(|e| e.into_inner());
        *stopped = true;
        cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleeps up to `timeout`, returning early if the flag is raised.
    /// Returns whether the flag is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

/// Fixed-rate ticker.
///
/// Ticks fall on a regular grid starting from the first call to `wait`.
/// When a cycle overruns its slot the grid restarts from now, so there is
/// never a burst of catch-up ticks.
#[derive(Debug)]
pub struct Cadence {
    period: Duration,
    next: Option<Instant>,
}

impl Cadence {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time left before the next tick, measured at `now`, and advances the
    /// schedule past it.
    pub fn next_delay(&mut self, now: Instant) -> Duration {
        let delay = match self.next {
            None => Duration::ZERO,
            Some(due) if due > now => due - now,
            // Overrun
            Some(_) => Duration::ZERO,
        };
        let tick = now + delay;
        self.next = Some(tick + self.period);
        delay
    }

    /// Waits for the next tick. Returns `true` if `stop` was raised meanwhile.
    pub fn wait(&mut self, stop: &StopSignal) -> bool {
        let delay = self.next_delay(Instant::now());
        if delay.is_zero() {
            return stop.is_stopped();
        }
        stop.wait_timeout(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_stop_signal_shared_between_clones() {
        let signal = StopSignal::new();
        let other = signal.clone();
        assert!(!other.is_stopped());
        signal.stop();
        assert!(other.is_stopped());
    }

    #[test]
    fn test_wait_timeout_expires_without_stop() {
        let signal = StopSignal::new();
        let start = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_timeout_wakes_on_stop() {
        let signal = StopSignal::new();
        let remote = signal.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.stop();
        });

        let start = Instant::now();
        assert!(signal.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_cadence_fixed_rate() {
        let mut cadence = Cadence::new(Duration::from_millis(100));
        let t0 = Instant::now();

        assert_eq!(cadence.next_delay(t0), Duration::ZERO);
        // Cycle took 30ms: wait out the rest of the period
        assert_eq!(
            cadence.next_delay(t0 + Duration::from_millis(30)),
            Duration::from_millis(70)
        );
        // Next tick stays on the grid at 200ms
        assert_eq!(
            cadence.next_delay(t0 + Duration::from_millis(150)),
            Duration::from_millis(50)
        );
    }

    #[test]
    fn test_cadence_reschedules_after_overrun() {
        let mut cadence = Cadence::new(Duration::from_millis(100));
        let t0 = Instant::now();
        cadence.next_delay(t0);

        // Overran by 250ms: tick now, no catch-up
        let late = t0 + Duration::from_millis(350);
        assert_eq!(cadence.next_delay(late), Duration::ZERO);
        assert_eq!(
            cadence.next_delay(late + Duration::from_millis(10)),
            Duration::from_millis(90)
        );
    }

    #[test]
    fn test_cadence_wait_reports_stop() {
        let signal = StopSignal::new();
        signal.stop();
        let mut cadence = Cadence::new(Duration::from_secs(30));
        assert!(cadence.wait(&signal));
        // Second wait would sleep a full period without the early wake
        assert!(cadence.wait(&signal));
    }
}
