//! Rate of change of monotonically increasing counters.
//!
//! See [`RateTracker`] for details.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Observation {
    value: u64,
    at: Instant,
}

/// Per-entity store turning raw counter observations into a rate in units
/// per second.
///
/// Entities are added on first sight and never removed; an entity that
/// disappears from the stats source simply stops being updated.
///
/// ```
/// # use std::time::{Duration, Instant};
/// # use stream_exporter::rate::RateTracker;
/// let mut rx = RateTracker::default();
/// let t0 = Instant::now();
///
/// assert_eq!(None, rx.observe("eth0", 1000, t0));
/// assert_eq!(Some(100.0), rx.observe("eth0", 1500, t0 + Duration::from_secs(5)));
/// ```
#[derive(Debug)]
pub struct RateTracker<K> {
    entries: HashMap<K, Observation>,
}

impl<K> Default for RateTracker<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq> RateTracker<K> {
    /// Records `value` for `key` as observed at `at` and returns the rate
    /// since the previous observation.
    ///
    /// No rate is returned for the first observation of a key, when no time
    /// passed since the previous observation, or when the counter went
    /// backwards (e.g. an interface restart). The new observation becomes
    /// the baseline in every case.
    pub fn observe(&mut self, key: K, value: u64, at: Instant) -> Option<f64> {
        let current = Observation { value, at };
        let previous = self.entries.insert(key, current)?;

        let elapsed = at.checked_duration_since(previous.at)?.as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }

        let delta = value.checked_sub(previous.value)?;
        Some(delta as f64 / elapsed)
    }

    /// Number of tracked entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entity has been observed yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::QuickCheck;
    use std::time::Duration;

    #[test]
    fn first_observation_has_no_rate() {
        let mut tracker = RateTracker::default();
        assert_eq!(None, tracker.observe("eth0", 1000, Instant::now()));
        assert_eq!(1, tracker.len());
    }

    #[test]
    fn interfaces_are_tracked_independently() {
        let mut tracker = RateTracker::default();
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(5);

        assert_eq!(None, tracker.observe("eth0", 1000, t0));
        assert_eq!(None, tracker.observe("eth1", 0, t0));
        assert_eq!(Some(100.0), tracker.observe("eth0", 1500, t1));

        // eth1's baseline is still at t0.
        let t2 = t1 + Duration::from_secs(2);
        assert_eq!(Some(50.0), tracker.observe("eth1", 350, t2));
    }

    #[test]
    fn reset_suppresses_one_tick_then_resumes() {
        let mut tracker = RateTracker::default();
        let t0 = Instant::now();

        tracker.observe("eth0", 5000, t0);
        assert_eq!(None, tracker.observe("eth0", 100, t0 + Duration::from_secs(1)));
        assert_eq!(
            Some(400.0),
            tracker.observe("eth0", 500, t0 + Duration::from_secs(2))
        );
    }

    #[test]
    fn zero_elapsed_time_has_no_rate() {
        let mut tracker = RateTracker::default();
        let t0 = Instant::now();

        tracker.observe("eth0", 10, t0);
        assert_eq!(None, tracker.observe("eth0", 20, t0));
        assert_eq!(Some(10.0), tracker.observe("eth0", 30, t0 + Duration::from_secs(1)));
    }

    #[test]
    fn time_going_backwards_has_no_rate() {
        let mut tracker = RateTracker::default();
        let t0 = Instant::now() + Duration::from_secs(10);

        tracker.observe("eth0", 10, t0);
        assert_eq!(None, tracker.observe("eth0", 20, t0 - Duration::from_secs(1)));
    }

    #[test]
    fn rate_is_delta_over_elapsed() {
        fn prop(steps: Vec<(u32, u16)>) -> bool {
            let mut tracker = RateTracker::default();
            let mut at = Instant::now();
            let mut value = 0u64;

            if tracker.observe((), value, at).is_some() {
                return false;
            }

            for (increment, millis) in steps {
                let elapsed = Duration::from_millis(u64::from(millis) + 1);
                at += elapsed;
                value += u64::from(increment);

                let expected = f64::from(increment) / elapsed.as_secs_f64();
                match tracker.observe((), value, at) {
                    Some(rate) if (rate - expected).abs() <= expected.abs() * 1e-9 + 1e-9 => {}
                    _ => return false,
                }
            }

            true
        }

        QuickCheck::new().tests(200).quickcheck(prop as fn(_) -> _);
    }
}
