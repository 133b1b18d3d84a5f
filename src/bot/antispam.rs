use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

const PRUNE_ABOVE: usize = 1024;

/// Drops updates that arrive from the same user faster than `interval`.
pub struct SpamGuard {
    interval: Duration,
    last_seen: Mutex<HashMap<u64, Instant>>,
}

impl SpamGuard {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Records the update and tells whether it should be handled. A rejected
    /// update does not extend the quiet period.
    pub fn allow(&self, user_id: u64, now: Instant) -> bool {
        if self.interval.is_zero() {
            return true;
        }

        let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = last_seen.get(&user_id) {
            if now.saturating_duration_since(*previous) < self.interval {
                return false;
            }
        }
        last_seen.insert(user_id, now);

        if last_seen.len() > PRUNE_ABOVE {
            let interval = self.interval;
            last_seen.retain(|_, seen| now.saturating_duration_since(*seen) < interval);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_update_inside_interval_is_dropped() {
        let guard = SpamGuard::new(Duration::from_millis(500));
        let t = Instant::now();
        assert!(guard.allow(1, t));
        assert!(!guard.allow(1, t + Duration::from_millis(200)));
        assert!(guard.allow(2, t + Duration::from_millis(200)));
        assert!(guard.allow(1, t + Duration::from_millis(500)));
    }

    #[test]
    fn rejected_updates_do_not_extend_the_wait() {
        let guard = SpamGuard::new(Duration::from_millis(500));
        let t = Instant::now();
        assert!(guard.allow(1, t));
        assert!(!guard.allow(1, t + Duration::from_millis(400)));
        assert!(guard.allow(1, t + Duration::from_millis(600)));
    }

    #[test]
    fn zero_interval_disables_the_guard() {
        let guard = SpamGuard::new(Duration::ZERO);
        let t = Instant::now();
        assert!(guard.allow(1, t));
        assert!(guard.allow(1, t));
    }

    #[test]
    fn stale_entries_are_pruned() {
        let guard = SpamGuard::new(Duration::from_millis(10));
        let t = Instant::now();
        for user in 0..=PRUNE_ABOVE as u64 {
            guard.allow(user, t);
        }
        guard.allow(9999, t + Duration::from_secs(1));
        assert_eq!(guard.last_seen.lock().unwrap().len(), 1);
    }
}
