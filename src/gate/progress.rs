//! Share counters and the progress gate.
//!
//! Counters live in one store hash; the gating rule itself is pure and the
//! goal is fixed at process start.

use crate::store::{credited_key, Store, SHARES_KEY};
use std::sync::Arc;
use tracing::debug;

/// Width of the progress bar rendered into user-facing messages.
pub const BAR_WIDTH: usize = 12;

/// Renders a fixed-width progress bar: `round(width * n / max(1, goal))`
/// filled cells, clamped to `[0, width]`, followed by empty cells.
#[must_use]
pub fn progress_bar(count: i64, goal: u32, width: usize) -> String {
    let count = count.max(0) as u64;
    let goal = u64::from(goal.max(1));
    let width_cells = width as u64;
    // Integer round-half-up; exact for every count/goal pair the gate sees.
    let filled = ((count * width_cells + goal / 2) / goal).min(width_cells) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Tracks per-user share counts against the configured goal.
#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn Store>,
    goal: u32,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, goal: u32) -> Self {
        Self { store, goal }
    }

    /// The configured gating threshold.
    #[must_use]
    pub const fn goal(&self) -> u32 {
        self.goal
    }

    /// Current share count for `user_id`, never negative.
    pub async fn get(&self, user_id: i64) -> i64 {
        self.store
            .hget(SHARES_KEY, &user_id.to_string())
            .await
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(0)
            .max(0)
    }

    /// Increment the share count for `user_id`, returning the new value.
    pub async fn increment(&self, user_id: i64) -> i64 {
        self.store
            .hincrby(SHARES_KEY, &user_id.to_string(), 1)
            .await
            .max(0)
    }

    /// Reset the share count for `user_id` to exactly zero.
    pub async fn reset(&self, user_id: i64) {
        self.store.hset(SHARES_KEY, &user_id.to_string(), "0").await;
    }

    /// Credit `referrer` for bringing in `newcomer`, returning the new
    /// count.
    ///
    /// A given newcomer credits a given referrer at most once; repeated
    /// deep-link hits return `None`. Self-referrals are ignored.
    pub async fn credit(&self, referrer: i64, newcomer: i64) -> Option<i64> {
        if referrer == newcomer {
            return None;
        }
        if !self
            .store
            .sadd(&credited_key(referrer), &newcomer.to_string())
            .await
        {
            return None;
        }
        let count = self.increment(referrer).await;
        debug!("Share {count}/{} credited to {referrer} by {newcomer}", self.goal);
        Some(count)
    }

    /// Whether `count` satisfies the gating threshold.
    #[must_use]
    pub fn is_unlocked(&self, count: i64) -> bool {
        count >= i64::from(self.goal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    #[test]
    fn test_progress_bar_bounds() {
        assert_eq!(progress_bar(0, 6, 12), "░".repeat(12));
        assert_eq!(progress_bar(6, 6, 12), "█".repeat(12));
        assert_eq!(progress_bar(3, 6, 12), format!("{}{}", "█".repeat(6), "░".repeat(6)));
    }

    #[test]
    fn test_progress_bar_clamps() {
        // Overshooting the goal stays pinned at full.
        assert_eq!(progress_bar(99, 6, 12), "█".repeat(12));
        // Negative counts render empty.
        assert_eq!(progress_bar(-3, 6, 12), "░".repeat(12));
        // A zero goal is treated as one instead of dividing by zero.
        assert_eq!(progress_bar(1, 0, 12), "█".repeat(12));
    }

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(Arc::new(MemoryStore::new()), 6)
    }

    #[tokio::test]
    async fn test_increment_and_reset() {
        let progress = tracker();

        assert_eq!(progress.get(1).await, 0);
        assert_eq!(progress.increment(1).await, 1);
        assert_eq!(progress.increment(1).await, 2);

        progress.reset(1).await;
        assert_eq!(progress.get(1).await, 0);
    }

    #[tokio::test]
    async fn test_credit_dedupes_per_newcomer() {
        let progress = tracker();

        assert_eq!(progress.credit(555, 10).await, Some(1));
        assert_eq!(progress.credit(555, 11).await, Some(2));
        // The same newcomer cannot credit twice.
        assert_eq!(progress.credit(555, 10).await, None);
        // Nobody can credit themselves.
        assert_eq!(progress.credit(555, 555).await, None);

        assert_eq!(progress.get(555).await, 2);
    }

    #[tokio::test]
    async fn test_unlock_threshold() {
        let progress = tracker();
        assert!(!progress.is_unlocked(5));
        assert!(progress.is_unlocked(6));
        assert!(progress.is_unlocked(7));
    }
}
