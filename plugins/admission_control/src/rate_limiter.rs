use std::{
  collections::VecDeque,
  time::{Duration, Instant},
};

use dashmap::DashMap;

use crate::{identity::CallerId, violation::AdmissionViolation};

/// Timestamps of admitted requests of a single caller, oldest first.
type RequestHistory = VecDeque<Instant>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
  pub evicted_requests: usize,
  pub removed_callers: usize,
  pub remaining_callers: usize,
}

/// Exact sliding-window rate limiter, keyed by caller.
///
/// Each caller's history lives in its own map entry, and every check-and-record runs while
/// holding that entry's lock, so concurrent requests of the same caller cannot both take the
/// last free slot. Sweeps go through the same locks.
#[derive(Debug)]
pub struct RateLimiter {
  requests_per_window: usize,
  window: Duration,
  histories: DashMap<CallerId, RequestHistory>,
}

fn evict_older_than(history: &mut RequestHistory, now: Instant, horizon: Duration) -> usize {
  let mut evicted = 0;

  while let Some(oldest) = history.front() {
    if now.saturating_duration_since(*oldest) < horizon {
      break;
    }

    history.pop_front();
    evicted += 1;
  }

  evicted
}

impl RateLimiter {
  pub fn new(requests_per_window: usize, window: Duration) -> Self {
    Self {
      requests_per_window,
      window,
      histories: DashMap::new(),
    }
  }

  /// Admits the request and records it, or returns the violation without recording anything.
  #[tracing::instrument(level = "trace", name = "RateLimiter::check_and_record", skip(self, now))]
  pub fn check_and_record(&self, caller_id: &CallerId, now: Instant) -> Option<AdmissionViolation> {
    let mut history = self.histories.entry(caller_id.clone()).or_default();
    evict_older_than(&mut history, now, self.window);

    if history.len() >= self.requests_per_window {
      let retry_after = history
        .front()
        .map(|oldest| {
          self
            .window
            .saturating_sub(now.saturating_duration_since(*oldest))
        })
        .unwrap_or_default();

      return Some(AdmissionViolation::RateLimited {
        limit: self.requests_per_window,
        retry_after: Duration::from_secs(retry_after.as_secs()),
        window: self.window,
      });
    }

    // Keeps the history sorted even if callers race and hand in slightly older instants.
    let position = history.partition_point(|recorded| *recorded <= now);
    history.insert(position, now);

    None
  }

  /// Drops history older than `stale_horizon` and forgets callers left without history.
  ///
  /// The horizon is never shorter than the enforcement window, so a sweep cannot free slots
  /// that are still being counted.
  pub fn sweep(&self, now: Instant, stale_horizon: Duration) -> SweepStats {
    let horizon = stale_horizon.max(self.window);
    let mut stats = SweepStats::default();

    self.histories.retain(|_, history| {
      stats.evicted_requests += evict_older_than(history, now, horizon);

      if history.is_empty() {
        stats.removed_callers += 1;
        return false;
      }

      true
    });

    stats.remaining_callers = self.histories.len();
    stats
  }

  pub fn tracked_callers(&self) -> usize {
    self.histories.len()
  }

  /// Number of recorded requests of the caller, including ones that already left the window
  /// but were not evicted yet.
  pub fn history_len(&self, caller_id: &CallerId) -> usize {
    self
      .histories
      .get(caller_id)
      .map(|history| history.len())
      .unwrap_or(0)
  }
}
