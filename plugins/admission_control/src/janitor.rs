use std::{sync::Arc, time::Duration};

use tokio::{
  runtime::Handle,
  task::JoinHandle,
  time::{interval, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::rate_limiter::RateLimiter;

/// Background task that periodically sweeps stale rate-limit history.
///
/// The task is aborted when the janitor is dropped.
#[derive(Debug)]
pub struct StateJanitor {
  handle: JoinHandle<()>,
}

impl StateJanitor {
  /// Spawns the sweep loop on the current tokio runtime, or returns `None` when called outside of one.
  pub fn try_spawn(
    rate_limiter: Arc<RateLimiter>,
    every: Duration,
    stale_horizon: Duration,
  ) -> Option<Self> {
    let runtime = match Handle::try_current() {
      Ok(runtime) => runtime,
      Err(e) => {
        warn!(
          "admission control janitor is not running, no async runtime available: {}",
          e
        );
        return None;
      }
    };

    let handle = runtime.spawn(async move {
      let mut ticker = interval(every);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      // the first tick completes immediately
      ticker.tick().await;

      loop {
        ticker.tick().await;

        let stats = rate_limiter.sweep(Instant::now().into_std(), stale_horizon);
        info!(
          evicted_requests = stats.evicted_requests,
          removed_callers = stats.removed_callers,
          remaining_callers = stats.remaining_callers,
          "admission control janitor sweep completed"
        );
      }
    });

    debug!(?every, ?stale_horizon, "admission control janitor started");

    Some(Self { handle })
  }

  pub fn is_running(&self) -> bool {
    !self.handle.is_finished()
  }

  pub fn shutdown(self) {
    drop(self)
  }
}

impl Drop for StateJanitor {
  fn drop(&mut self) {
    self.handle.abort();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::identity::CallerId;

  const HOUR: Duration = Duration::from_secs(3600);

  #[test]
  fn does_not_start_without_runtime() {
    let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)));

    assert!(StateJanitor::try_spawn(limiter, HOUR, HOUR).is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn sweeps_idle_callers_periodically() {
    let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)));
    let janitor = StateJanitor::try_spawn(limiter.clone(), HOUR, HOUR).unwrap();

    assert!(limiter
      .check_and_record(&CallerId::new("u1"), Instant::now().into_std())
      .is_none());
    assert_eq!(limiter.tracked_callers(), 1);

    tokio::time::sleep(2 * HOUR + Duration::from_secs(1)).await;

    assert_eq!(limiter.tracked_callers(), 0);
    assert!(janitor.is_running());
  }

  #[tokio::test(start_paused = true)]
  async fn stops_when_dropped() {
    let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)));
    let janitor = StateJanitor::try_spawn(limiter.clone(), HOUR, HOUR).unwrap();
    janitor.shutdown();

    assert!(limiter
      .check_and_record(&CallerId::new("u1"), Instant::now().into_std())
      .is_none());
    tokio::time::sleep(3 * HOUR).await;

    assert_eq!(limiter.tracked_callers(), 1);
  }
}
