// Time-of-day refresh scheduler.
//
// Polls the injected clock and force-refreshes the newest cached matchday
// when the current hour:minute matches a trigger time. After a trigger it
// sleeps for the cooldown so the same minute cannot fire twice. There is no
// misfire recovery: a trigger time that passes while the process is down is
// simply missed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveTime, Timelike};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::cache::{Clock, MatchdayCache};

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// Local times of day at which a refresh fires (minute resolution).
    pub trigger_times: Vec<NaiveTime>,
    pub poll_interval: Duration,
    /// Pause after a trigger, longer than a minute.
    pub cooldown: Duration,
    /// Matchday refreshed when the cache is still empty.
    pub default_matchday: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN);
        ScheduleConfig {
            trigger_times: vec![at(21, 45), at(23, 15), at(9, 0)],
            poll_interval: Duration::from_secs(30),
            cooldown: Duration::from_secs(90),
            default_matchday: 10,
        }
    }
}

pub struct RefreshScheduler {
    cache: Arc<MatchdayCache>,
    clock: Arc<dyn Clock>,
    config: ScheduleConfig,
}

impl RefreshScheduler {
    pub fn new(cache: Arc<MatchdayCache>, clock: Arc<dyn Clock>, config: ScheduleConfig) -> Self {
        Self {
            cache,
            clock,
            config,
        }
    }

    /// Whether `now` falls in the same hour and minute as a trigger time.
    pub fn is_trigger_time(&self, now: NaiveTime) -> bool {
        self.config
            .trigger_times
            .iter()
            .any(|t| t.hour() == now.hour() && t.minute() == now.minute())
    }

    /// One poll. Returns `true` when a refresh was triggered, whether or not
    /// it succeeded.
    pub async fn tick(&self) -> bool {
        let now = self.clock.now();
        if !self.is_trigger_time(now.time()) {
            return false;
        }

        let matchday = self
            .cache
            .latest_matchday()
            .await
            .unwrap_or(self.config.default_matchday);
        info!(matchday, at = %now.format("%H:%M"), "scheduled refresh triggered");

        match self.cache.force_refresh(matchday).await {
            Ok(result) => info!(
                matchday,
                managers = result.managers.len(),
                "scheduled refresh complete"
            ),
            Err(e) => warn!(matchday, "scheduled refresh failed: {e}"),
        }
        true
    }

    /// Poll until `shutdown` fires (or its sender is dropped).
    pub async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        info!(
            triggers = ?self.config.trigger_times,
            "refresh scheduler started"
        );

        loop {
            let delay = if self.tick().await {
                self.config.cooldown
            } else {
                self.config.poll_interval
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => {
                    info!("refresh scheduler stopping");
                    break;
                }
            }
        }
    }
}
