// src/scheduler.rs
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cycle::FetchCycle;

#[derive(Clone, Copy, Debug)]
pub struct PollSchedulerCfg {
    pub interval: Duration,
}

impl Default for PollSchedulerCfg {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
        }
    }
}

/// Drive `cycle` on a fixed interval until `shutdown` resolves, then hand the
/// cycle back.
///
/// Ticks that fall due while a cycle is still running are skipped, so cycles
/// never overlap. A cycle in progress is finished before shutdown is honoured.
pub async fn run_until<F>(mut cycle: FetchCycle, cfg: PollSchedulerCfg, shutdown: F) -> FetchCycle
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(cfg.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    tracing::info!(
        target: "poll",
        interval_ms = cfg.interval.as_millis() as u64,
        page_size = cycle.num_posts(),
        "poll scheduler started"
    );
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                cycle.tick().await;
            }
        }
    }
    tracing::info!(target: "poll", watermark = cycle.watermark(), "poll scheduler stopped");
    cycle
}

/// Spawn a scheduler that runs forever (until the task is aborted).
pub fn spawn_poll_scheduler(cycle: FetchCycle, cfg: PollSchedulerCfg) -> JoinHandle<FetchCycle> {
    tokio::spawn(run_until(cycle, cfg, std::future::pending()))
}
