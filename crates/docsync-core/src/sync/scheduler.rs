//! Interval and change-event driven cycles

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::engine::SyncEngine;
use crate::Error;
use crate::store::ChangeFeed;

/// Counters for one [`Scheduler::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles: u32,
    pub failed: u32,
    /// Triggers dropped because a cycle was already running.
    pub skipped: u32,
    pub batches: u32,
}

/// Runs [`SyncEngine`] cycles until shutdown.
///
/// A cycle starts on every interval tick and on every batch from the
/// change feed. Batches that arrive while a cycle runs are folded into a
/// single follow-up cycle.
pub struct Scheduler {
    engine: Arc<SyncEngine>,
    interval: Duration,
    feed: Option<Box<dyn ChangeFeed>>,
}

impl Scheduler {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        let interval = engine.config().sync.interval();
        Self {
            engine,
            interval,
            feed: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_feed(mut self, feed: impl ChangeFeed + 'static) -> Self {
        self.feed = Some(Box::new(feed));
        self
    }

    /// Run until `shutdown` turns true or its sender is dropped.
    ///
    /// A cycle in flight when shutdown arrives runs to completion; the
    /// engine's own shutdown signal decides how much of it still writes.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        let mut ticks = time::interval(self.interval.max(Duration::from_millis(1)));
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_ms = self.interval.as_millis() as u64, "scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            let trigger = tokio::select! {
                _ = ticks.tick() => Trigger::Interval,
                batch = next_batch(&mut self.feed) => match batch {
                    Some(events) => Trigger::Changes(events.len()),
                    None => {
                        debug!("change feed closed");
                        self.feed = None;
                        continue;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            if let Trigger::Changes(events) = trigger {
                stats.batches += 1;
                debug!(events, "local changes detected");
            }
            self.cycle(&mut stats).await;

            // Changes seen during the cycle get one more cycle between them.
            let mut queued = 0;
            while let Some(feed) = self.feed.as_mut()
                && let Some(events) = feed.try_next_batch()
            {
                queued += events.len();
                stats.batches += 1;
            }
            if queued > 0 && !*shutdown.borrow() {
                debug!(events = queued, "changes queued during cycle");
                self.cycle(&mut stats).await;
            }
        }

        info!(
            cycles = stats.cycles,
            failed = stats.failed,
            skipped = stats.skipped,
            "scheduler stopped"
        );
        stats
    }

    async fn cycle(&self, stats: &mut SchedulerStats) {
        match self.engine.run_cycle().await {
            Ok(summary) => {
                stats.cycles += 1;
                debug!(cycle_id = %summary.cycle_id, writes = summary.writes(), "scheduled cycle done");
            }
            Err(Error::CycleInProgress) => {
                stats.skipped += 1;
                warn!("cycle still running, trigger skipped");
            }
            Err(e) => {
                stats.failed += 1;
                error!(error = %e, "sync cycle failed");
            }
        }
    }
}

enum Trigger {
    Interval,
    Changes(usize),
}

async fn next_batch(feed: &mut Option<Box<dyn ChangeFeed>>) -> Option<Vec<crate::store::LocalEvent>> {
    match feed {
        Some(feed) => feed.next_batch().await,
        None => std::future::pending().await,
    }
}
