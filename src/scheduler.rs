use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collector::Collector;
use crate::config::Config;
use crate::dispatch::AdminChannel;

/// Callback invoked after every collection cycle, whether or not every
/// query in it succeeded.
pub type CycleHandler<C> = Box<dyn Fn(&Collector<C>) + Send + Sync>;

/// Drives the collection and discovery cycles of one collector.
///
/// Discovery (inventory plus attribute refresh) runs first and then every
/// `rediscover_interval`; collection runs every `collect_interval`. Both
/// run on the caller's task, so queries never overlap.
pub struct Scheduler<C> {
    collector: Collector<C>,
    queue_manager: String,
    patterns: String,
    collect_interval: Duration,
    rediscover_interval: Duration,
    handlers: parking_lot::Mutex<Vec<CycleHandler<C>>>,
}

impl<C: AdminChannel> Scheduler<C> {
    pub fn new(
        collector: Collector<C>,
        patterns: impl Into<String>,
        collect_interval: Duration,
        rediscover_interval: Duration,
    ) -> Self {
        Self {
            collector,
            queue_manager: String::new(),
            patterns: patterns.into(),
            collect_interval,
            rediscover_interval,
            handlers: parking_lot::Mutex::new(Vec::with_capacity(2)),
        }
    }

    /// Build a collector over `channel` and schedule it as configured.
    pub fn from_config(channel: C, cfg: &Config) -> Self {
        let collector = Collector::new(channel, cfg.capabilities, cfg.reply_timeout);
        let mut scheduler = Self::new(
            collector,
            cfg.queues.clone(),
            cfg.collect_interval,
            cfg.rediscover_interval,
        );
        scheduler.queue_manager = cfg.queue_manager.clone();
        scheduler
    }

    /// Register a callback that fires after each collection cycle.
    pub fn on_collected(&self, f: CycleHandler<C>) {
        self.handlers.lock().push(f);
    }

    pub fn collector(&self) -> &Collector<C> {
        &self.collector
    }

    /// Run until `cancel` fires, then hand the collector back.
    ///
    /// A cycle in progress when cancellation is requested runs to its end.
    pub async fn run(mut self, cancel: CancellationToken) -> Collector<C> {
        self.collector.initialize_attributes();

        let mut collect_ticker = tokio::time::interval(self.collect_interval);
        collect_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut discover_ticker = tokio::time::interval(self.rediscover_interval);
        discover_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            queue_manager = %self.queue_manager,
            patterns = %self.patterns,
            collect_interval = ?self.collect_interval,
            rediscover_interval = ?self.rediscover_interval,
            "scheduler started",
        );

        loop {
            // Biased so a due discovery runs before a due collection.
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = discover_ticker.tick() => self.discover().await,
                _ = collect_ticker.tick() => self.collect().await,
            }
        }

        info!("scheduler stopped");
        self.collector
    }

    async fn discover(&mut self) {
        match self.collector.list_objects(&self.patterns).await {
            Ok(names) => debug!(queues = names.len(), "inventory refreshed"),
            Err(e) => warn!(error = %e, "queue inventory failed"),
        }

        if let Err(e) = self.collector.refresh_metadata(&self.patterns).await {
            warn!(error = %e, "queue attribute refresh failed");
        }
    }

    async fn collect(&mut self) {
        if let Err(e) = self.collector.collect(&self.patterns).await {
            warn!(error = %e, "collection cycle incomplete");
        }

        for handler in self.handlers.lock().iter() {
            handler(&self.collector);
        }
    }
}
