//! The collection service: owns the channel, the attribute registry, the
//! metadata cache and the metric store, and runs the query cycles.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::decode;
use crate::dispatch::{AdminChannel, Dispatcher, QueryKind};
use crate::error::CollectError;
use crate::health::CollectorMetrics;
use crate::metadata::MetadataCache;
use crate::pattern::{PatternSet, QueryPlan};
use crate::registry::{AttributeRegistry, Capabilities};
use crate::store::{self, MetricStore, StatusValue};

/// Source of the current local time, read once per status reply.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Queue status collector for one queue manager connection.
///
/// Every query-issuing operation takes `&mut self`: replies on the shared
/// reply queue are only attributable while one query is in flight.
pub struct Collector<C> {
    dispatcher: Dispatcher<C>,
    capabilities: Capabilities,
    registry: OnceLock<AttributeRegistry>,
    metadata: Arc<MetadataCache>,
    store: MetricStore,
    metrics: Option<Arc<CollectorMetrics>>,
    clock: Clock,
}

impl<C: AdminChannel> Collector<C> {
    pub fn new(channel: C, capabilities: Capabilities, reply_timeout: Duration) -> Self {
        Self {
            dispatcher: Dispatcher::new(channel, reply_timeout),
            capabilities,
            registry: OnceLock::new(),
            metadata: Arc::new(MetadataCache::new()),
            store: MetricStore::default(),
            metrics: None,
            clock: Arc::new(Local::now),
        }
    }

    /// Replace the wall clock used for time-since-put/get values.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Record query and cycle metrics into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<CollectorMetrics>) -> Self {
        self.dispatcher.set_metrics(Arc::clone(&metrics));
        self.metrics = Some(metrics);
        self
    }

    /// Share an existing metadata cache, e.g. with another collector that
    /// reads the same queue manager.
    pub fn with_metadata(mut self, metadata: Arc<MetadataCache>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Build the attribute registry from the capability flags. Later calls
    /// return the registry built by the first.
    pub fn initialize_attributes(&self) -> &AttributeRegistry {
        self.registry.get_or_init(|| {
            let registry = AttributeRegistry::new(&self.capabilities);
            info!(
                metrics = registry.len(),
                platform = ?self.capabilities.platform,
                use_publications = self.capabilities.use_publications,
                reset_stats = self.capabilities.reset_stats_enabled(),
                "attribute registry initialized",
            );
            registry
        })
    }

    pub fn registry(&self) -> Result<&AttributeRegistry, CollectError> {
        self.registry.get().ok_or_else(CollectError::not_initialized)
    }

    pub fn reply_timeout(&self) -> Duration {
        self.dispatcher.reply_timeout()
    }

    pub fn channel(&self) -> &C {
        self.dispatcher.channel()
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn metadata(&self) -> &Arc<MetadataCache> {
        &self.metadata
    }

    /// Values from the most recent collection cycle.
    pub fn store(&self) -> &MetricStore {
        &self.store
    }

    /// Values of one metric from the most recent collection cycle, keyed by
    /// queue name.
    pub fn values(
        &self,
        metric: &str,
    ) -> Result<impl Iterator<Item = (&str, &StatusValue)>, CollectError> {
        let registry = self.registry()?;
        if !registry.contains(metric) {
            return Err(CollectError::Configuration(format!("unknown metric {metric}")));
        }

        Ok(self
            .store
            .values(metric)
            .into_iter()
            .flatten()
            .map(|(k, v)| (k.as_str(), v)))
    }

    /// Convert a raw value of `metric` into its exported form.
    pub fn normalize(&self, metric: &str, raw: i64) -> Result<f64, CollectError> {
        let descriptor = self
            .registry()?
            .get(metric)
            .ok_or_else(|| CollectError::Configuration(format!("unknown metric {metric}")))?;
        Ok(store::normalize(descriptor, raw))
    }

    /// Query the names of the queues matching `patterns` and make them the
    /// cache's inventory.
    ///
    /// Exclusions are applied to the returned names. The inventory is only
    /// replaced when every query succeeded.
    pub async fn list_objects(&mut self, patterns: &str) -> Result<Vec<String>, CollectError> {
        self.registry()?;

        let set = PatternSet::parse(patterns);
        if set.is_empty() {
            debug!("no queue patterns, inventory unchanged");
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let mut names = Vec::new();
        for pattern in set.queries() {
            let found = query_names(&mut self.dispatcher, &pattern).await?;
            debug!(pattern = %pattern, found = found.len(), "queue names received");
            names.extend(found);
        }

        names.retain(|n| !set.is_excluded(n));
        names.sort();
        names.dedup();

        self.metadata.sync_inventory(&names);

        info!(
            queues = names.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "queue inventory updated",
        );
        if let Some(m) = self.metrics.as_deref() {
            m.metadata_entries.set(self.metadata.len() as f64);
            m.observe_cycle("inventory", start.elapsed());
        }

        Ok(names)
    }

    /// Run one collection cycle over `patterns`.
    ///
    /// The store is cleared first. A failing query does not stop the cycle:
    /// the remaining targets are still queried and the first error is
    /// returned at the end, with every value collected so far kept. Returns
    /// the number of queues with values.
    pub async fn collect(&mut self, patterns: &str) -> Result<usize, CollectError> {
        let registry = self.registry.get().ok_or_else(CollectError::not_initialized)?;
        let start = Instant::now();

        self.store.reset_cycle(registry);

        let plan = QueryPlan::resolve(patterns);
        let targets = plan.targets(&self.metadata.known_objects());
        let reset_stats = self.capabilities.reset_stats_enabled();

        debug!(
            targets = targets.len(),
            per_object = plan.is_per_object(),
            reset_stats,
            "starting collection",
        );

        let mut first_err = None;
        for target in &targets {
            let status = collect_status(
                &mut self.dispatcher,
                registry,
                &self.metadata,
                &mut self.store,
                target,
                self.clock.as_ref(),
            )
            .await;

            let result = match status {
                Ok(_) if reset_stats => {
                    collect_reset_stats(&mut self.dispatcher, registry, &mut self.store, target)
                        .await
                }
                other => other,
            };

            if let Err(e) = result {
                warn!(pattern = %target, error = %e, "queue query failed");
                first_err.get_or_insert(e);
            }
        }

        let objects = self.store.object_count();
        debug!(
            objects,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "collection finished",
        );
        if let Some(m) = self.metrics.as_deref() {
            m.objects_collected.set(objects as f64);
            m.observe_cycle("collect", start.elapsed());
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(objects),
        }
    }

    /// Refresh the cached attributes of the queues matching `patterns`.
    ///
    /// Stops at the first failing query; attributes merged before it are
    /// kept. Returns the number of replies merged.
    pub async fn refresh_metadata(&mut self, patterns: &str) -> Result<usize, CollectError> {
        self.registry()?;

        let set = PatternSet::parse(patterns);
        let start = Instant::now();
        let mut merged = 0;

        for pattern in set.queries() {
            let mut replies = self
                .dispatcher
                .query(QueryKind::QueueAttributes, &pattern)
                .await?;

            while let Some(msg) = replies.next().await? {
                match decode::parse_attributes(&msg) {
                    Some(attrs) if set.is_excluded(&attrs.name) => {}
                    Some(attrs) => {
                        self.metadata.merge(&attrs);
                        merged += 1;
                    }
                    None => replies.mark_skipped(&msg),
                }
            }
        }

        info!(
            merged,
            cached = self.metadata.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "queue attributes refreshed",
        );
        if let Some(m) = self.metrics.as_deref() {
            m.metadata_entries.set(self.metadata.len() as f64);
            m.observe_cycle("discover", start.elapsed());
        }

        Ok(merged)
    }
}

async fn query_names<C: AdminChannel>(
    dispatcher: &mut Dispatcher<C>,
    pattern: &str,
) -> Result<Vec<String>, CollectError> {
    let mut replies = dispatcher.query(QueryKind::QueueNames, pattern).await?;
    let mut names = Vec::new();

    while let Some(msg) = replies.next().await? {
        let found = decode::parse_names(&msg);
        if found.is_empty() {
            replies.mark_skipped(&msg);
        }
        names.extend(found);
    }

    Ok(names)
}

async fn collect_status<C: AdminChannel>(
    dispatcher: &mut Dispatcher<C>,
    registry: &AttributeRegistry,
    metadata: &MetadataCache,
    store: &mut MetricStore,
    pattern: &str,
    clock: &(dyn Fn() -> DateTime<Local> + Send + Sync),
) -> Result<usize, CollectError> {
    let mut replies = dispatcher.query(QueryKind::QueueStatus, pattern).await?;
    let mut keyed = 0;

    while let Some(msg) = replies.next().await? {
        // Timed per reply, not per cycle.
        let now = clock();
        match decode::parse_status(&msg, registry, metadata, store, &now) {
            Some(_) => keyed += 1,
            None => replies.mark_skipped(&msg),
        }
    }

    Ok(keyed)
}

async fn collect_reset_stats<C: AdminChannel>(
    dispatcher: &mut Dispatcher<C>,
    registry: &AttributeRegistry,
    store: &mut MetricStore,
    pattern: &str,
) -> Result<usize, CollectError> {
    let mut replies = dispatcher.query(QueryKind::ResetQueueStats, pattern).await?;
    let mut keyed = 0;

    while let Some(msg) = replies.next().await? {
        match decode::parse_reset_stats(&msg, registry, store) {
            Some(_) => keyed += 1,
            None => replies.mark_skipped(&msg),
        }
    }

    Ok(keyed)
}
