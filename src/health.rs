use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

/// Prometheus metrics describing the collector's own behaviour.
///
/// All metrics use the "mqstat" namespace and are labelled by PCF command
/// where that applies.
pub struct CollectorMetrics {
    registry: Registry,

    /// Commands submitted by command.
    pub queries: CounterVec,
    /// Failed queries by command and error_type (transport/protocol).
    pub query_errors: CounterVec,
    /// Reply messages received by command.
    pub replies_received: CounterVec,
    /// Replies that yielded no object name, by command.
    pub replies_skipped: CounterVec,
    /// Reply sets that ended on a receive timeout rather than a last marker.
    pub reply_timeouts: CounterVec,
    /// Stale replies discarded before a command was sent.
    pub stale_replies: CounterVec,
    /// Cycle duration by cycle (collect/inventory/discover).
    pub cycle_duration: HistogramVec,
    /// Objects with values in the latest collection cycle.
    pub objects_collected: Gauge,
    /// Entries in the metadata cache after the latest discovery.
    pub metadata_entries: Gauge,
}

impl CollectorMetrics {
    /// Creates the metric set with everything registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let queries = CounterVec::new(
            Opts::new("queries_total", "Total PCF commands submitted.").namespace("mqstat"),
            &["command"],
        )?;
        let query_errors = CounterVec::new(
            Opts::new("query_errors_total", "Total failed queries by error type.")
                .namespace("mqstat"),
            &["command", "error_type"],
        )?;
        let replies_received = CounterVec::new(
            Opts::new("replies_received_total", "Total reply messages received.")
                .namespace("mqstat"),
            &["command"],
        )?;
        let replies_skipped = CounterVec::new(
            Opts::new(
                "replies_skipped_total",
                "Replies skipped because no object name could be extracted.",
            )
            .namespace("mqstat"),
            &["command"],
        )?;
        let reply_timeouts = CounterVec::new(
            Opts::new(
                "reply_timeouts_total",
                "Reply sets completed by a receive timeout.",
            )
            .namespace("mqstat"),
            &["command"],
        )?;
        let stale_replies = CounterVec::new(
            Opts::new(
                "stale_replies_total",
                "Stale replies discarded before submitting a command.",
            )
            .namespace("mqstat"),
            &["command"],
        )?;
        let cycle_duration = HistogramVec::new(
            HistogramOpts::new("cycle_duration_seconds", "Duration of collection cycles.")
                .namespace("mqstat")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["cycle"],
        )?;
        let objects_collected = Gauge::with_opts(
            Opts::new(
                "objects_collected",
                "Objects with values in the latest collection cycle.",
            )
            .namespace("mqstat"),
        )?;
        let metadata_entries = Gauge::with_opts(
            Opts::new("metadata_entries", "Entries in the queue metadata cache.")
                .namespace("mqstat"),
        )?;

        registry.register(Box::new(queries.clone()))?;
        registry.register(Box::new(query_errors.clone()))?;
        registry.register(Box::new(replies_received.clone()))?;
        registry.register(Box::new(replies_skipped.clone()))?;
        registry.register(Box::new(reply_timeouts.clone()))?;
        registry.register(Box::new(stale_replies.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;
        registry.register(Box::new(objects_collected.clone()))?;
        registry.register(Box::new(metadata_entries.clone()))?;

        Ok(Self {
            registry,
            queries,
            query_errors,
            replies_received,
            replies_skipped,
            reply_timeouts,
            stale_replies,
            cycle_duration,
            objects_collected,
            metadata_entries,
        })
    }

    pub fn observe_cycle(&self, cycle: &str, elapsed: Duration) {
        self.cycle_duration
            .with_label_values(&[cycle])
            .observe(elapsed.as_secs_f64());
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buf = Vec::with_capacity(4096);
        encoder
            .encode(&families, &mut buf)
            .context("encoding collector metrics")?;
        String::from_utf8(buf).context("collector metrics are not valid UTF-8")
    }

    /// The underlying registry, for embedding in a larger exposition.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
