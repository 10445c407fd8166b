use std::collections::HashMap;

use serde::Deserialize;

use crate::pcf;

pub const ATTR_Q_NAME: &str = "name";
pub const ATTR_Q_MSGAGE: &str = "oldest_message_age";
pub const ATTR_Q_IPPROCS: &str = "input_handles";
pub const ATTR_Q_OPPROCS: &str = "output_handles";
pub const ATTR_Q_QTIME_SHORT: &str = "qtime_short";
pub const ATTR_Q_QTIME_LONG: &str = "qtime_long";
pub const ATTR_Q_DEPTH: &str = "depth";
pub const ATTR_Q_CURFSIZE: &str = "qfile_current_size";
pub const ATTR_Q_CURMAXFSIZE: &str = "qfile_max_size";
pub const ATTR_Q_SINCE_PUT: &str = "time_since_put";
pub const ATTR_Q_SINCE_GET: &str = "time_since_get";
pub const ATTR_Q_MAX_DEPTH: &str = "attribute_max_depth";
pub const ATTR_Q_USAGE: &str = "attribute_usage";
/// Named like the published put statistic so dashboards can merge both sources.
pub const ATTR_Q_INTERVAL_PUT: &str = "mqput_mqput1_count";
/// Named like the published get statistic so dashboards can merge both sources.
pub const ATTR_Q_INTERVAL_GET: &str = "mqget_count";
/// Highest depth over the last reset-statistics interval. Not the configured
/// maximum, which is [`ATTR_Q_MAX_DEPTH`].
pub const ATTR_Q_INTERVAL_HI_DEPTH: &str = "hi_depth";

/// Operating platform of the queue manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    Distributed,
    Zos,
}

/// Deployment capability flags, fixed for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Capabilities {
    /// Queue manager platform.
    #[serde(default)]
    pub platform: Platform,

    /// Queue depth is taken from published resource statistics rather than
    /// from status replies.
    #[serde(default)]
    pub use_publications: bool,

    /// Issue RESET QSTATS after every status query.
    #[serde(default)]
    pub use_reset_q_stats: bool,
}

impl Capabilities {
    /// Interval statistics are only collected on z/OS, where the queue
    /// manager does not publish them.
    pub fn reset_stats_enabled(&self) -> bool {
        self.platform == Platform::Zos && self.use_reset_q_stats
    }
}

/// How a raw integer is turned into an exported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    /// Exported as-is.
    Identity,
    /// Raw value in microseconds, exported in seconds.
    MicrosToSeconds,
}

/// Describes one named metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    /// PCF parameter code, or `None` for values computed by the collector.
    pub code: Option<i32>,
    /// Element to take from a multi-valued parameter.
    pub index: Option<usize>,
    pub scale: Scale,
}

impl AttributeDescriptor {
    /// Whether the value is derived rather than read from a reply field.
    pub fn is_pseudo(&self) -> bool {
        self.code.is_none()
    }
}

/// Condition under which a registry entry is present.
#[derive(Debug, Clone, Copy)]
enum Gate {
    Always,
    /// Depth is read from status replies only when it is not published.
    DepthFromStatus,
    ResetStats,
}

impl Gate {
    fn allows(self, caps: &Capabilities) -> bool {
        match self {
            Self::Always => true,
            Self::DepthFromStatus => !caps.use_publications,
            Self::ResetStats => caps.reset_stats_enabled(),
        }
    }
}

struct Entry {
    name: &'static str,
    description: &'static str,
    code: Option<i32>,
    index: Option<usize>,
    scale: Scale,
    gate: Gate,
}

const fn entry(
    name: &'static str,
    description: &'static str,
    code: Option<i32>,
    gate: Gate,
) -> Entry {
    Entry {
        name,
        description,
        code,
        index: None,
        scale: Scale::Identity,
        gate,
    }
}

/// Every queue metric this collector can produce. There is no discovery of
/// status attributes, so the set is fixed here.
const ENTRIES: &[Entry] = &[
    entry(ATTR_Q_NAME, "Queue Name", None, Gate::Always),
    entry(ATTR_Q_SINCE_PUT, "Time Since Put", None, Gate::Always),
    entry(ATTR_Q_SINCE_GET, "Time Since Get", None, Gate::Always),
    entry(
        ATTR_Q_MSGAGE,
        "Oldest Message",
        Some(pcf::MQIACF_OLDEST_MSG_AGE),
        Gate::Always,
    ),
    entry(
        ATTR_Q_IPPROCS,
        "Input Handles",
        Some(pcf::MQIA_OPEN_INPUT_COUNT),
        Gate::Always,
    ),
    entry(
        ATTR_Q_OPPROCS,
        "Output Handles",
        Some(pcf::MQIA_OPEN_OUTPUT_COUNT),
        Gate::Always,
    ),
    // The "current maximum" file size stays in effect until the queue file
    // empties, so it can differ from the queue definition.
    entry(
        ATTR_Q_CURFSIZE,
        "Queue File Current Size",
        Some(pcf::MQIACF_CUR_Q_FILE_SIZE),
        Gate::Always,
    ),
    entry(
        ATTR_Q_CURMAXFSIZE,
        "Queue File Maximum Size",
        Some(pcf::MQIACF_CUR_MAX_FILE_SIZE),
        Gate::Always,
    ),
    entry(
        ATTR_Q_DEPTH,
        "Queue Depth",
        Some(pcf::MQIA_CURRENT_Q_DEPTH),
        Gate::DepthFromStatus,
    ),
    entry(
        ATTR_Q_INTERVAL_PUT,
        "Put/Put1 Count",
        Some(pcf::MQIA_MSG_ENQ_COUNT),
        Gate::ResetStats,
    ),
    entry(
        ATTR_Q_INTERVAL_GET,
        "Get Count",
        Some(pcf::MQIA_MSG_DEQ_COUNT),
        Gate::ResetStats,
    ),
    entry(
        ATTR_Q_INTERVAL_HI_DEPTH,
        "Highest Depth",
        Some(pcf::MQIA_HIGH_Q_DEPTH),
        Gate::ResetStats,
    ),
    // Copied from the attribute cache so a backend can compute %full however
    // the current depth was obtained.
    entry(ATTR_Q_MAX_DEPTH, "Queue Max Depth", None, Gate::Always),
    entry(ATTR_Q_USAGE, "Queue Usage", None, Gate::Always),
    Entry {
        name: ATTR_Q_QTIME_SHORT,
        description: "Queue Time Short",
        code: Some(pcf::MQIACF_Q_TIME_INDICATOR),
        index: Some(0),
        scale: Scale::MicrosToSeconds,
        gate: Gate::Always,
    },
    Entry {
        name: ATTR_Q_QTIME_LONG,
        description: "Queue Time Long",
        code: Some(pcf::MQIACF_Q_TIME_INDICATOR),
        index: Some(1),
        scale: Scale::MicrosToSeconds,
        gate: Gate::Always,
    },
];

/// Lookup table of the metrics enabled for this deployment.
#[derive(Debug, Clone)]
pub struct AttributeRegistry {
    by_name: HashMap<&'static str, AttributeDescriptor>,
    by_code: HashMap<i32, Vec<&'static str>>,
}

impl AttributeRegistry {
    /// Evaluate every entry's gate against the capabilities.
    pub fn new(caps: &Capabilities) -> Self {
        let mut by_name = HashMap::with_capacity(ENTRIES.len());
        let mut by_code: HashMap<i32, Vec<&'static str>> = HashMap::new();

        for e in ENTRIES.iter().filter(|e| e.gate.allows(caps)) {
            if let Some(code) = e.code {
                by_code.entry(code).or_default().push(e.name);
            }
            by_name.insert(
                e.name,
                AttributeDescriptor {
                    name: e.name,
                    description: e.description,
                    code: e.code,
                    index: e.index,
                    scale: e.scale,
                },
            );
        }

        Self { by_name, by_code }
    }

    pub fn get(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Descriptors fed by the given PCF parameter code.
    pub fn for_code(&self, code: i32) -> impl Iterator<Item = &AttributeDescriptor> {
        self.by_code
            .get(&code)
            .into_iter()
            .flatten()
            .filter_map(|name| self.by_name.get(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_name.keys().copied()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
