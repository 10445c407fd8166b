//! Turning reply messages into metric values.
//!
//! Each reply describes one queue. Its parameters are decoded once; the list
//! is then walked twice: first for the queue name, which keys everything
//! else, then for the values. A value is never written before its key is
//! known.

use chrono::{DateTime, NaiveDateTime, TimeZone};
use tracing::debug;

use crate::metadata::{MetadataCache, ObjectAttributes};
use crate::pcf::{self, Message, Parameter};
use crate::registry::{
    AttributeRegistry, ATTR_Q_MAX_DEPTH, ATTR_Q_NAME, ATTR_Q_SINCE_GET, ATTR_Q_SINCE_PUT,
    ATTR_Q_USAGE,
};
use crate::store::{MetricStore, StatusValue};

/// Returned by [`seconds_since`] when the timestamp is missing or invalid.
pub const UNKNOWN_ELAPSED: i64 = -1;

/// Format of the date and time strings in status replies.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H.%M.%S";

/// Decode the parameters of a reply that can carry data.
///
/// Failed replies and replies without parameters yield `None`. A malformed
/// parameter ends the list at that point.
fn reply_parameters(msg: &Message) -> Option<Vec<Parameter>> {
    if msg.header.is_failed() || msg.header.parameter_count == 0 {
        return None;
    }

    let (params, err) = pcf::decode_parameters(&msg.body);
    if let Some(e) = err {
        debug!(
            error = %e,
            decoded = params.len(),
            expected = msg.header.parameter_count,
            "reply truncated by malformed parameter",
        );
    }
    Some(params)
}

/// First pass: the trimmed queue name.
fn object_name(params: &[Parameter]) -> Option<String> {
    params
        .iter()
        .filter(|p| p.code == pcf::MQCA_Q_NAME)
        .filter_map(|p| p.str_at(0))
        .map(|s| s.trim().to_string())
        .last()
        .filter(|s| !s.is_empty())
}

/// Write every registered metric fed by `param`. Returns whether the
/// parameter matched any registry entry.
fn write_registered(
    registry: &AttributeRegistry,
    store: &mut MetricStore,
    key: &str,
    param: &Parameter,
) -> bool {
    let mut matched = false;
    for desc in registry.for_code(param.code) {
        matched = true;
        let index = desc.index.unwrap_or(0);
        let value = match (param.int_at(index), param.str_at(index)) {
            (Some(v), _) => StatusValue::Int(v),
            (None, Some(s)) => StatusValue::Str(s.trim().to_string()),
            (None, None) => continue,
        };
        store.write(desc.name, key, value);
    }
    matched
}

/// Last put/get timestamps, which arrive as separate date and time fields.
#[derive(Debug, Default)]
struct AccessTimes {
    put_date: String,
    put_time: String,
    get_date: String,
    get_time: String,
}

impl AccessTimes {
    fn record(&mut self, param: &Parameter) {
        let slot = match param.code {
            pcf::MQCACF_LAST_PUT_DATE => &mut self.put_date,
            pcf::MQCACF_LAST_PUT_TIME => &mut self.put_time,
            pcf::MQCACF_LAST_GET_DATE => &mut self.get_date,
            pcf::MQCACF_LAST_GET_TIME => &mut self.get_time,
            _ => return,
        };
        if let Some(s) = param.str_at(0) {
            *slot = s.trim().to_string();
        }
    }
}

/// Store the values of a queue status reply. Returns the queue name.
pub fn parse_status<Tz: TimeZone>(
    msg: &Message,
    registry: &AttributeRegistry,
    metadata: &MetadataCache,
    store: &mut MetricStore,
    now: &DateTime<Tz>,
) -> Option<String> {
    let params = reply_parameters(msg)?;
    let key = object_name(&params)?;

    store.write(ATTR_Q_NAME, &key, StatusValue::Str(key.clone()));

    let mut times = AccessTimes::default();
    for param in &params {
        if !write_registered(registry, store, &key, param) {
            times.record(param);
        }
    }

    store.write(
        ATTR_Q_SINCE_PUT,
        &key,
        StatusValue::Int(seconds_since(now, &times.put_date, &times.put_time)),
    );
    store.write(
        ATTR_Q_SINCE_GET,
        &key,
        StatusValue::Int(seconds_since(now, &times.get_date, &times.get_time)),
    );

    if let Some(md) = metadata.get(&key) {
        store.write(ATTR_Q_MAX_DEPTH, &key, StatusValue::Int(md.max_depth));
        store.write(ATTR_Q_USAGE, &key, StatusValue::Int(md.usage));
    }

    Some(key)
}

/// Store the interval counters of a reset-statistics reply. Returns the
/// queue name.
pub fn parse_reset_stats(
    msg: &Message,
    registry: &AttributeRegistry,
    store: &mut MetricStore,
) -> Option<String> {
    let params = reply_parameters(msg)?;
    let key = object_name(&params)?;

    store.write(ATTR_Q_NAME, &key, StatusValue::Str(key.clone()));
    for param in &params {
        write_registered(registry, store, &key, param);
    }

    Some(key)
}

/// Extract the configured attributes from a queue inquiry reply.
pub fn parse_attributes(msg: &Message) -> Option<ObjectAttributes> {
    let params = reply_parameters(msg)?;
    let name = object_name(&params)?;

    let mut attrs = ObjectAttributes {
        name,
        ..Default::default()
    };
    for param in &params {
        match param.code {
            pcf::MQIA_MAX_Q_DEPTH => attrs.max_depth = param.int_at(0),
            pcf::MQIA_USAGE => attrs.usage = param.int_at(0),
            pcf::MQCA_Q_DESC => {
                attrs.description = param.str_at(0).map(|s| s.trim().to_string());
            }
            _ => {}
        }
    }

    Some(attrs)
}

/// Extract the queue names from a names inquiry reply.
pub fn parse_names(msg: &Message) -> Vec<String> {
    let Some(params) = reply_parameters(msg) else {
        return Vec::new();
    };

    params
        .iter()
        .filter(|p| p.code == pcf::MQCACF_Q_NAMES)
        .flat_map(|p| match &p.value {
            pcf::ParameterValue::StringList(names) => names.clone(),
            pcf::ParameterValue::String(name) => vec![name.clone()],
            _ => Vec::new(),
        })
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Whole seconds from a reply timestamp to `now`.
///
/// The date (`YYYY-MM-DD`) and time (`HH.MM.SS`) are read as local time in
/// `now`'s zone. Blank or unparseable input gives [`UNKNOWN_ELAPSED`]. A
/// timestamp after `now` gives a negative result.
pub fn seconds_since<Tz: TimeZone>(now: &DateTime<Tz>, date: &str, time: &str) -> i64 {
    let (date, time) = (date.trim(), time.trim());
    if date.is_empty() || time.is_empty() {
        return UNKNOWN_ELAPSED;
    }

    let Ok(naive) = NaiveDateTime::parse_from_str(&format!("{date} {time}"), TIMESTAMP_FORMAT)
    else {
        return UNKNOWN_ELAPSED;
    };

    match now.timezone().from_local_datetime(&naive).earliest() {
        Some(then) => now.clone().signed_duration_since(then).num_seconds(),
        None => UNKNOWN_ELAPSED,
    }
}
