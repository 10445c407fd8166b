//! End-to-end collection cycles through the public API, against a scripted
//! queue manager.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use mqstat::health::CollectorMetrics;
use mqstat::pcf::{self, read_message, Command, MessageBuilder, MQCC_FAILED};
use mqstat::registry::{
    Capabilities, Platform, ATTR_Q_DEPTH, ATTR_Q_INTERVAL_GET, ATTR_Q_INTERVAL_PUT,
    ATTR_Q_MAX_DEPTH, ATTR_Q_NAME, ATTR_Q_SINCE_PUT, ATTR_Q_USAGE,
};
use mqstat::store::StatusValue;
use mqstat::{AdminChannel, CollectError, Collector, TransportError};

/// Answers each (command, name) with a fixed reply set. Anything without a
/// script times out.
#[derive(Default)]
struct ScriptedChannel {
    scripts: HashMap<(Command, String), Vec<Vec<u8>>>,
    reject: HashSet<(Command, String)>,
    stale: VecDeque<Vec<u8>>,
    pending: VecDeque<Vec<u8>>,
    sent: Vec<(Command, String)>,
}

impl ScriptedChannel {
    fn on(mut self, command: Command, name: &str, replies: Vec<Vec<u8>>) -> Self {
        self.scripts.insert((command, name.to_string()), replies);
        self
    }

    fn reject(mut self, command: Command, name: &str) -> Self {
        self.reject.insert((command, name.to_string()));
        self
    }
}

impl AdminChannel for ScriptedChannel {
    async fn submit(&mut self, message: Vec<u8>) -> Result<(), TransportError> {
        let msg = read_message(&message).map_err(|e| TransportError::Submit {
            reason: e.to_string(),
        })?;
        let command = msg.header.command().ok_or(TransportError::Closed)?;
        let (params, _) = pcf::decode_parameters(&msg.body);
        let name = params
            .iter()
            .find(|p| p.code == pcf::MQCA_Q_NAME)
            .and_then(|p| p.str_at(0))
            .unwrap_or_default()
            .trim()
            .to_string();

        let key = (command, name);
        self.sent.push(key.clone());
        if self.reject.contains(&key) {
            return Err(TransportError::Submit {
                reason: "MQRC_PUT_INHIBITED".to_string(),
            });
        }

        self.pending = self.scripts.get(&key).cloned().unwrap_or_default().into();
        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        if timeout.is_zero() {
            return Ok(self.stale.pop_front());
        }
        Ok(self.pending.pop_front())
    }
}

fn names_reply(names: &[&str]) -> Vec<u8> {
    MessageBuilder::response(Command::InquireQueueNames)
        .string_list(pcf::MQCACF_Q_NAMES, names)
        .build()
}

fn status_reply(name: &str) -> MessageBuilder {
    MessageBuilder::response(Command::InquireQueueStatus).string(pcf::MQCA_Q_NAME, name)
}

fn attrs_reply(name: &str, max_depth: i32, usage: i32) -> Vec<u8> {
    MessageBuilder::response(Command::InquireQueue)
        .string(pcf::MQCA_Q_NAME, name)
        .integer(pcf::MQIA_MAX_Q_DEPTH, max_depth)
        .integer(pcf::MQIA_USAGE, usage)
        .string(pcf::MQCA_Q_DESC, "")
        .build()
}

fn collector(channel: ScriptedChannel, caps: Capabilities) -> Collector<ScriptedChannel> {
    let c = Collector::new(channel, caps, Duration::from_millis(100));
    c.initialize_attributes();
    c
}

fn int(c: &Collector<ScriptedChannel>, metric: &str, key: &str) -> Option<i64> {
    c.store().get(metric, key).and_then(StatusValue::as_int)
}

#[tokio::test]
async fn test_exclusion_collects_per_queue_from_inventory() {
    let channel = ScriptedChannel::default()
        .on(Command::InquireQueueNames, "Q*", vec![names_reply(&["Q1", "Q2", "Q9"])])
        .on(
            Command::InquireQueueStatus,
            "Q1",
            vec![status_reply("Q1")
                .integer(pcf::MQIA_CURRENT_Q_DEPTH, 5)
                .string(pcf::MQCACF_LAST_PUT_DATE, "")
                .string(pcf::MQCACF_LAST_PUT_TIME, "")
                .build()],
        );
    let mut c = collector(channel, Capabilities::default());

    let inventory = c.list_objects("Q*,!Q9").await.unwrap();
    assert_eq!(inventory, vec!["Q1", "Q2"]);

    let objects = c.collect("Q*,!Q9").await.unwrap();
    assert_eq!(objects, 1);

    assert_eq!(int(&c, ATTR_Q_DEPTH, "Q1"), Some(5));
    assert_eq!(int(&c, ATTR_Q_SINCE_PUT, "Q1"), Some(-1));
    for metric in [ATTR_Q_NAME, ATTR_Q_DEPTH, ATTR_Q_SINCE_PUT] {
        assert!(c.store().get(metric, "Q2").is_none(), "{metric}");
    }

    let status_queries: Vec<_> = c
        .channel()
        .sent
        .iter()
        .filter(|(cmd, _)| *cmd == Command::InquireQueueStatus)
        .map(|(_, name)| name.as_str())
        .collect();
    assert_eq!(status_queries, vec!["Q1", "Q2"]);
}

#[tokio::test]
async fn test_exclusion_only_list_queries_everything() {
    let channel = ScriptedChannel::default().on(
        Command::InquireQueueNames,
        "*",
        vec![names_reply(&["APP.IN", "SYSTEM.ADMIN.COMMAND.QUEUE"])],
    );
    let mut c = collector(channel, Capabilities::default());

    let inventory = c.list_objects("!SYSTEM.*").await.unwrap();
    assert_eq!(inventory, vec!["APP.IN"]);
    assert_eq!(c.metadata().known_objects(), vec!["APP.IN"]);
}

#[tokio::test]
async fn test_failed_inventory_keeps_previous_one() {
    let channel = ScriptedChannel::default()
        .on(Command::InquireQueueNames, "A*", vec![names_reply(&["A1"])])
        .reject(Command::InquireQueueNames, "B*");
    let mut c = collector(channel, Capabilities::default());

    c.list_objects("A*").await.unwrap();
    let err = c.list_objects("A*,B*").await.unwrap_err();

    assert_eq!(err.kind(), "transport");
    assert_eq!(c.metadata().known_objects(), vec!["A1"]);
}

#[tokio::test]
async fn test_refresh_keeps_positive_values() {
    let channel = ScriptedChannel::default()
        .on(Command::InquireQueue, "Q1", vec![attrs_reply("Q1", 100, 1)])
        .on(Command::InquireQueue, "Q*", vec![attrs_reply("Q1", 0, 0)])
        .on(Command::InquireQueueStatus, "Q1", vec![status_reply("Q1").build()]);
    let mut c = collector(channel, Capabilities::default());

    assert_eq!(c.refresh_metadata("Q1").await.unwrap(), 1);
    assert_eq!(c.refresh_metadata("Q*").await.unwrap(), 1);

    let md = c.metadata().get("Q1").unwrap();
    assert_eq!(md.max_depth, 100);
    assert_eq!(md.usage, 1);

    c.collect("Q1").await.unwrap();
    assert_eq!(int(&c, ATTR_Q_MAX_DEPTH, "Q1"), Some(100));
    assert_eq!(int(&c, ATTR_Q_USAGE, "Q1"), Some(1));
}

#[tokio::test]
async fn test_refresh_stops_at_first_failure() {
    let channel = ScriptedChannel::default()
        .on(Command::InquireQueue, "A*", vec![attrs_reply("A1", 500, 0)])
        .reject(Command::InquireQueue, "B*")
        .on(Command::InquireQueue, "C*", vec![attrs_reply("C1", 500, 0)]);
    let mut c = collector(channel, Capabilities::default());

    let err = c.refresh_metadata("A*,B*,C*").await.unwrap_err();
    assert!(matches!(
        err,
        CollectError::Transport {
            command: Command::InquireQueue,
            ..
        }
    ));
    assert!(c.metadata().get("A1").is_some());
    assert!(c.metadata().get("C1").is_none());
}

#[tokio::test]
async fn test_collect_continues_after_failed_query() {
    let channel = ScriptedChannel::default()
        .reject(Command::InquireQueueStatus, "A*")
        .on(
            Command::InquireQueueStatus,
            "B*",
            vec![status_reply("B1").integer(pcf::MQIA_CURRENT_Q_DEPTH, 9).build()],
        );
    let mut c = collector(channel, Capabilities::default());

    let err = c.collect("A*,B*").await.unwrap_err();
    assert!(matches!(err, CollectError::Transport { .. }));
    assert_eq!(int(&c, ATTR_Q_DEPTH, "B1"), Some(9));
}

#[tokio::test]
async fn test_new_cycle_forgets_vanished_queues() {
    let channel = ScriptedChannel::default().on(
        Command::InquireQueueStatus,
        "Q1",
        vec![status_reply("Q1").integer(pcf::MQIA_CURRENT_Q_DEPTH, 1).build()],
    );
    let mut c = collector(channel, Capabilities::default());

    c.collect("Q1").await.unwrap();
    assert_eq!(int(&c, ATTR_Q_DEPTH, "Q1"), Some(1));

    c.collect("NOTHING.*").await.unwrap();
    assert!(c.store().is_empty());
}

#[tokio::test]
async fn test_multi_reply_set_and_skipped_replies() {
    let channel = ScriptedChannel::default().on(
        Command::InquireQueueStatus,
        "*",
        vec![
            status_reply("Q1")
                .integer(pcf::MQIA_CURRENT_Q_DEPTH, 1)
                .not_last()
                .build(),
            status_reply("Q2")
                .completion(MQCC_FAILED, 2085)
                .not_last()
                .build(),
            status_reply("Q3").integer(pcf::MQIA_CURRENT_Q_DEPTH, 3).build(),
        ],
    );
    let metrics = Arc::new(CollectorMetrics::new().unwrap());
    let mut c = collector(channel, Capabilities::default()).with_metrics(Arc::clone(&metrics));

    assert_eq!(c.collect("*").await.unwrap(), 2);
    assert_eq!(int(&c, ATTR_Q_DEPTH, "Q1"), Some(1));
    assert_eq!(int(&c, ATTR_Q_DEPTH, "Q3"), Some(3));

    let text = metrics.encode_text().unwrap();
    assert!(text.contains("mqstat_replies_received_total{command=\"inquire_q_status\"} 3"));
    assert!(text.contains("mqstat_replies_skipped_total{command=\"inquire_q_status\"} 1"));
    assert!(text.contains("mqstat_objects_collected 2"));
}

#[tokio::test]
async fn test_reset_stats_follow_successful_status_on_zos() {
    let caps = Capabilities {
        platform: Platform::Zos,
        use_reset_q_stats: true,
        ..Default::default()
    };
    let channel = ScriptedChannel::default()
        .on(
            Command::InquireQueueStatus,
            "A1",
            vec![status_reply("A1").integer(pcf::MQIA_CURRENT_Q_DEPTH, 2).build()],
        )
        .on(
            Command::ResetQueueStats,
            "A1",
            vec![MessageBuilder::response(Command::ResetQueueStats)
                .string(pcf::MQCA_Q_NAME, "A1")
                .integer(pcf::MQIA_MSG_ENQ_COUNT, 12)
                .integer(pcf::MQIA_MSG_DEQ_COUNT, 10)
                .build()],
        )
        .reject(Command::InquireQueueStatus, "B1");
    let mut c = collector(channel, caps);

    assert!(c.collect("A1,B1").await.is_err());
    assert_eq!(int(&c, ATTR_Q_INTERVAL_PUT, "A1"), Some(12));
    assert_eq!(int(&c, ATTR_Q_INTERVAL_GET, "A1"), Some(10));

    let sent = &c.channel().sent;
    assert!(sent.contains(&(Command::ResetQueueStats, "A1".to_string())));
    assert!(!sent.contains(&(Command::ResetQueueStats, "B1".to_string())));
}

#[tokio::test]
async fn test_stale_replies_do_not_leak_into_cycle() {
    let mut channel = ScriptedChannel::default().on(
        Command::InquireQueueStatus,
        "Q1",
        vec![status_reply("Q1").integer(pcf::MQIA_CURRENT_Q_DEPTH, 4).build()],
    );
    channel.stale.push_back(
        status_reply("OLD.QUEUE")
            .integer(pcf::MQIA_CURRENT_Q_DEPTH, 99)
            .build(),
    );
    let mut c = collector(channel, Capabilities::default());

    c.collect("Q1").await.unwrap();
    assert_eq!(int(&c, ATTR_Q_DEPTH, "Q1"), Some(4));
    assert!(c.store().get(ATTR_Q_DEPTH, "OLD.QUEUE").is_none());
}

#[tokio::test]
async fn test_publications_suppress_depth() {
    let caps = Capabilities {
        use_publications: true,
        ..Default::default()
    };
    let channel = ScriptedChannel::default().on(
        Command::InquireQueueStatus,
        "Q1",
        vec![status_reply("Q1").integer(pcf::MQIA_CURRENT_Q_DEPTH, 4).build()],
    );
    let mut c = collector(channel, caps);

    c.collect("Q1").await.unwrap();
    assert!(c.store().get(ATTR_Q_DEPTH, "Q1").is_none());
    assert!(c.values(ATTR_Q_DEPTH).is_err());
    assert_eq!(
        c.store().get(ATTR_Q_NAME, "Q1").and_then(StatusValue::as_str),
        Some("Q1")
    );
}
