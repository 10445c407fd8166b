use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mqstat::decode::{parse_status, seconds_since};
use mqstat::metadata::{MetadataCache, ObjectAttributes};
use mqstat::pcf::{self, decode_parameters, read_message, Command, MessageBuilder};
use mqstat::registry::{AttributeRegistry, Capabilities};
use mqstat::store::MetricStore;

/// A status reply as the queue manager sends it, with every field the
/// collector reads.
fn status_payload(name: &str) -> Vec<u8> {
    MessageBuilder::response(Command::InquireQueueStatus)
        .not_last()
        .string(pcf::MQCA_Q_NAME, name)
        .integer(pcf::MQIACF_Q_STATUS_TYPE, pcf::MQIACF_Q_STATUS)
        .integer(pcf::MQIA_CURRENT_Q_DEPTH, 1_234)
        .integer(pcf::MQIA_OPEN_INPUT_COUNT, 2)
        .integer(pcf::MQIA_OPEN_OUTPUT_COUNT, 5)
        .integer(pcf::MQIACF_OLDEST_MSG_AGE, 37)
        .integer_list(pcf::MQIACF_Q_TIME_INDICATOR, &[1_500, 24_000])
        .integer64(pcf::MQIACF_CUR_Q_FILE_SIZE, 12)
        .integer64(pcf::MQIACF_CUR_MAX_FILE_SIZE, 2_088_960)
        .string(pcf::MQCACF_LAST_PUT_DATE, "2024-03-10")
        .string(pcf::MQCACF_LAST_PUT_TIME, "11.59.50")
        .string(pcf::MQCACF_LAST_GET_DATE, "2024-03-10")
        .string(pcf::MQCACF_LAST_GET_TIME, "11.58.02")
        .build()
}

fn bench_decode_parameters(c: &mut Criterion) {
    let payload = status_payload("APP.ORDERS.INBOUND");
    let msg = read_message(&payload).expect("parse header");

    c.bench_function("pcf/decode_parameters_status", |b| {
        b.iter(|| {
            let (params, err) = decode_parameters(black_box(&msg.body));
            black_box((params.len(), err.is_none()))
        })
    });
}

fn bench_parse_status(c: &mut Criterion) {
    let registry = AttributeRegistry::new(&Capabilities::default());
    let metadata = MetadataCache::new();
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();

    let messages: Vec<_> = (0..128)
        .map(|i| {
            let name = format!("APP.QUEUE.{i:03}");
            metadata.merge(&ObjectAttributes {
                name: name.clone(),
                max_depth: Some(5_000),
                usage: Some(0),
                description: None,
            });
            read_message(&status_payload(&name)).expect("parse header")
        })
        .collect();

    c.bench_function("decode/parse_status_128_queues", |b| {
        let mut store = MetricStore::new(&registry);
        b.iter(|| {
            store.reset_cycle(&registry);
            for msg in &messages {
                black_box(parse_status(msg, &registry, &metadata, &mut store, &now));
            }
            black_box(store.object_count())
        })
    });

    c.bench_function("decode/seconds_since", |b| {
        b.iter(|| seconds_since(&now, black_box("2024-03-10"), black_box("11.59.50")))
    });
}

fn bench_suite(c: &mut Criterion) {
    bench_decode_parameters(c);
    bench_parse_status(c);
}

criterion_group!(benches, bench_suite);
criterion_main!(benches);
