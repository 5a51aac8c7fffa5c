//! End-to-end scenarios against an in-process mock server: every test
//! drives the public [`Client`] facade over a real loopback TCP socket,
//! with a scripted peer standing in for a cluster node.

mod common;

use std::time::Duration;

use kvproto_client::{
    client::Client,
    cluster::StaticCluster,
    policy::{MultiPolicy, Policy},
    value::{Bins, Key, Value, compute_digest},
    wire::{Op, RECORD_HEADER_LEN},
};

async fn single_node_client(addr: String) -> Client {
    let cluster = StaticCluster::new(&[addr], 4, Duration::from_secs(60), 8).expect("build cluster");
    Client::new(cluster)
}

#[tokio::test]
async fn put_get_append_exists_delete_lifecycle() {
    let (addr, listener) = common::bind().await;
    let key = Key::new("test", "demo", b"k1".to_vec());

    let script = vec![
        common::empty_message(0), // put ack
        common::build_message(common::RespHeader::default(), &[], &[common::string_op("greeting", "Hello")]), // get
        common::empty_message(0), // append ack
        common::empty_message(0), // exists: found
        common::empty_message(0), // delete: found
    ];
    common::serve_script(listener, script);

    let client = single_node_client(addr).await;
    let mut bins = Bins::new();
    bins.insert("greeting".to_string(), Value::from("Hello"));
    client.put(key.clone(), bins, Policy::default()).await.expect("put");

    let record = client.get(key.clone(), Policy::default()).await.expect("get").expect("record present");
    assert_eq!(record.bins.get("greeting").and_then(Value::as_str), Some("Hello"));

    client
        .append(key.clone(), "greeting", Value::from(" World"), Policy::default())
        .await
        .expect("append");

    assert!(client.exists(key.clone(), Policy::default()).await.expect("exists"));
    assert!(client.delete(key.clone(), Policy::default()).await.expect("delete"));
}

#[tokio::test]
async fn get_of_missing_key_yields_none() {
    let (addr, listener) = common::bind().await;
    let key = Key::new("test", "demo", b"missing".to_vec());
    common::serve_script(listener, vec![common::empty_message(2)]); // KeyNotFound

    let client = single_node_client(addr).await;
    let record = client.get(key, Policy::default()).await.expect("get");
    assert!(record.is_none());
}

/// Encodes one per-key sub-record of a batch response: a 22-byte record
/// header (no protocol prefix — it lives inside the outer message body)
/// followed by its ops.
fn encode_batch_record(found: bool, ops: &[Op]) -> Vec<u8> {
    use bytes::BufMut;

    let mut op_bytes = Vec::new();
    for op in ops {
        op.encode(&mut op_bytes);
    }

    let mut out = Vec::with_capacity(RECORD_HEADER_LEN + op_bytes.len());
    out.put_u8(22); // header_len
    out.put_u8(0); // info1
    out.put_u8(0); // info2
    out.put_u8(0); // info3
    out.put_u8(0); // unused
    out.put_u8(if found { 0 } else { 2 }); // result_code: Ok / KeyNotFound
    out.put_u32(1); // generation
    out.put_u32(0); // expiration
    out.put_u32(0); // transaction_ttl
    out.put_u16(0); // field_count
    out.put_u16(ops.len() as u16);
    out.extend_from_slice(&op_bytes);
    out
}

#[tokio::test]
async fn batch_get_preserves_request_order_and_tolerates_missing_key() {
    let (addr, listener) = common::bind().await;

    let mut body = Vec::new();
    body.extend_from_slice(&encode_batch_record(true, &[common::int_op("score", 10)]));
    body.extend_from_slice(&encode_batch_record(false, &[]));
    body.extend_from_slice(&encode_batch_record(true, &[common::int_op("score", 20)]));

    let mut envelope = vec![0u8; kvproto_client::wire::HEADER_LEN];
    let header = kvproto_client::wire::Header {
        header_len: 22,
        info1: 0,
        info2: 0,
        info3: 0,
        result_code: 0,
        generation: 0,
        expiration: 0,
        transaction_ttl: 0,
        field_count: 0,
        op_count: 0,
        body_length: 0,
    };
    header.encode(&mut envelope, 22 + body.len() as u64);
    envelope.extend_from_slice(&body);

    common::serve_single_request_multi_reply(listener, vec![envelope]);

    let client = single_node_client(addr).await;
    let keys = vec![
        Key::new("test", "demo", b"k1".to_vec()),
        Key::new("test", "demo", b"k2".to_vec()),
        Key::new("test", "demo", b"k3".to_vec()),
    ];
    let mut set = client.batch_get("test", keys.clone(), MultiPolicy::default());

    let mut results = Vec::new();
    while let Some(item) = set.next().await {
        results.push(item.expect("batch item"));
    }

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0, keys[0]);
    assert!(results[0].1.is_some());
    assert_eq!(results[1].0, keys[1]);
    assert!(results[1].1.is_none(), "second key was scripted as not found");
    assert_eq!(results[2].0, keys[2]);
    assert_eq!(results[2].1.as_ref().unwrap().bins.get("score").and_then(Value::as_int), Some(20));
}

#[tokio::test]
async fn batch_get_across_a_two_node_cluster_routes_each_key_to_its_own_node() {
    let (addr0, listener0) = common::bind().await;
    let (addr1, listener1) = common::bind().await;
    let cluster = StaticCluster::new(&[addr0.clone(), addr1.clone()], 4, Duration::from_secs(60), 8).expect("build cluster");

    // `node_for_key` hashes on the key's digest, so hunt for one user key
    // that resolves to each node rather than relying on a fixed digest.
    let mut key_for_node0 = None;
    let mut key_for_node1 = None;
    for i in 0u32.. {
        let candidate = Key::new("test", "demo", i.to_be_bytes().to_vec());
        let node = cluster.node_for_key(&candidate).expect("resolve node");
        if node.addr() == addr0 && key_for_node0.is_none() {
            key_for_node0 = Some(candidate.clone());
        }
        if node.addr() == addr1 && key_for_node1.is_none() {
            key_for_node1 = Some(candidate.clone());
        }
        if key_for_node0.is_some() && key_for_node1.is_some() {
            break;
        }
    }
    let key0 = key_for_node0.expect("a key routing to node 0");
    let key1 = key_for_node1.expect("a key routing to node 1");

    // Each node only ever sees the one key routed to it, so each replies
    // with exactly one sub-record in its envelope (not the full batch).
    common::serve_single_request_multi_reply(listener0, vec![single_record_envelope(&[common::int_op("from", 0)])]);
    common::serve_single_request_multi_reply(listener1, vec![single_record_envelope(&[common::int_op("from", 1)])]);

    let client = Client::new(cluster);
    let mut set = client.batch_get("test", vec![key0.clone(), key1.clone()], MultiPolicy::default());

    let mut results = Vec::new();
    while let Some(item) = set.next().await {
        results.push(item.expect("batch item"));
    }

    // Each node only received the key routed to it, so the batch returns
    // exactly |keys| results total rather than |keys| * |nodes| (the bug
    // this test guards against: fanning the identical full key list out
    // to every node).
    assert_eq!(results.len(), 2);
    for (key, record) in &results {
        let record = record.as_ref().expect("key was scripted as found");
        let from = record.bins.get("from").and_then(Value::as_int).expect("from bin");
        if *key == key0 {
            assert_eq!(from, 0, "key routed to node 0 must be answered by node 0's script");
        } else if *key == key1 {
            assert_eq!(from, 1, "key routed to node 1 must be answered by node 1's script");
        } else {
            panic!("unexpected key in batch result: {key}");
        }
    }
}

/// Wraps a single batch sub-record in its own one-record envelope, the
/// shape a node holding only one of the requested keys actually sends.
fn single_record_envelope(ops: &[Op]) -> Vec<u8> {
    let body = encode_batch_record(true, ops);
    let mut envelope = vec![0u8; kvproto_client::wire::HEADER_LEN];
    let header = kvproto_client::wire::Header {
        header_len: 22,
        info1: 0,
        info2: 0,
        info3: 0,
        result_code: 0,
        generation: 0,
        expiration: 0,
        transaction_ttl: 0,
        field_count: 0,
        op_count: 0,
        body_length: 0,
    };
    header.encode(&mut envelope, 22 + body.len() as u64);
    envelope.extend_from_slice(&body);
    envelope
}

fn scan_record_message(set: &str, user_key: &[u8], ops: &[Op]) -> Vec<u8> {
    let digest = compute_digest(set, user_key);
    let fields = [kvproto_client::wire::Field::new(kvproto_client::wire::FieldType::DigestRipe, digest.to_vec())];
    common::build_message(common::RespHeader::default(), &fields, ops)
}

fn scan_terminal_message() -> Vec<u8> {
    common::build_message(common::RespHeader { info3: kvproto_client::wire::INFO3_LAST, ..Default::default() }, &[], &[])
}

#[tokio::test]
async fn scan_all_streams_every_record_then_terminates() {
    let (addr, listener) = common::bind().await;

    let replies = vec![
        scan_record_message("demo", b"k1", &[common::string_op("name", "alice")]),
        scan_record_message("demo", b"k2", &[common::string_op("name", "bob")]),
        scan_record_message("demo", b"k3", &[common::string_op("name", "carol")]),
        scan_terminal_message(),
    ];
    common::serve_single_request_multi_reply(listener, replies);

    let client = single_node_client(addr).await;
    let mut set = client.scan_all("test", "demo", MultiPolicy::default());

    let mut names = Vec::new();
    while let Some(item) = set.next().await {
        let record = item.expect("scan record");
        names.push(record.bins.get("name").and_then(Value::as_str).map(str::to_string));
    }

    assert_eq!(names, vec![Some("alice".to_string()), Some("bob".to_string()), Some("carol".to_string())]);
}

#[tokio::test]
async fn range_query_filters_to_the_requested_window() {
    let (addr, listener) = common::bind().await;

    // 50 records with integer bin 1..50 (spec §8 scenario 6): Range(14,18)
    // is inclusive on both ends and must return exactly 5 records.
    let mut replies: Vec<Vec<u8>> = (1..=50)
        .map(|score| scan_record_message("demo", format!("k{score}").as_bytes(), &[common::int_op("score", score)]))
        .collect();
    replies.push(scan_terminal_message());
    common::serve_single_request_multi_reply(listener, replies);

    let client = single_node_client(addr).await;
    let mut set = client.query_range("test", "demo", "score", 14, 18, MultiPolicy::default());

    let mut scores = Vec::new();
    while let Some(item) = set.next().await {
        let record = item.expect("query record");
        scores.push(record.bins.get("score").and_then(Value::as_int).expect("score bin"));
    }

    assert_eq!(scores.len(), 5);
    assert_eq!(scores, vec![14, 15, 16, 17, 18]);
}

#[tokio::test]
async fn keepalive_ping_before_a_response_does_not_terminate_the_read() {
    let (addr, listener) = common::bind().await;
    let key = Key::new("test", "demo", b"k1".to_vec());

    let mut reply = common::keepalive_ping();
    reply.extend_from_slice(&common::build_message(
        common::RespHeader::default(),
        &[],
        &[common::string_op("greeting", "hi")],
    ));
    common::serve_script(listener, vec![reply]);

    let client = single_node_client(addr).await;
    let record = client.get(key, Policy::default()).await.expect("get");
    assert_eq!(record.expect("record present").bins.get("greeting").and_then(Value::as_str), Some("hi"));
}

#[tokio::test]
async fn timeout_supervisor_interrupts_a_peer_that_delays_past_the_deadline() {
    let (addr, listener) = common::bind().await;
    let key = Key::new("test", "demo", b"k1".to_vec());

    // The peer eventually replies, but only long after the command's own
    // timeout budget — spec §8 scenario 5. The supervisor must force the
    // stuck read to fail well before that reply ever arrives.
    let reply = common::build_message(common::RespHeader::default(), &[], &[common::string_op("greeting", "hi")]);
    common::serve_with_delay(listener, Duration::from_secs(5), reply);

    let cluster = kvproto_client::cluster::StaticCluster::new(&[addr], 4, Duration::from_secs(60), 8).expect("build cluster");
    let client = Client::new(cluster);

    let mut policy = Policy::default();
    policy.timeout = Duration::from_millis(100);
    policy.max_retries = 0;
    policy.retry_on_timeout = false;

    let result = tokio::time::timeout(Duration::from_secs(2), client.get(key, policy))
        .await
        .expect("the timeout supervisor must unblock the stuck read well inside this bound");

    assert!(matches!(result, Err(kvproto_client::errors::Error::Timeout { .. })));
}

#[tokio::test]
async fn get_retries_after_the_first_connection_is_dropped() {
    let (addr, listener) = common::bind().await;
    let key = Key::new("test", "demo", b"k1".to_vec());
    let script = vec![common::build_message(common::RespHeader::default(), &[], &[common::string_op("greeting", "hi")])];
    common::serve_after_drops(listener, 1, script);

    let client = single_node_client(addr).await;
    let record = tokio::time::timeout(Duration::from_secs(5), client.get(key, Policy::default()))
        .await
        .expect("test did not hang")
        .expect("get eventually succeeded");

    assert_eq!(record.expect("record present").bins.get("greeting").and_then(Value::as_str), Some("hi"));
}
