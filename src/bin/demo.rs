// SPDX-License-Identifier: Apache-2.0

//! Scripted demo session exercising the client end to end: put/get,
//! append, batch-get, scan and range query against a configured cluster
//! (generalized from the teacher's `main.rs`).

use anyhow::{Context, Result};
use kvproto_client::{
    client::Client,
    cluster::StaticCluster,
    config::Config,
    logging,
    policy::{MultiPolicy, Policy},
    value::{Key, Value},
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::load_from_file("config.demo.yaml").context("failed to load demo config")?;
    logging::init_logger(&cfg.logging.level, cfg.logging.format).context("failed to init logger")?;

    let cluster = StaticCluster::from_config(&cfg).context("failed to build cluster")?;
    let client = Client::new(cluster);
    let policy = cfg.policy.to_policy();

    let key = Key::new("test", "demo", b"user-1".to_vec());
    let mut bins = kvproto_client::value::Bins::new();
    bins.insert("greeting".to_string(), Value::from("Hello"));
    client.put(key.clone(), bins, policy.clone()).await.context("put failed")?;
    info!(?key, "put complete");

    if let Some(record) = client.get(key.clone(), policy.clone()).await.context("get failed")? {
        info!(?record.bins, "get complete");
    }

    client
        .append(key.clone(), "greeting", Value::from(" World"), Policy { max_retries: 0, ..policy.clone() })
        .await
        .context("append failed")?;

    let exists = client.exists(key.clone(), policy.clone()).await.context("exists failed")?;
    info!(exists, "existence check complete");

    let batch_policy = MultiPolicy { base: policy.clone(), ..MultiPolicy::default() };
    let keys = vec![key.clone(), Key::new("test", "demo", b"user-2".to_vec())];
    let mut batch = client.batch_get("test", keys, batch_policy.clone());
    while let Some(item) = batch.next().await {
        match item {
            Ok((k, record)) => info!(?k, found = record.is_some(), "batch item"),
            Err(err) => tracing::warn!(%err, "batch item failed"),
        }
    }

    let mut scan = client.scan_all("test", "demo", batch_policy.clone());
    let mut count = 0usize;
    while let Some(item) = scan.next().await {
        match item {
            Ok(_) => count += 1,
            Err(err) => {
                tracing::warn!(%err, "scan aborted");
                break;
            }
        }
    }
    info!(count, "scan complete");

    let mut range = client.query_range("test", "demo", "score", 14, 18, batch_policy);
    let mut range_count = 0usize;
    while let Some(item) = range.next().await {
        if item.is_ok() {
            range_count += 1;
        }
    }
    info!(range_count, "range query complete");

    Ok(())
}
