// SPDX-License-Identifier: Apache-2.0

//! The public facade tying the command engine to a [`StaticCluster`]
//! (spec §2, §4.7). This is the type application code is expected to
//! hold onto: one per process, cheaply cloned (it's an `Arc` underneath).

use std::sync::Arc;

use crate::{
    cluster::StaticCluster,
    commands::{
        AppendCommand, AsyncCommand, DeleteCommand, ExistsCommand, GetCommand, MultiExecutor, PutCommand, RecordSet,
        multi_ops::{BatchGetOp, RangeQueryOp, ScanOp},
    },
    errors::Result,
    policy::{MultiPolicy, Policy},
    value::{Bins, Key, Record, Value},
};

/// Single-record and multi-record operations against a [`StaticCluster`].
///
/// Cheap to clone: it wraps the cluster's `Arc` and holds no other state.
#[derive(Clone)]
pub struct Client {
    cluster: Arc<StaticCluster>,
}

impl Client {
    pub fn new(cluster: Arc<StaticCluster>) -> Self {
        Client { cluster }
    }

    pub fn cluster(&self) -> &Arc<StaticCluster> {
        &self.cluster
    }

    /// Writes `bins` to `key` (spec §4.5).
    pub async fn put(&self, key: Key, bins: Bins, policy: Policy) -> Result<()> {
        AsyncCommand::new(Arc::clone(&self.cluster), PutCommand::new(key, bins, policy)).run().await
    }

    /// Reads every bin of `key`, or `None` if it doesn't exist.
    pub async fn get(&self, key: Key, policy: Policy) -> Result<Option<Record>> {
        AsyncCommand::new(Arc::clone(&self.cluster), GetCommand::new(key, policy)).run().await
    }

    /// Reads only the named bins of `key`.
    pub async fn get_bins(&self, key: Key, bin_names: Vec<String>, policy: Policy) -> Result<Option<Record>> {
        AsyncCommand::new(Arc::clone(&self.cluster), GetCommand::with_bins(key, bin_names, policy)).run().await
    }

    /// Deletes `key`; returns whether it existed.
    pub async fn delete(&self, key: Key, policy: Policy) -> Result<bool> {
        AsyncCommand::new(Arc::clone(&self.cluster), DeleteCommand::new(key, policy)).run().await
    }

    /// Probes existence without reading bin data.
    pub async fn exists(&self, key: Key, policy: Policy) -> Result<bool> {
        AsyncCommand::new(Arc::clone(&self.cluster), ExistsCommand::new(key, policy)).run().await
    }

    /// Appends `value` to `bin_name`, relying on server-side concatenation
    /// semantics (spec §8 "Hello" + " World").
    pub async fn append(&self, key: Key, bin_name: impl Into<String>, value: Value, policy: Policy) -> Result<()> {
        AsyncCommand::new(Arc::clone(&self.cluster), AppendCommand::new(key, bin_name, value, policy)).run().await
    }

    /// Fetches `keys` in one fan-out pass, preserving request order and
    /// tolerating missing keys as `(key, None)` (spec §4.6).
    pub fn batch_get(&self, namespace: impl Into<String>, keys: Vec<Key>, policy: MultiPolicy) -> RecordSet<(Key, Option<Record>)> {
        MultiExecutor::execute(&self.cluster, BatchGetOp::new(namespace, keys, policy))
    }

    /// Streams every record of a namespace/set across every node.
    pub fn scan_all(&self, namespace: impl Into<String>, set: impl Into<String>, policy: MultiPolicy) -> RecordSet<Record> {
        MultiExecutor::execute(&self.cluster, ScanOp::new(namespace, set, policy))
    }

    /// Streams records whose named integer bin falls within the inclusive
    /// range `[begin, end]` (spec §8 "range query": `Range(14, 18)` over
    /// bins `1..50` yields exactly 5 records), filtered client-side atop a
    /// full scan since secondary-index predicates are out of scope for
    /// this core.
    pub fn query_range(
        &self,
        namespace: impl Into<String>,
        set: impl Into<String>,
        bin_name: impl Into<String>,
        begin: i64,
        end: i64,
        policy: MultiPolicy,
    ) -> RecordSet<Record> {
        MultiExecutor::execute(&self.cluster, RangeQueryOp::new(namespace, set, bin_name, begin, end, policy))
    }
}
