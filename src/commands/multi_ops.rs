// SPDX-License-Identifier: Apache-2.0

//! Concrete multi-record ops: batch-get, full-table scan, and a
//! range-filtered query (spec §4.6, demo opcode set per SPEC_FULL.md §6).
//!
//! Secondary-index predicate push-down is explicitly out of scope for
//! this core (spec.md §1 "secondary-index/UDF wire formats"), so
//! [`RangeQueryOp`] is implemented as a full scan whose `parse_record`
//! filters client-side on a named integer bin's value, rather than
//! inventing a predicate wire field the spec never describes.

use std::sync::Arc;

use super::{
    HeaderInfo, encode_request_fields,
    multi::{Framing, MultiOp},
};
use crate::{
    cluster::{Node, StaticCluster},
    errors::{Error, Result},
    policy::MultiPolicy,
    value::{Bins, Key, Record, Value},
    wire::{Field, FieldType, Header, INFO1_GET_ALL, INFO1_NOBINDATA, INFO1_READ, Op, ResultCode},
};

/// Fetches a fixed list of keys in one request/response exchange, one
/// sub-record per requested key, preserving request order (spec §8
/// "batch exists/get order preservation"). A missing key yields
/// `(key, None)` rather than being dropped from the stream.
#[derive(Debug, Clone)]
pub struct BatchGetOp {
    pub namespace: String,
    pub keys: Vec<Key>,
    pub policy: MultiPolicy,
}

impl BatchGetOp {
    pub fn new(namespace: impl Into<String>, keys: Vec<Key>, policy: MultiPolicy) -> Self {
        BatchGetOp { namespace: namespace.into(), keys, policy }
    }
}

impl MultiOp for BatchGetOp {
    type Item = (Key, Option<Record>);

    fn policy(&self) -> &MultiPolicy {
        &self.policy
    }

    fn framing(&self) -> Framing {
        Framing::SingleEnvelope
    }

    fn expected_records(&self) -> usize {
        self.keys.len()
    }

    /// Groups `self.keys` by the node that serves each one (spec §4.6:
    /// "one child command per `(node, namespace)` pair"), so each node's
    /// child request carries only the digests it can actually answer
    /// instead of the full key list. A node with no keys routed to it
    /// gets no child command at all.
    fn plan(&self, cluster: &Arc<StaticCluster>) -> Result<Vec<(Arc<Node>, Self)>> {
        let mut grouped: Vec<(Arc<Node>, Vec<Key>)> = Vec::new();
        for key in &self.keys {
            let node = cluster.node_for_key(key)?;
            match grouped.iter_mut().find(|(n, _)| Arc::ptr_eq(n, &node)) {
                Some((_, keys)) => keys.push(key.clone()),
                None => grouped.push((node, vec![key.clone()])),
            }
        }
        Ok(grouped
            .into_iter()
            .map(|(node, keys)| (node, BatchGetOp { namespace: self.namespace.clone(), keys, policy: self.policy.clone() }))
            .collect())
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let mut digests = Vec::with_capacity(self.keys.len() * 20);
        for key in &self.keys {
            digests.extend_from_slice(&key.digest);
        }
        let fields = [
            Field::new(FieldType::Namespace, self.namespace.as_bytes().to_vec()),
            Field::new(FieldType::DigestRipeArray, digests),
        ];
        let info1 = if self.policy.include_bin_data { INFO1_READ | INFO1_GET_ALL } else { INFO1_READ | INFO1_NOBINDATA };
        let header = HeaderInfo {
            info1,
            info2: 0,
            info3: 0,
            generation: 0,
            expiration: 0,
            transaction_ttl: self.policy.base.timeout_ms() as u32,
        };
        Ok(encode_request_fields(header, &fields, &[]))
    }

    fn parse_record(&self, index: usize, header: &Header, cursor: &mut &[u8]) -> Result<Option<(Key, Option<Record>)>> {
        let key = self
            .keys
            .get(index)
            .cloned()
            .ok_or_else(|| Error::parse("batch response carries more sub-records than requested keys"))?;

        for _ in 0..header.field_count {
            Field::decode(cursor)?;
        }

        if matches!(ResultCode::from(header.result_code), ResultCode::KeyNotFound) {
            for _ in 0..header.op_count {
                Op::decode(cursor)?;
            }
            return Ok(Some((key, None)));
        }

        let mut bins = Bins::new();
        for _ in 0..header.op_count {
            let op = Op::decode(cursor)?;
            let value = Value::decode(op.particle_type, &op.value)?;
            bins.insert(op.name, value);
        }
        let record = Record::new(Some(key.clone()), bins, header.generation, header.expiration);
        Ok(Some((key, Some(record))))
    }
}

/// Streams every record in a namespace/set, one discrete wire message per
/// record, the server's final message carrying `INFO3_LAST` and no data.
#[derive(Debug, Clone)]
pub struct ScanOp {
    pub namespace: String,
    pub set: String,
    pub policy: MultiPolicy,
}

impl ScanOp {
    pub fn new(namespace: impl Into<String>, set: impl Into<String>, policy: MultiPolicy) -> Self {
        ScanOp { namespace: namespace.into(), set: set.into(), policy }
    }

    fn encode_scan_request(&self) -> Vec<u8> {
        let scan_opts = Op::scan_options(0, self.policy.fail_on_cluster_change, self.policy.scan_percent);
        let fields = [
            Field::new(FieldType::Namespace, self.namespace.as_bytes().to_vec()),
            Field::new(FieldType::Table, self.set.as_bytes().to_vec()),
            Field::new(FieldType::ScanOptions, scan_opts),
        ];
        let info1 = if self.policy.include_bin_data { INFO1_READ | INFO1_GET_ALL } else { INFO1_READ | INFO1_NOBINDATA };
        let header = HeaderInfo {
            info1,
            info2: 0,
            info3: 0,
            generation: 0,
            expiration: 0,
            transaction_ttl: self.policy.base.timeout_ms() as u32,
        };
        encode_request_fields(header, &fields, &[])
    }

    fn parse_scan_record(&self, header: &Header, cursor: &mut &[u8]) -> Result<Record> {
        let mut digest = None;
        for _ in 0..header.field_count {
            let field = Field::decode(cursor)?;
            if field.field_type == FieldType::DigestRipe as u8 && field.payload.len() == 20 {
                let mut d = [0u8; 20];
                d.copy_from_slice(&field.payload);
                digest = Some(d);
            }
        }
        let mut bins = Bins::new();
        for _ in 0..header.op_count {
            let op = Op::decode(cursor)?;
            let value = Value::decode(op.particle_type, &op.value)?;
            bins.insert(op.name, value);
        }
        let key = digest.map(|digest| Key { namespace: self.namespace.clone(), set: self.set.clone(), user_key: Vec::new(), digest });
        Ok(Record::new(key, bins, header.generation, header.expiration))
    }
}

impl MultiOp for ScanOp {
    type Item = Record;

    fn policy(&self) -> &MultiPolicy {
        &self.policy
    }

    fn framing(&self) -> Framing {
        Framing::Streamed
    }

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.encode_scan_request())
    }

    fn parse_record(&self, _index: usize, header: &Header, cursor: &mut &[u8]) -> Result<Option<Record>> {
        Ok(Some(self.parse_scan_record(header, cursor)?))
    }
}

/// A full scan filtered client-side to bins whose named integer value
/// falls within the inclusive range `[begin, end]` (spec §8 "range
/// query": `Range(14, 18)` over bins `1..50` yields exactly 5 records).
#[derive(Debug, Clone)]
pub struct RangeQueryOp {
    pub scan: ScanOp,
    pub bin_name: String,
    pub begin: i64,
    pub end: i64,
}

impl RangeQueryOp {
    pub fn new(namespace: impl Into<String>, set: impl Into<String>, bin_name: impl Into<String>, begin: i64, end: i64, policy: MultiPolicy) -> Self {
        RangeQueryOp { scan: ScanOp::new(namespace, set, policy), bin_name: bin_name.into(), begin, end }
    }
}

impl MultiOp for RangeQueryOp {
    type Item = Record;

    fn policy(&self) -> &MultiPolicy {
        &self.scan.policy
    }

    fn framing(&self) -> Framing {
        Framing::Streamed
    }

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.scan.encode_scan_request())
    }

    fn parse_record(&self, _index: usize, header: &Header, cursor: &mut &[u8]) -> Result<Option<Record>> {
        let record = self.scan.parse_scan_record(header, cursor)?;
        match record.bins.get(&self.bin_name).and_then(Value::as_int) {
            Some(v) if v >= self.begin && v <= self.end => Ok(Some(record)),
            _ => {
                if header.op_count == 0 && header.field_count == 0 {
                    // Benign end-of-data marker record with no bins at
                    // all; not a query mismatch, just nothing to filter.
                    return Err(Error::QueryTerminated("unexpected empty marker record".to_string()));
                }
                Ok(None)
            }
        }
    }
}
