// SPDX-License-Identifier: Apache-2.0

//! Policy types controlling timeout, retry, consistency and scan/query
//! behavior (spec §3).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to do when a write targets a key whose existence (or generation)
/// does not match expectations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordExistsAction {
    /// Write regardless of whether the record exists.
    Update,
    /// Succeed only if the record's generation equals `Policy::generation`.
    ExpectGenEqual,
    /// Succeed only if the record's generation is greater than
    /// `Policy::generation`.
    ExpectGenGt,
    /// Always fail (used to probe existence without side effects).
    Fail,
}

impl Default for RecordExistsAction {
    fn default() -> Self {
        RecordExistsAction::Update
    }
}

/// Which replica(s) a read may be served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Replica {
    /// Master only.
    Master,
    /// Master, falling back to a non-master replica ("prole") on error.
    MasterProles,
}

impl Default for Replica {
    fn default() -> Self {
        Replica::Master
    }
}

/// Base policy shared by all command kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Total time budget for the command, including retries. `0` disables
    /// the timeout supervisor entirely for this command (spec §8 boundary
    /// behavior).
    #[serde(with = "duration_ms", rename = "timeout_ms")]
    pub timeout: Duration,
    /// Maximum number of retries after the first attempt. `0` means a
    /// single attempt; `1` means at most two attempts total.
    pub max_retries: u32,
    /// Whether a `Timeout` error is eligible for retry.
    pub retry_on_timeout: bool,
    /// Delay between retry attempts.
    #[serde(with = "duration_ms", rename = "sleep_between_retries_ms")]
    pub sleep_between_retries: Duration,
    /// Conflict-detection behavior for writes.
    pub record_exists_action: RecordExistsAction,
    /// Expected generation used by `ExpectGenEqual`/`ExpectGenGt`.
    pub generation: u32,
    /// Requested record TTL in seconds; `0` means "use server default".
    pub expiration: u32,
    /// Replica selection for reads.
    pub replica: Replica,
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            timeout: Duration::from_millis(1_000),
            max_retries: 2,
            retry_on_timeout: false,
            sleep_between_retries: Duration::from_millis(0),
            record_exists_action: RecordExistsAction::default(),
            generation: 0,
            expiration: 0,
            replica: Replica::default(),
        }
    }
}

impl Policy {
    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

/// Additional knobs layered on top of [`Policy`] for batch/scan/query
/// commands (spec §3 "scan/query additions").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiPolicy {
    pub base: Policy,
    /// `0` = let the executor pick a node-count-sized fan-out, `1` =
    /// sequential, `n>1` = bounded concurrency (spec §9 open question).
    pub max_concurrent_threads: usize,
    /// Whether child commands fan out to all nodes concurrently.
    pub concurrent_nodes: bool,
    /// Whether to request bin data or headers-only (`GET_ALL` vs
    /// `NOBINDATA`, spec §6).
    pub include_bin_data: bool,
    /// Percentage of each partition to scan (1-100).
    pub scan_percent: u8,
    /// Abort the scan/query if the cluster topology changes mid-flight.
    pub fail_on_cluster_change: bool,
}

impl Default for MultiPolicy {
    fn default() -> Self {
        MultiPolicy {
            base: Policy::default(),
            max_concurrent_threads: 0,
            concurrent_nodes: true,
            include_bin_data: true,
            scan_percent: 100,
            fail_on_cluster_change: false,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}
