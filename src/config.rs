// SPDX-License-Identifier: Apache-2.0

//! Ambient configuration: cluster seeds, pool sizing, policy defaults and
//! logging, loaded from YAML in the teacher's manner (`cfg::config::Config`,
//! `Config::load_from_file` / `validate_and_normalize`).

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::policy::{Policy, RecordExistsAction, Replica};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Cluster topology and connection pooling.
    pub cluster: ClusterConfig,
    /// Default single-command policy, overridable per call.
    pub policy: PolicyConfigFile,
    /// Structured logging setup.
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClusterConfig {
    #[serde(rename = "Seeds")]
    /// `host:port` pairs treated as the whole topology (spec.md §1
    /// Non-goals: no partition-map discovery).
    pub seeds: Vec<String>,

    #[serde(rename = "PoolCapacity", default = "default_pool_capacity")]
    /// Max idle connections kept per node.
    pub pool_capacity: usize,

    #[serde(rename = "MaxSocketIdleSecs", default = "default_max_socket_idle_secs", with = "serde_secs")]
    /// Idle connections older than this are closed by the tender task.
    pub max_socket_idle: Duration,

    #[serde(rename = "BufferPoolCapacity", default = "default_buffer_pool_capacity")]
    /// Number of `BUFFER_CUTOFF`-sized segments kept in the shared pool.
    pub buffer_pool_capacity: usize,

    #[serde(rename = "SupervisorTickMs", default = "default_supervisor_tick_ms")]
    /// Tick interval for the [`crate::timeout::TimeoutSupervisor`] sweep,
    /// small relative to the shortest configured command timeout.
    pub supervisor_tick_ms: u64,

    #[serde(rename = "EventPoolCapacity", default = "default_event_pool_capacity")]
    /// Admission-control capacity for the cluster's [`crate::events::AsyncCommandQueue`].
    pub event_pool_capacity: usize,

    #[serde(rename = "Tls", default)]
    /// Structural TLS toggle. No certificate/handshake logic is
    /// implemented; [`crate::net::AsyncConnection`] always dials a raw
    /// `TcpStream` (spec.md §1 Out of scope: TLS configuration parsing).
    pub tls: bool,
}

fn default_pool_capacity() -> usize {
    8
}

fn default_max_socket_idle_secs() -> Duration {
    Duration::from_secs(55)
}

fn default_buffer_pool_capacity() -> usize {
    64
}

fn default_supervisor_tick_ms() -> u64 {
    50
}

fn default_event_pool_capacity() -> usize {
    256
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PolicyConfigFile {
    #[serde(rename = "TimeoutMs", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(rename = "MaxRetries", default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(rename = "RetryOnTimeout", default)]
    pub retry_on_timeout: bool,

    #[serde(rename = "SleepBetweenRetriesMs", default)]
    pub sleep_between_retries_ms: u64,

    #[serde(rename = "RecordExistsAction", default)]
    pub record_exists_action: RecordExistsAction,

    #[serde(rename = "Replica", default)]
    pub replica: Replica,
}

fn default_timeout_ms() -> u64 {
    1_000
}

fn default_max_retries() -> u32 {
    2
}

impl Default for PolicyConfigFile {
    fn default() -> Self {
        PolicyConfigFile {
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_on_timeout: false,
            sleep_between_retries_ms: 0,
            record_exists_action: RecordExistsAction::default(),
            replica: Replica::default(),
        }
    }
}

impl PolicyConfigFile {
    pub fn to_policy(&self) -> Policy {
        Policy {
            timeout: Duration::from_millis(self.timeout_ms),
            max_retries: self.max_retries,
            retry_on_timeout: self.retry_on_timeout,
            sleep_between_retries: Duration::from_millis(self.sleep_between_retries_ms),
            record_exists_action: self.record_exists_action,
            generation: 0,
            expiration: 0,
            replica: self.replica,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(rename = "Level", default = "default_log_level")]
    pub level: String,

    #[serde(rename = "Format", default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: default_log_level(), format: LogFormat::default() }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value (teacher's `Config::load_from_file`).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config = serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields (teacher's
    /// `Config::validate_and_normalize`).
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.cluster.seeds.is_empty(), "cluster.Seeds must not be empty");
        ensure!(self.cluster.pool_capacity >= 1, "cluster.PoolCapacity must be >= 1");
        ensure!(
            self.cluster.buffer_pool_capacity >= 1,
            "cluster.BufferPoolCapacity must be >= 1"
        );
        ensure!(self.policy.timeout_ms >= 1, "policy.TimeoutMs must be >= 1");
        Ok(())
    }
}

/// Serde helper for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_seed_list() {
        let mut cfg = Config {
            cluster: ClusterConfig {
                seeds: vec![],
                pool_capacity: default_pool_capacity(),
                max_socket_idle: default_max_socket_idle_secs(),
                buffer_pool_capacity: default_buffer_pool_capacity(),
                supervisor_tick_ms: default_supervisor_tick_ms(),
                event_pool_capacity: default_event_pool_capacity(),
                tls: false,
            },
            policy: PolicyConfigFile::default(),
            logging: LoggingConfig::default(),
        };
        assert!(cfg.validate_and_normalize().is_err());
    }
}
