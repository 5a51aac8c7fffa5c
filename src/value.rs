// SPDX-License-Identifier: Apache-2.0

//! Data model: keys, records and the tagged bin-value variant (spec §3).

use std::{collections::HashMap, fmt};

use sha2::{Digest as _, Sha256};

/// 20-byte digest uniquely identifying a record within a namespace,
/// derived deterministically from `(set, user_key)`.
pub type Digest = [u8; 20];

/// A tagged variant representing the value stored in a single bin.
///
/// The real wire encoding of each particle type is the "value
/// serialization library" the spec places out of scope (§1); this enum
/// is the in-memory shape the core parses into and serializes out of.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Int(i64),
    UInt(u64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

const PARTICLE_NIL: u8 = 0;
const PARTICLE_INT: u8 = 1;
const PARTICLE_UINT: u8 = 2;
const PARTICLE_STRING: u8 = 3;
const PARTICLE_BLOB: u8 = 4;

impl Value {
    /// Wire particle type and payload for the scalar variants this crate
    /// knows how to put on the wire.
    ///
    /// `List`/`Map` have no wire representation here: the spec places the
    /// value serialization library out of scope (§1), and composite
    /// particle encoding is part of that library.
    pub fn encode(&self) -> crate::errors::Result<(u8, Vec<u8>)> {
        Ok(match self {
            Value::Nil => (PARTICLE_NIL, Vec::new()),
            Value::Int(i) => (PARTICLE_INT, i.to_be_bytes().to_vec()),
            Value::UInt(u) => (PARTICLE_UINT, u.to_be_bytes().to_vec()),
            Value::String(s) => (PARTICLE_STRING, s.as_bytes().to_vec()),
            Value::Bytes(b) => (PARTICLE_BLOB, b.clone()),
            Value::List(_) | Value::Map(_) => {
                return Err(crate::errors::Error::serialize(
                    "composite value serialization is out of scope for this core",
                ));
            }
        })
    }

    pub fn decode(particle_type: u8, payload: &[u8]) -> crate::errors::Result<Value> {
        Ok(match particle_type {
            PARTICLE_NIL => Value::Nil,
            PARTICLE_INT => {
                let bytes: [u8; 8] = payload
                    .try_into()
                    .map_err(|_| crate::errors::Error::parse("integer particle wrong width"))?;
                Value::Int(i64::from_be_bytes(bytes))
            }
            PARTICLE_UINT => {
                let bytes: [u8; 8] = payload
                    .try_into()
                    .map_err(|_| crate::errors::Error::parse("uint particle wrong width"))?;
                Value::UInt(u64::from_be_bytes(bytes))
            }
            PARTICLE_STRING => Value::String(
                String::from_utf8(payload.to_vec())
                    .map_err(|e| crate::errors::Error::parse(format!("string particle is not utf-8: {e}")))?,
            ),
            PARTICLE_BLOB => Value::Bytes(payload.to_vec()),
            other => return Err(crate::errors::Error::parse(format!("unknown particle type {other}"))),
        })
    }
}

/// Named bins of a record, mapping bin name to its tagged value.
pub type Bins = HashMap<String, Value>;

/// Identifies a record: the logical `(namespace, set, user_key)` triple
/// plus the digest derived from `(set, user_key)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    pub namespace: String,
    pub set: String,
    pub user_key: Vec<u8>,
    pub digest: Digest,
}

impl Key {
    pub fn new(namespace: impl Into<String>, set: impl Into<String>, user_key: impl Into<Vec<u8>>) -> Self {
        let namespace = namespace.into();
        let set = set.into();
        let user_key = user_key.into();
        let digest = compute_digest(&set, &user_key);
        Key { namespace, set, user_key, digest }
    }
}

/// `namespace/set:digest`, the digest printed as hex rather than the raw
/// user key — useful in retry/error logging where the key bytes may not be
/// human-readable but operators still need something stable to grep for.
impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.namespace, self.set, hex::encode(self.digest))
    }
}

/// Deterministic digest of `(set, user_key)`.
///
/// The real system hashes with RIPEMD-160; this crate stands in with a
/// truncated SHA-256 since the hash algorithm itself is an external,
/// out-of-scope wire-format detail (spec §1) — what matters to the core
/// is that digest equality defines record identity (spec §3).
pub fn compute_digest(set: &str, user_key: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(set.as_bytes());
    hasher.update(user_key);
    let full = hasher.finalize();
    let mut out = [0u8; 20];
    out.copy_from_slice(&full[..20]);
    out
}

/// An immutable, parsed record: its bins plus generation/expiration
/// metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: Option<Key>,
    pub bins: Bins,
    pub generation: u32,
    pub expiration: u32,
}

impl Record {
    pub fn new(key: Option<Key>, bins: Bins, generation: u32, expiration: u32) -> Self {
        Record { key, bins, generation, expiration }
    }
}
