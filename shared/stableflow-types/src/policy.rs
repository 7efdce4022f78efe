//! Governance policy as published in ENS text records.
//!
//! Records are free text and edited by hand, so decoding happens exactly once here: absent
//! values fall back to conservative defaults, and the rest of the executor only ever sees the
//! typed [`PolicySnapshot`].

use std::collections::BTreeMap;

use alloy_primitives::{Address, I256};
use serde::Serialize;
use thiserror::Error;

/// Text record keys read from the governance name.
pub mod keys {
    pub const HOOK: &str = "stableflow:hook";
    pub const THRESHOLD_BPS: &str = "stableflow:threshold:bps";
    pub const STATUS: &str = "stableflow:status";
    pub const EXECUTOR: &str = "executor";
    pub const EXECUTOR_NAMESPACED: &str = "stableflow:executor";
    pub const MODE: &str = "stableflow:mode";
    pub const CHAIN: &str = "stableflow:chain";
    pub const EXECUTION: &str = "stableflow:execution";

    pub const ALL: [&str; 8] = [
        HOOK,
        THRESHOLD_BPS,
        STATUS,
        EXECUTOR,
        EXECUTOR_NAMESPACED,
        MODE,
        CHAIN,
        EXECUTION,
    ];
}

/// Raw text records fetched for one resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicyRecords {
    entries: BTreeMap<String, String>,
}

impl PolicyRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Trimmed value for `key`; an empty record counts as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PolicyRecords {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut records = Self::new();
        for (k, v) in iter {
            records.insert(k, v);
        }
        records
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolStatus {
    Active,
    /// Explicitly inactive, or no status published.
    Inactive,
    /// Any other published value, including `Active` in another case. Never treated as active.
    Other(String),
}

impl ProtocolStatus {
    fn decode(raw: Option<&str>) -> Self {
        match raw {
            None => Self::Inactive,
            Some("active") => Self::Active,
            Some("inactive") => Self::Inactive,
            Some(s) => Self::Other(s.to_string()),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Demo,
    Live,
    Unknown,
}

impl ExecutionMode {
    fn decode(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.eq_ignore_ascii_case("demo") => Self::Demo,
            Some(s) if s.eq_ignore_ascii_case("live") => Self::Live,
            _ => Self::Unknown,
        }
    }
}

/// Executor designated by governance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorIdentity {
    /// Nothing published, or exactly `unknown`: any caller may execute.
    Unknown,
    Designated(String),
}

impl ExecutorIdentity {
    fn decode(raw: Option<&str>) -> Self {
        match raw {
            None => Self::Unknown,
            // Only the exact literal opens execution; `UNKNOWN` names nobody.
            Some("unknown") => Self::Unknown,
            Some(s) => Self::Designated(s.to_string()),
        }
    }

    /// Case-insensitive match against the caller's hex address.
    pub fn authorizes(&self, caller: &Address) -> bool {
        match self {
            Self::Unknown => true,
            Self::Designated(designated) => designated.eq_ignore_ascii_case(&caller.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyDecodeError {
    #[error("threshold record `{value}` is not a decimal integer")]
    InvalidThreshold { value: String },
}

/// Governance state at one resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PolicySnapshot {
    /// `None` when absent or not a valid address.
    pub hook_address: Option<Address>,
    pub intent_threshold_bps: I256,
    pub status: ProtocolStatus,
    pub executor: ExecutorIdentity,
    pub mode: ExecutionMode,
    pub execution_enabled: bool,
    pub chain: String,
}

impl PolicySnapshot {
    pub fn from_records(records: &PolicyRecords) -> Result<Self, PolicyDecodeError> {
        let intent_threshold_bps = match records.get(keys::THRESHOLD_BPS) {
            None => I256::ZERO,
            Some(raw) => I256::from_dec_str(raw).map_err(|_| PolicyDecodeError::InvalidThreshold {
                value: raw.to_string(),
            })?,
        };

        let executor = records
            .get(keys::EXECUTOR)
            .or_else(|| records.get(keys::EXECUTOR_NAMESPACED));

        Ok(Self {
            hook_address: records.get(keys::HOOK).and_then(|s| s.parse().ok()),
            intent_threshold_bps,
            status: ProtocolStatus::decode(records.get(keys::STATUS)),
            executor: ExecutorIdentity::decode(executor),
            mode: ExecutionMode::decode(records.get(keys::MODE)),
            execution_enabled: records.get(keys::EXECUTION).is_some_and(is_enabled_flag),
            chain: records.get(keys::CHAIN).unwrap_or("unknown").to_string(),
        })
    }
}

fn is_enabled_flag(raw: &str) -> bool {
    ["enabled", "true", "on", "yes", "1"]
        .iter()
        .any(|accepted| raw.eq_ignore_ascii_case(accepted))
}
