//! Conversion of DHCP lease rate-limits into static simple queues.
//!
//! [`QueueConverter::convert`] clears the lease rate-limit and looks for a
//! conflicting static queue; the caller then picks a [`QueueDecision`] and
//! [`QueueConverter::apply`] runs it as a [`Saga`] and records the result in
//! the ledger.

pub mod commands;
mod converter;
mod saga;

use serde::{Deserialize, Serialize};

pub use converter::{Conversion, QueueConverter, QueueOutcome};
pub use saga::{Saga, Step};

use crate::parser::Record;

/// What to do with a converted lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueDecision {
    /// Replace the conflicting static queue, or add one if there is none.
    Overwrite,
    /// Keep whatever static queue exists; the lease rate-limit stays cleared.
    RemoveRateOnly,
    /// Put the lease rate-limit back.
    NoAction,
}

/// The parameters of a static queue needed to re-create it exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub name: String,
    /// Without the prefix length; used to match conflicts.
    pub target: String,
    /// The target exactly as printed (`10.0.0.0/24`), used to re-create it.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_target: String,
    #[serde(rename = "max")]
    pub max_limit: String,
    pub limit_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(default)]
    pub comment: String,
}

impl QueueSnapshot {
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.get_or_empty("name").to_string(),
            target: strip_prefix_len(record.get_or_empty("target")).to_string(),
            raw_target: record.get_or_empty("target").to_string(),
            max_limit: record.get_or_empty("max-limit").to_string(),
            limit_at: record.get_or_empty("limit-at").to_string(),
            queue: record.get("queue").map(str::to_string),
            comment: record.get_or_empty("comment").to_string(),
        }
    }

    /// The `target=` value to re-create this queue with.
    pub fn add_target(&self) -> &str {
        if self.raw_target.is_empty() {
            &self.target
        } else {
            &self.raw_target
        }
    }

    /// Whether this queue collides with a new queue for `name`/`target`.
    pub fn conflicts_with(&self, name: &str, target: &str) -> bool {
        self.name == name || self.target == target
    }
}

/// `10.0.0.5/32` -> `10.0.0.5`
pub(crate) fn strip_prefix_len(target: &str) -> &str {
    target.split('/').next().unwrap_or(target)
}
