//! Recorded actions and their typed details.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::device::ArpEntry;
use crate::queue::QueueSnapshot;

/// One entry of the ledger.
///
/// Persisted as `{"id", "timestamp", "action", "details"}`, where `action`
/// is the kind tag and `details` holds the kind's fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ActionWire")]
pub struct Action {
    pub id: u64,
    /// UTC, RFC 3339, `Z` suffix.
    pub timestamp: String,
    #[serde(flatten)]
    pub change: Change,
}

/// What a recorded action did, and how to take it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "details", rename_all = "snake_case")]
pub enum Change {
    /// A lease rate-limit became a new static queue.
    AddStaticQueue {
        name: String,
        target: String,
        lease_rate: String,
        limit_at: String,
        cmds_executed: Vec<String>,
        inverse_cmds: Vec<String>,
    },
    /// An existing static queue was replaced.
    OverwriteQueue {
        existing: QueueSnapshot,
        new_lease: String,
        limit_at: String,
        cmds_executed: Vec<String>,
        inverse_cmds: Vec<String>,
    },
    /// Only the lease rate-limit was cleared.
    RemoveRateLimit {
        target: String,
        lease_rate: String,
        cmds_executed: Vec<String>,
        inverse_cmds: Vec<String>,
    },
    /// A conversion was abandoned and the rate-limit restored. Not undoable.
    CancelConversion {
        name: String,
        target: String,
        lease_rate: String,
        #[serde(default)]
        cmds_executed: Vec<String>,
    },
    SwapLeaseMac {
        address: String,
        old_mac: String,
        new_mac: String,
        enabled: bool,
        cmds_executed: Vec<String>,
        inverse_cmds: Vec<String>,
    },
    AddArp {
        entry: ArpEntry,
        cmds_executed: Vec<String>,
        inverse_cmds: Vec<String>,
    },
    RemoveArp {
        entry: ArpEntry,
        cmds_executed: Vec<String>,
        inverse_cmds: Vec<String>,
    },
    UpdateArp {
        address: String,
        before: ArpEntry,
        after: ArpEntry,
        cmds_executed: Vec<String>,
        inverse_cmds: Vec<String>,
    },
}

impl Change {
    /// The persisted `action` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Change::AddStaticQueue { .. } => "add_static_queue",
            Change::OverwriteQueue { .. } => "overwrite_queue",
            Change::RemoveRateLimit { .. } => "remove_rate_limit",
            Change::CancelConversion { .. } => "cancel_conversion",
            Change::SwapLeaseMac { .. } => "swap_lease_mac",
            Change::AddArp { .. } => "add_arp",
            Change::RemoveArp { .. } => "remove_arp",
            Change::UpdateArp { .. } => "update_arp",
        }
    }

    /// Forward commands that were sent to the router.
    pub fn cmds_executed(&self) -> &[String] {
        match self {
            Change::AddStaticQueue { cmds_executed, .. }
            | Change::OverwriteQueue { cmds_executed, .. }
            | Change::RemoveRateLimit { cmds_executed, .. }
            | Change::CancelConversion { cmds_executed, .. }
            | Change::SwapLeaseMac { cmds_executed, .. }
            | Change::AddArp { cmds_executed, .. }
            | Change::RemoveArp { cmds_executed, .. }
            | Change::UpdateArp { cmds_executed, .. } => cmds_executed,
        }
    }

    /// Commands that revert this change, in replay order.
    pub fn inverse_commands(&self) -> &[String] {
        match self {
            Change::CancelConversion { .. } => &[],
            Change::AddStaticQueue { inverse_cmds, .. }
            | Change::OverwriteQueue { inverse_cmds, .. }
            | Change::RemoveRateLimit { inverse_cmds, .. }
            | Change::SwapLeaseMac { inverse_cmds, .. }
            | Change::AddArp { inverse_cmds, .. }
            | Change::RemoveArp { inverse_cmds, .. }
            | Change::UpdateArp { inverse_cmds, .. } => inverse_cmds,
        }
    }

    pub fn is_undoable(&self) -> bool {
        !self.inverse_commands().is_empty()
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::AddStaticQueue {
                target, lease_rate, ..
            } => write!(f, "ADD static queue {} @ {}", target, lease_rate),
            Change::OverwriteQueue {
                existing, new_lease, ..
            } => write!(
                f,
                "OVERWRITE queue '{}' with DHCP rate {}",
                existing.name, new_lease
            ),
            Change::RemoveRateLimit { target, .. } => {
                write!(f, "Dropped DHCP rate-limit for {}", target)
            }
            Change::CancelConversion { name, target, .. } => {
                write!(f, "Cancelled conversion for {} / {}", name, target)
            }
            Change::SwapLeaseMac {
                address,
                old_mac,
                new_mac,
                ..
            } => write!(f, "Swapped lease MAC for {}: {} -> {}", address, old_mac, new_mac),
            Change::AddArp { entry, .. } => {
                write!(f, "Added ARP {} -> {}", entry.address, entry.mac_address)
            }
            Change::RemoveArp { entry, .. } => write!(f, "Removed ARP {}", entry.address),
            Change::UpdateArp { address, .. } => write!(f, "Updated ARP {}", address),
        }
    }
}

/// On-disk shape, decoded in two steps so the tag and details can be
/// checked together.
#[derive(Deserialize)]
struct ActionWire {
    id: u64,
    timestamp: String,
    action: String,
    #[serde(default)]
    details: Value,
}

impl TryFrom<ActionWire> for Action {
    type Error = serde_json::Error;

    fn try_from(wire: ActionWire) -> Result<Self, Self::Error> {
        let change = serde_json::from_value(json!({
            "action": wire.action,
            "details": wire.details,
        }))?;
        Ok(Action {
            id: wire.id,
            timestamp: wire.timestamp,
            change,
        })
    }
}
