//! ARP table management.

use std::net::Ipv4Addr;

use log::info;
use serde::{Deserialize, Serialize};

use super::Device;
use crate::codec::{normalize_mac, quote};
use crate::error::{DeviceError, Result};
use crate::ledger::{Change, Ledger};
use crate::parser::Record;
use crate::transport::Transport;

const ARP: &str = "/ip arp";

/// The parts of an ARP entry needed to re-create it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArpEntry {
    pub address: String,
    pub mac_address: String,
    pub interface: String,
    #[serde(default)]
    pub comment: String,
}

impl ArpEntry {
    pub fn new(
        address: impl Into<String>,
        mac_address: impl Into<String>,
        interface: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            mac_address: mac_address.into(),
            interface: interface.into(),
            comment: String::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn from_record(record: &Record) -> Self {
        Self {
            address: record.get_or_empty("address").to_string(),
            mac_address: record.get_or_empty("mac-address").to_string(),
            interface: record.get_or_empty("interface").to_string(),
            comment: record.get_or_empty("comment").to_string(),
        }
    }

    fn add_command(&self) -> String {
        let mut command = format!(
            "{} add address={} mac-address={} interface={}",
            ARP,
            quote(&self.address),
            quote(&self.mac_address),
            quote(&self.interface)
        );
        if !self.comment.is_empty() {
            command.push_str(&format!(" comment={}", quote(&self.comment)));
        }
        command
    }
}

/// Fields to change on an existing entry; `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArpUpdate {
    pub mac_address: Option<String>,
    pub interface: Option<String>,
    pub comment: Option<String>,
}

impl ArpUpdate {
    pub fn is_empty(&self) -> bool {
        self.mac_address.is_none() && self.interface.is_none() && self.comment.is_none()
    }

    fn apply_to(&self, entry: &ArpEntry) -> ArpEntry {
        ArpEntry {
            address: entry.address.clone(),
            mac_address: self.mac_address.clone().unwrap_or_else(|| entry.mac_address.clone()),
            interface: self.interface.clone().unwrap_or_else(|| entry.interface.clone()),
            comment: self.comment.clone().unwrap_or_else(|| entry.comment.clone()),
        }
    }

    /// `key=value` assignments for the fields this update touches, taking
    /// values from `entry`.
    fn assignments(&self, entry: &ArpEntry) -> Vec<String> {
        let mut pairs = Vec::new();
        if self.mac_address.is_some() {
            pairs.push(format!("mac-address={}", quote(&entry.mac_address)));
        }
        if self.interface.is_some() {
            pairs.push(format!("interface={}", quote(&entry.interface)));
        }
        if self.comment.is_some() {
            pairs.push(format!("comment={}", quote(&entry.comment)));
        }
        pairs
    }
}

fn remove_command(address: &str) -> String {
    format!("{} remove [find address={}]", ARP, quote(address))
}

fn set_command(address: &str, assignments: &[String]) -> String {
    format!(
        "{} set [find address={}] {}",
        ARP,
        quote(address),
        assignments.join(" ")
    )
}

fn check_address(address: &str) -> Result<()> {
    address
        .parse::<Ipv4Addr>()
        .map_err(|_| DeviceError::InvalidAddress(address.to_string()))?;
    Ok(())
}

impl<T: Transport> Device<'_, T> {
    /// The ARP table.
    pub async fn fetch_arp(&self) -> Result<Vec<ArpEntry>> {
        let records = self.print_detail(ARP).await?;
        info!("Fetched {} ARP entries", records.len());
        Ok(records.iter().map(ArpEntry::from_record).collect())
    }

    async fn arp_entry(&self, address: &str) -> Result<ArpEntry> {
        self.find(ARP, &[("address", address)])
            .await?
            .iter()
            .find(|r| r.get("address") == Some(address))
            .map(ArpEntry::from_record)
            .ok_or_else(|| {
                DeviceError::NotFound {
                    path: ARP.to_string(),
                    conditions: format!("address={}", address),
                }
                .into()
            })
    }

    /// Add a static ARP entry. The MAC is normalized first.
    pub async fn add_arp(&self, entry: ArpEntry, ledger: &Ledger) -> Result<u64> {
        check_address(&entry.address)?;
        let entry = ArpEntry {
            mac_address: normalize_mac(&entry.mac_address)?,
            ..entry
        };

        let command = entry.add_command();
        self.mutate(&command).await?;

        ledger.record(Change::AddArp {
            inverse_cmds: vec![remove_command(&entry.address)],
            cmds_executed: vec![command],
            entry,
        })
    }

    /// Remove the entry for `address`, keeping enough to re-add it.
    pub async fn remove_arp(&self, address: &str, ledger: &Ledger) -> Result<u64> {
        check_address(address)?;
        let entry = self.arp_entry(address).await?;

        let command = remove_command(address);
        self.mutate(&command).await?;

        ledger.record(Change::RemoveArp {
            inverse_cmds: vec![entry.add_command()],
            cmds_executed: vec![command],
            entry,
        })
    }

    /// Change some fields of the entry for `address`.
    pub async fn update_arp(
        &self,
        address: &str,
        update: ArpUpdate,
        ledger: &Ledger,
    ) -> Result<u64> {
        check_address(address)?;
        if update.is_empty() {
            return Err(DeviceError::NothingToChange(address.to_string()).into());
        }
        let update = ArpUpdate {
            mac_address: update.mac_address.as_deref().map(normalize_mac).transpose()?,
            ..update
        };

        let before = self.arp_entry(address).await?;
        let after = update.apply_to(&before);

        let command = set_command(address, &update.assignments(&after));
        self.mutate(&command).await?;

        ledger.record(Change::UpdateArp {
            address: address.to_string(),
            cmds_executed: vec![command],
            inverse_cmds: vec![set_command(address, &update.assignments(&before))],
            before,
            after,
        })
    }
}
