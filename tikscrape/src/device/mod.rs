//! RouterOS workflows built on a [`Transport`].
//!
//! [`Device`] bundles a borrowed transport with the active [`Settings`] and
//! offers read helpers (`print_detail`, `find`, `raw_dump`, ...) plus the
//! mutating workflows in [`arp`], [`lease`] and [`tools`]. Every mutating
//! workflow records its change in a [`Ledger`](crate::ledger::Ledger).

pub mod arp;
pub mod lease;
pub mod tools;

use indexmap::IndexMap;
use log::{debug, warn};

pub use arp::{ArpEntry, ArpUpdate};
pub use lease::{MacSwap, SwapSummary};
pub use tools::{PingSummary, ProbeResult};

use crate::codec::quote;
use crate::config::Settings;
use crate::error::{DeviceError, Result};
use crate::parser::sections::marker_line;
use crate::parser::{Record, parse_detail, parse_detail_str, split_sections_str};
use crate::transport::Transport;

/// Menus captured by a full [`Device::raw_dump`].
pub const DUMP_COMMANDS: &[&str] = &[
    "/ip route print detail without-paging",
    "/ip dhcp-server lease print detail without-paging",
    "/ip arp print detail without-paging",
    "/interface print detail without-paging",
    "/interface list print detail without-paging",
    "/queue simple print detail without-paging",
];

/// A multi-command transcript and its parsed sections.
#[derive(Debug, Clone, Default)]
pub struct RawDump {
    /// `=== command ===` delimited output of every command.
    pub transcript: String,
    /// Records per command, in command order.
    pub sections: IndexMap<String, Vec<Record>>,
}

/// One router, reached through a borrowed transport.
pub struct Device<'t, T: Transport> {
    transport: &'t T,
    settings: Settings,
}

impl<'t, T: Transport> Device<'t, T> {
    pub fn new(transport: &'t T, settings: Settings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn transport(&self) -> &'t T {
        self.transport
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// `<path> print detail without-paging`, parsed.
    pub async fn print_detail(&self, path: &str) -> Result<Vec<Record>> {
        let command = format!("{} print detail without-paging", path);
        let lines = self.transport.run(&command).await?;
        let records = parse_detail(&lines, path);
        debug!("{}: {} records", path, records.len());
        Ok(records)
    }

    /// `<path> print detail where k=v ...`, parsed.
    pub async fn find(&self, path: &str, conditions: &[(&str, &str)]) -> Result<Vec<Record>> {
        let stdout = self.find_output(path, conditions).await?;
        Ok(parse_detail_str(&stdout, path))
    }

    /// Item numbers of the entries matching `conditions`.
    pub async fn find_ids(&self, path: &str, conditions: &[(&str, &str)]) -> Result<Vec<u32>> {
        let stdout = self.find_output(path, conditions).await?;
        Ok(leading_ids(&stdout))
    }

    async fn find_output(&self, path: &str, conditions: &[(&str, &str)]) -> Result<String> {
        let output = self.transport.execute(&find_command(path, conditions)).await?;
        if !output.is_success() {
            return Err(DeviceError::CommandFailed {
                command: output.command,
                message: output.stderr.trim().to_string(),
            }
            .into());
        }
        Ok(output.stdout)
    }

    /// Run each command and split the combined transcript into sections.
    ///
    /// Commands that write to stderr keep their section (possibly empty);
    /// the error text is kept in the transcript as a `[stderr]` line.
    pub async fn raw_dump(&self, commands: &[&str]) -> Result<RawDump> {
        let mut transcript = String::new();
        for command in commands {
            let output = self.transport.execute(command).await?;
            transcript.push_str(&marker_line(command));
            transcript.push('\n');
            let stdout = output.stdout.trim();
            if !stdout.is_empty() {
                transcript.push_str(stdout);
                transcript.push('\n');
            }
            if !output.is_success() {
                warn!("{} failed: {}", command, output.stderr.trim());
                transcript.push_str(&format!("[stderr] {}\n", output.stderr.trim()));
            }
        }

        let sections = split_sections_str(&transcript);
        Ok(RawDump {
            transcript,
            sections,
        })
    }

    /// The routing table.
    pub async fn fetch_routes(&self) -> Result<Vec<Record>> {
        self.print_detail("/ip route").await
    }

    /// Send a mutating command; in-band failures become errors.
    pub(crate) async fn mutate(&self, command: &str) -> Result<()> {
        let output = self.transport.execute(command).await?;
        if let Some(message) = output.failure(&self.settings.failure_markers) {
            return Err(DeviceError::CommandFailed {
                command: command.to_string(),
                message,
            }
            .into());
        }
        Ok(())
    }
}

fn find_command(path: &str, conditions: &[(&str, &str)]) -> String {
    let condition_str: Vec<String> = conditions
        .iter()
        .map(|(k, v)| format!("{}={}", k, quote(v)))
        .collect();
    format!("{} print detail where {}", path, condition_str.join(" "))
}

/// Numeric first tokens of the output lines.
fn leading_ids(output: &str) -> Vec<u32> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|token| token.parse().ok())
        .collect()
}
