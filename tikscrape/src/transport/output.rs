//! Command output and failure detection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Output of one executed command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// The command that was executed.
    pub command: String,

    /// Everything the device wrote to stdout.
    pub stdout: String,

    /// Everything the device wrote to stderr. Non-empty means failure.
    pub stderr: String,

    /// Exit status, when the transport reports one. Informational only.
    pub exit_status: Option<u32>,

    /// Time taken to execute the command.
    pub elapsed: Duration,
}

impl CommandOutput {
    /// Create a new output record.
    pub fn new(
        command: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_status: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Set the elapsed time.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Set the exit status.
    pub fn with_exit_status(mut self, status: Option<u32>) -> Self {
        self.exit_status = status;
        self
    }

    /// Whether the transport signalled success (nothing on stderr).
    pub fn is_success(&self) -> bool {
        self.stderr.is_empty()
    }

    /// Get the stdout lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }

    /// Failure message, if stderr is non-empty or stdout carries a marker.
    pub fn failure(&self, markers: &FailureMarkers) -> Option<String> {
        if !self.stderr.is_empty() {
            return Some(self.stderr.trim().to_string());
        }
        markers.detect(&self.stdout)
    }
}

impl std::fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.stdout)
    }
}

/// Substrings that mark a command as failed even with an empty stderr.
///
/// Matching is case-insensitive. RouterOS reports most errors in-band on
/// stdout (`failure: already have such entry`, `syntax error (line 1
/// column 5)`), so these are checked after every mutating command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureMarkers(Vec<String>);

impl FailureMarkers {
    /// No markers at all; only stderr counts.
    pub fn none() -> Self {
        Self(Vec::new())
    }

    /// The markers RouterOS is known to print.
    pub fn routeros() -> Self {
        Self::none()
            .with_pattern("failure")
            .with_pattern("syntax error")
            .with_pattern("bad command name")
            .with_pattern("expected end of command")
            .with_pattern("no such item")
            .with_pattern("invalid value")
    }

    /// Add a marker.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.0.push(pattern.into().to_lowercase());
        self
    }

    /// The configured markers.
    pub fn patterns(&self) -> &[String] {
        &self.0
    }

    /// Return the first output line containing any marker.
    pub fn detect(&self, output: &str) -> Option<String> {
        output
            .lines()
            .find(|line| {
                let lowered = line.to_lowercase();
                self.0.iter().any(|marker| lowered.contains(marker.as_str()))
            })
            .map(|line| line.trim().to_string())
    }
}

impl Default for FailureMarkers {
    fn default() -> Self {
        Self::routeros()
    }
}
