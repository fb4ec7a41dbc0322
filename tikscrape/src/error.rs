//! Error types for tikscrape.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for tikscrape operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Strictly validated token was malformed
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Queue conversion errors
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Action ledger errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Device workflow errors
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Settings file errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Transport layer errors (SSH connection, authentication, exec channels).
#[derive(Error, Debug)]
pub enum TransportError {
    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Server presented a key that differs from known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Server is not in known_hosts and verification is strict
    #[error("Host key for {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Command wrote to stderr
    #[error("Command '{command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Invalid configuration in the session builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Rejected input, raised before any device command is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Invalid {kind}: '{value}'")]
    InvalidFormat { kind: &'static str, value: String },
}

impl FormatError {
    pub(crate) fn invalid(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidFormat {
            kind,
            value: value.into(),
        }
    }
}

/// Queue conversion errors.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// No DHCP lease matched the target address
    #[error("No DHCP lease for {target}: {detail}")]
    LeaseNotFound { target: String, detail: String },

    /// The lease carries no rate-limit, so there is nothing to convert
    #[error("No rate-limit in lease for {target}")]
    NoRateLimit { target: String },

    /// A forward command reported a device-side failure.
    ///
    /// `compensation` holds the inverse commands for everything that was
    /// already applied; it is not replayed automatically.
    #[error("Command '{command}' failed: {message}")]
    ConversionFailed {
        command: String,
        message: String,
        compensation: Vec<String>,
    },

    /// `rollback_rate_limit` called without a prior `convert`
    #[error("Nothing to roll back for {target}")]
    NothingToRollBack { target: String },
}

/// Action ledger errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Action {0} not found")]
    ActionNotFound(u64),

    #[error("Nothing to undo for action {0}")]
    NothingToUndo(u64),

    /// An inverse command failed; later inverse commands were not run.
    #[error("Undo failed on '{command}': {cause}")]
    UndoFailed { command: String, cause: String },

    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid ledger JSON at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to format current UTC timestamp: {0}")]
    Clock(#[source] time::error::Format),

    #[error("Ledger lock poisoned")]
    Poisoned,
}

impl LedgerError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Device workflow errors (ARP, leases, tools).
#[derive(Error, Debug)]
pub enum DeviceError {
    /// A command reported a device-side failure
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Lookup returned no matching item
    #[error("No {path} entry matching {conditions}")]
    NotFound { path: String, conditions: String },

    /// Address or prefix could not be parsed
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    /// An update that would not change anything
    #[error("No changes requested for {0}")]
    NothingToChange(String),
}

/// Settings file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid settings JSON at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using tikscrape's Error.
pub type Result<T> = std::result::Result<T, Error>;
