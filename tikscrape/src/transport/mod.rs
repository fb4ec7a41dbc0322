//! Transport layer: the command-execution seam and its SSH implementation.
//!
//! Everything above this module talks to the router through [`Transport`].
//! [`SshTransport`] is the production implementation; tests use a scripted
//! in-memory router instead.

mod builder;
pub mod config;
#[cfg(test)]
pub(crate) mod fake;
mod output;
mod ssh;

use std::future::Future;

pub use builder::SessionBuilder;
pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use output::{CommandOutput, FailureMarkers};
pub use ssh::SshTransport;

use crate::error::{Result, TransportError};

/// Executes RouterOS commands.
///
/// Takes `&self` so one session can serve several commands concurrently.
pub trait Transport: Send + Sync {
    /// Execute one command and return both output streams.
    ///
    /// An `Err` means the command could not be delivered at all. A command
    /// the router rejected still returns `Ok`; inspect `stderr` or use
    /// [`CommandOutput::failure`].
    fn execute(&self, command: &str) -> impl Future<Output = Result<CommandOutput>> + Send;

    /// Execute a command and return its stdout lines.
    ///
    /// Non-empty stderr becomes [`TransportError::CommandFailed`].
    fn run(&self, command: &str) -> impl Future<Output = Result<Vec<String>>> + Send {
        async move {
            let output = self.execute(command).await?;
            if !output.is_success() {
                return Err(TransportError::CommandFailed {
                    command: output.command,
                    stderr: output.stderr.trim().to_string(),
                }
                .into());
            }
            Ok(output.lines().map(str::to_string).collect())
        }
    }
}

impl<T: Transport> Transport for &T {
    fn execute(&self, command: &str) -> impl Future<Output = Result<CommandOutput>> + Send {
        (**self).execute(command)
    }
}
