//! Forward steps paired with compensating commands.
//!
//! A multi-command change on the router has no transaction. A [`Saga`]
//! keeps, for every forward command, the commands that take it back, so
//! a partially applied change can always report how to revert what did
//! run.

use log::{debug, warn};

use crate::error::{ConversionError, Result};
use crate::transport::{FailureMarkers, Transport};

/// One forward command and its compensation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    forward: String,
    compensation: Vec<String>,
    applied: bool,
}

impl Step {
    pub fn new(forward: impl Into<String>) -> Self {
        Self {
            forward: forward.into(),
            compensation: Vec::new(),
            applied: false,
        }
    }

    /// Commands that revert this step, in replay order.
    pub fn compensated_by<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compensation.extend(commands.into_iter().map(Into::into));
        self
    }

    /// Mark a step that already ran before the saga was built.
    pub fn already_applied(mut self) -> Self {
        self.applied = true;
        self
    }

    pub fn forward(&self) -> &str {
        &self.forward
    }

    pub fn compensation(&self) -> &[String] {
        &self.compensation
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }
}

/// An ordered list of [`Step`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Saga {
    steps: Vec<Step>,
}

impl Saga {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Every forward command, in order.
    pub fn forward(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.forward.clone()).collect()
    }

    /// Forward commands that have run.
    pub fn executed(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| s.applied)
            .map(|s| s.forward.clone())
            .collect()
    }

    /// Compensation for the whole saga: each step's commands, last step first.
    pub fn inverse(&self) -> Vec<String> {
        compensate(self.steps.iter())
    }

    /// Compensation for the steps that have run so far.
    pub fn applied_inverse(&self) -> Vec<String> {
        compensate(self.steps.iter().filter(|s| s.applied))
    }

    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.applied)
    }

    /// Run every pending step in order.
    ///
    /// Stops at the first step whose output shows a failure and returns
    /// [`ConversionError::ConversionFailed`] carrying the compensation of the
    /// applied prefix. Nothing is reverted automatically.
    pub async fn execute<T: Transport>(
        &mut self,
        transport: &T,
        markers: &FailureMarkers,
    ) -> Result<()> {
        for index in 0..self.steps.len() {
            if self.steps[index].applied {
                continue;
            }
            let command = self.steps[index].forward.clone();

            let failure = match transport.execute(&command).await {
                Ok(output) => output.failure(markers),
                Err(e) => Some(e.to_string()),
            };
            if let Some(message) = failure {
                let compensation = self.applied_inverse();
                warn!(
                    "step {} of {} failed; {} compensating commands pending",
                    index + 1,
                    self.steps.len(),
                    compensation.len()
                );
                return Err(ConversionError::ConversionFailed {
                    command,
                    message,
                    compensation,
                }
                .into());
            }

            debug!("step {} applied: {}", index + 1, command);
            self.steps[index].applied = true;
        }
        Ok(())
    }
}

fn compensate<'a>(steps: impl DoubleEndedIterator<Item = &'a Step>) -> Vec<String> {
    steps
        .rev()
        .flat_map(|s| s.compensation.iter().cloned())
        .collect()
}
