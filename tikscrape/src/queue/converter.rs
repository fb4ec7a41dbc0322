//! Lease-to-static-queue conversion.

use std::collections::HashMap;

use log::{debug, info};

use super::commands::{self, QUEUE_LIST};
use super::saga::{Saga, Step};
use super::{QueueDecision, QueueSnapshot};
use crate::config::Settings;
use crate::error::{ConversionError, Result};
use crate::ledger::{Change, Ledger};
use crate::parser::{parse_detail, parse_detail_str};
use crate::transport::{FailureMarkers, Transport};

const LEASE_SECTION: &str = "/ip dhcp-server lease";
const QUEUE_SECTION: &str = "/queue simple";

/// Result of [`QueueConverter::convert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub name: String,
    pub target: String,
    /// The lease rate-limit that was cleared.
    pub lease_rate: String,
    /// First static queue matching by name or target.
    pub conflict: Option<QueueSnapshot>,
    /// Comment of the conflicting queue, empty without one.
    pub comment: String,
}

/// Result of applying a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueOutcome {
    pub action_id: u64,
    pub message: String,
    pub saga: Saga,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Stash {
    rate: String,
    comment: String,
}

/// Converts lease rate-limits into static queues on one router.
///
/// Holds a per-target stash of the cleared rate so a conversion can be
/// rolled back. Not internally synchronized; use one converter per task.
pub struct QueueConverter<'t, T: Transport> {
    transport: &'t T,
    limit_at: String,
    queue_kind: String,
    markers: FailureMarkers,
    stash: HashMap<String, Stash>,
}

impl<'t, T: Transport> QueueConverter<'t, T> {
    pub fn new(transport: &'t T, settings: &Settings) -> Self {
        Self {
            transport,
            limit_at: settings.limit_at_default.clone(),
            queue_kind: settings.queue_kind.clone(),
            markers: settings.failure_markers.clone(),
            stash: HashMap::new(),
        }
    }

    /// Override the `limit-at` used for new queues.
    pub fn with_limit_at(mut self, limit_at: impl Into<String>) -> Self {
        self.limit_at = limit_at.into();
        self
    }

    pub fn limit_at(&self) -> &str {
        &self.limit_at
    }

    /// Read the lease rate-limit for `target`, clear it on the router and
    /// look for a conflicting static queue.
    ///
    /// The clear happens before any decision is taken; use
    /// [`QueueConverter::rollback_rate_limit`] or [`QueueDecision::NoAction`]
    /// to put it back.
    pub async fn convert(&mut self, name: &str, target: &str) -> Result<Conversion> {
        let lookup = commands::lease_lookup(target);
        let output = self.transport.execute(&lookup).await?;
        if !output.is_success() {
            return Err(ConversionError::LeaseNotFound {
                target: target.to_string(),
                detail: output.stderr.trim().to_string(),
            }
            .into());
        }

        let leases = parse_detail_str(&output.stdout, LEASE_SECTION);
        let lease = leases
            .iter()
            .find(|r| r.get("address") == Some(target))
            .or_else(|| leases.first())
            .ok_or_else(|| ConversionError::LeaseNotFound {
                target: target.to_string(),
                detail: "no lease record in output".to_string(),
            })?;

        let rate = lease.get_or_empty("rate-limit").trim().to_string();
        if rate.is_empty() {
            return Err(ConversionError::NoRateLimit {
                target: target.to_string(),
            }
            .into());
        }

        self.stash.insert(
            target.to_string(),
            Stash {
                rate: rate.clone(),
                comment: String::new(),
            },
        );

        let clear = commands::lease_set_rate(target, "");
        let cleared = self.transport.execute(&clear).await?;
        if let Some(message) = cleared.failure(&self.markers) {
            return Err(ConversionError::ConversionFailed {
                command: clear,
                message,
                compensation: Vec::new(),
            }
            .into());
        }
        debug!("cleared rate-limit {} on lease {}", rate, target);

        let conflict = self.find_conflict(name, target).await?;
        let comment = conflict
            .as_ref()
            .map(|c| c.comment.clone())
            .unwrap_or_default();
        if let Some(stash) = self.stash.get_mut(target) {
            stash.comment = comment.clone();
        }

        Ok(Conversion {
            name: name.to_string(),
            target: target.to_string(),
            lease_rate: rate,
            conflict,
            comment,
        })
    }

    /// First static queue whose name is `name` or whose target is `target`.
    pub async fn find_conflict(&self, name: &str, target: &str) -> Result<Option<QueueSnapshot>> {
        let lines = self.transport.run(QUEUE_LIST).await?;
        let conflict = parse_detail(&lines, QUEUE_SECTION)
            .iter()
            .map(QueueSnapshot::from_record)
            .find(|q| q.conflicts_with(name, target));
        Ok(conflict)
    }

    /// Build the saga for `decision`. Pure.
    ///
    /// The lease rate-limit clear done by `convert` is the first step,
    /// already applied.
    pub fn plan(&self, conversion: &Conversion, decision: QueueDecision) -> Saga {
        let target = conversion.target.as_str();
        let rate = conversion.lease_rate.as_str();

        let cleared = Step::new(commands::lease_set_rate(target, ""))
            .already_applied()
            .compensated_by([commands::lease_set_rate(target, rate)]);

        match decision {
            QueueDecision::NoAction => Saga::new()
                .step(Step::new(commands::lease_set_rate(target, "")).already_applied())
                .step(Step::new(commands::lease_set_rate(target, rate))),
            QueueDecision::RemoveRateOnly => Saga::new().step(cleared),
            QueueDecision::Overwrite => {
                let saga = Saga::new().step(cleared);
                let saga = match &conversion.conflict {
                    Some(old) => self.replace_steps(saga, old),
                    None => saga,
                };
                let comment = conversion
                    .conflict
                    .as_ref()
                    .map(|c| c.comment.clone())
                    .unwrap_or_default();
                saga.step(self.add_step(target, rate, comment))
            }
        }
    }

    /// Run `decision` for a prior [`convert`](Self::convert) and record it.
    pub async fn apply(
        &mut self,
        conversion: &Conversion,
        decision: QueueDecision,
        ledger: &Ledger,
    ) -> Result<QueueOutcome> {
        let mut saga = self.plan(conversion, decision);
        saga.execute(self.transport, &self.markers).await?;
        self.stash.remove(&conversion.target);

        let target = conversion.target.clone();
        let lease_rate = conversion.lease_rate.clone();
        let (change, message) = match (decision, &conversion.conflict) {
            (QueueDecision::Overwrite, Some(old)) => (
                Change::OverwriteQueue {
                    existing: old.clone(),
                    new_lease: lease_rate,
                    limit_at: self.limit_at.clone(),
                    cmds_executed: saga.executed(),
                    inverse_cmds: saga.inverse(),
                },
                format!("Overwrote static queue '{}' for {}", old.name, target),
            ),
            (QueueDecision::Overwrite, None) => (
                Change::AddStaticQueue {
                    name: conversion.name.clone(),
                    target: target.clone(),
                    lease_rate,
                    limit_at: self.limit_at.clone(),
                    cmds_executed: saga.executed(),
                    inverse_cmds: saga.inverse(),
                },
                format!("Added static queue for {}", target),
            ),
            (QueueDecision::RemoveRateOnly, _) => (
                Change::RemoveRateLimit {
                    target: target.clone(),
                    lease_rate,
                    cmds_executed: saga.executed(),
                    inverse_cmds: saga.inverse(),
                },
                format!("Cleared DHCP rate-limit for {}", target),
            ),
            (QueueDecision::NoAction, _) => (
                Change::CancelConversion {
                    name: conversion.name.clone(),
                    target: target.clone(),
                    lease_rate,
                    cmds_executed: saga.executed(),
                },
                format!("Cancelled conversion for {} / {}", conversion.name, target),
            ),
        };

        let action_id = ledger.record(change)?;
        info!("{}", message);
        Ok(QueueOutcome {
            action_id,
            message,
            saga,
        })
    }

    /// Restore the rate-limit stashed by `convert` for `target`.
    pub async fn rollback_rate_limit(&mut self, target: &str) -> Result<()> {
        let stash = self
            .stash
            .get(target)
            .ok_or_else(|| ConversionError::NothingToRollBack {
                target: target.to_string(),
            })?;

        let restore = commands::lease_set_rate(target, &stash.rate);
        let output = self.transport.execute(&restore).await?;
        if let Some(message) = output.failure(&self.markers) {
            return Err(ConversionError::ConversionFailed {
                command: restore,
                message,
                compensation: Vec::new(),
            }
            .into());
        }

        self.stash.remove(target);
        info!("restored rate-limit on lease {}", target);
        Ok(())
    }

    /// Add a static queue without a prior `convert`.
    ///
    /// A non-empty `lease_rate` is assumed to be already cleared from the
    /// lease by the caller, so the inverse puts it back. An empty one becomes
    /// `max-limit=0` and no lease restore is added.
    pub async fn add_direct(
        &self,
        name: &str,
        target: &str,
        lease_rate: &str,
        ledger: &Ledger,
    ) -> Result<QueueOutcome> {
        let mut saga = Saga::new().step(self.direct_add_step(target, lease_rate, String::new()));
        saga.execute(self.transport, &self.markers).await?;

        let action_id = ledger.record(Change::AddStaticQueue {
            name: name.to_string(),
            target: target.to_string(),
            lease_rate: lease_rate.to_string(),
            limit_at: self.limit_at.clone(),
            cmds_executed: saga.executed(),
            inverse_cmds: saga.inverse(),
        })?;

        let message = format!("Added static queue for {}", target);
        info!("{}", message);
        Ok(QueueOutcome {
            action_id,
            message,
            saga,
        })
    }

    /// Replace `old` unconditionally, without a prior `convert`.
    pub async fn overwrite_direct(
        &self,
        old: &QueueSnapshot,
        target: &str,
        lease_rate: &str,
        ledger: &Ledger,
    ) -> Result<QueueOutcome> {
        let saga = self.replace_steps(Saga::new(), old);
        let mut saga = saga.step(self.direct_add_step(target, lease_rate, old.comment.clone()));
        saga.execute(self.transport, &self.markers).await?;

        let action_id = ledger.record(Change::OverwriteQueue {
            existing: old.clone(),
            new_lease: lease_rate.to_string(),
            limit_at: self.limit_at.clone(),
            cmds_executed: saga.executed(),
            inverse_cmds: saga.inverse(),
        })?;

        let message = format!("Overwrote static queue '{}' for {}", old.name, target);
        info!("{}", message);
        Ok(QueueOutcome {
            action_id,
            message,
            saga,
        })
    }

    /// Remove `old` by name, then any stale entry by its `/32` target.
    fn replace_steps(&self, saga: Saga, old: &QueueSnapshot) -> Saga {
        saga.step(
            Step::new(commands::queue_remove_by_name(&old.name))
                .compensated_by([commands::queue_add(old, &self.queue_kind)]),
        )
        .step(Step::new(commands::queue_remove_by_target(&old.target)))
    }

    /// The new queue is named after its target address.
    fn new_queue(&self, target: &str, max_limit: &str, comment: String) -> QueueSnapshot {
        QueueSnapshot {
            name: target.to_string(),
            target: target.to_string(),
            raw_target: String::new(),
            max_limit: max_limit.to_string(),
            limit_at: self.limit_at.clone(),
            queue: Some(self.queue_kind.clone()),
            comment,
        }
    }

    fn add_step(&self, target: &str, rate: &str, comment: String) -> Step {
        let queue = self.new_queue(target, rate, comment);
        Step::new(commands::queue_add(&queue, &self.queue_kind)).compensated_by([
            commands::queue_remove_by_name(target),
            commands::queue_remove_by_target(target),
        ])
    }

    fn direct_add_step(&self, target: &str, lease_rate: &str, comment: String) -> Step {
        let max_limit = if lease_rate.is_empty() { "0" } else { lease_rate };
        let step = self.add_step(target, max_limit, comment);
        if lease_rate.is_empty() {
            step
        } else {
            step.compensated_by([commands::lease_set_rate(target, lease_rate)])
        }
    }
}
