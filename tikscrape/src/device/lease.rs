//! DHCP lease MAC swap.

use std::net::Ipv4Addr;

use log::info;
use serde::Serialize;

use super::Device;
use crate::codec::{normalize_mac, quote};
use crate::error::{DeviceError, Result};
use crate::ledger::{Change, Ledger};
use crate::queue::{QueueConverter, QueueDecision, Saga, Step};
use crate::transport::Transport;

const LEASE: &str = "/ip dhcp-server lease";

/// Parameters of a MAC swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacSwap {
    /// Lease address, optionally with prefix length (`192.168.88.20/24`).
    pub cidr: String,
    pub new_mac: String,
    /// Also set `disabled=no` on the lease.
    pub enable_lease: bool,
    pub queue_action: QueueDecision,
}

/// What a MAC swap did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapSummary {
    /// First host address of the lease network.
    pub gateway: Ipv4Addr,
    pub ip: Ipv4Addr,
    pub old_mac: String,
    pub new_mac: String,
    pub swap_action_id: u64,
    pub queue_action_id: Option<u64>,
    pub queue_message: String,
}

/// Split `a.b.c.d[/len]` into address and prefix length (default 32).
pub(crate) fn parse_cidr(cidr: &str) -> Result<(Ipv4Addr, u8)> {
    let invalid = || DeviceError::InvalidAddress(cidr.to_string());
    let (addr, len) = match cidr.trim().split_once('/') {
        Some((addr, len)) => (addr, len.parse::<u8>().map_err(|_| invalid())?),
        None => (cidr.trim(), 32),
    };
    let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
    if len > 32 {
        return Err(invalid().into());
    }
    Ok((addr, len))
}

/// Network address plus one.
pub(crate) fn gateway_for(addr: Ipv4Addr, prefix_len: u8) -> Result<Ipv4Addr> {
    let mask = u32::MAX.checked_shl(32 - u32::from(prefix_len)).unwrap_or(0);
    let network = u32::from(addr) & mask;
    network
        .checked_add(1)
        .map(Ipv4Addr::from)
        .ok_or_else(|| DeviceError::InvalidAddress(addr.to_string()).into())
}

fn lease_set(address: &str, assignment: &str) -> String {
    format!("{} set [find address={}] {}", LEASE, quote(address), assignment)
}

impl<T: Transport> Device<'_, T> {
    /// Move a DHCP lease to a new MAC address, then handle its rate-limit.
    ///
    /// The swap is recorded as one undoable action; the queue work, if any,
    /// is recorded separately by the queue converter.
    pub async fn swap_lease_mac(&self, swap: &MacSwap, ledger: &Ledger) -> Result<SwapSummary> {
        let (ip, prefix_len) = parse_cidr(&swap.cidr)?;
        let gateway = gateway_for(ip, prefix_len)?;
        let new_mac = normalize_mac(&swap.new_mac)?;
        let address = ip.to_string();

        let lease = self
            .find(LEASE, &[("address", address.as_str())])
            .await?
            .into_iter()
            .find(|r| r.get("address") == Some(address.as_str()))
            .ok_or_else(|| DeviceError::NotFound {
                path: LEASE.to_string(),
                conditions: format!("address={}", address),
            })?;
        let old_mac = lease.get_or_empty("mac-address").to_string();
        let lease_rate = lease.get_or_empty("rate-limit").trim().to_string();
        let was_disabled = lease.flag("disabled") || lease.get("disabled") == Some("yes");

        let mut saga = Saga::new().step(
            Step::new(lease_set(&address, &format!("mac-address={}", new_mac)))
                .compensated_by([lease_set(&address, &format!("mac-address={}", quote(&old_mac)))]),
        );
        if swap.enable_lease {
            let enable = Step::new(lease_set(&address, "disabled=no"));
            saga = saga.step(if was_disabled {
                enable.compensated_by([lease_set(&address, "disabled=yes")])
            } else {
                enable
            });
        }
        saga.execute(self.transport, &self.settings.failure_markers).await?;

        let swap_action_id = ledger.record(Change::SwapLeaseMac {
            address: address.clone(),
            old_mac: old_mac.clone(),
            new_mac: new_mac.clone(),
            enabled: swap.enable_lease,
            cmds_executed: saga.executed(),
            inverse_cmds: saga.inverse(),
        })?;

        let (queue_action_id, queue_message) =
            self.lease_queue(&address, &lease_rate, swap.queue_action, ledger).await?;

        info!("Swapped lease {} from {} to {}", address, old_mac, new_mac);
        Ok(SwapSummary {
            gateway,
            ip,
            old_mac,
            new_mac,
            swap_action_id,
            queue_action_id,
            queue_message,
        })
    }

    /// Queue handling after a swap; the queue is named after the address.
    async fn lease_queue(
        &self,
        address: &str,
        lease_rate: &str,
        decision: QueueDecision,
        ledger: &Ledger,
    ) -> Result<(Option<u64>, String)> {
        if decision == QueueDecision::NoAction {
            return Ok((None, "No queue action".to_string()));
        }

        let mut converter = QueueConverter::new(self.transport, &self.settings);

        if !lease_rate.is_empty() {
            let conversion = converter.convert(address, address).await?;
            let outcome = converter.apply(&conversion, decision, ledger).await?;
            return Ok((Some(outcome.action_id), outcome.message));
        }

        match decision {
            QueueDecision::Overwrite => {
                let outcome = match converter.find_conflict(address, address).await? {
                    Some(old) => converter.overwrite_direct(&old, address, "", ledger).await?,
                    None => converter.add_direct(address, address, "", ledger).await?,
                };
                Ok((Some(outcome.action_id), outcome.message))
            }
            _ => Ok((None, format!("No DHCP rate-limit on {}", address))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::{Error, FormatError};
    use crate::transport::fake::FakeRouter;

    fn router(rate: Option<&str>) -> FakeRouter {
        let mut lease = vec![
            ("address", "192.168.88.20"),
            ("mac-address", "00:11:22:33:44:55"),
            ("server", "dhcp1"),
            ("disabled", "yes"),
        ];
        if let Some(rate) = rate {
            lease.push(("rate-limit", rate));
        }
        FakeRouter::new().with_lease(&lease)
    }

    fn swap(decision: QueueDecision) -> MacSwap {
        MacSwap {
            cidr: "192.168.88.20/24".to_string(),
            new_mac: "7cea.4805.e5e4".to_string(),
            enable_lease: true,
            queue_action: decision,
        }
    }

    fn ledger() -> (tempfile::TempDir, Ledger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path().join("history.json")).unwrap();
        (dir, ledger)
    }

    #[test]
    fn test_parse_cidr_and_gateway() {
        let (ip, len) = parse_cidr("192.168.88.20/24").unwrap();
        assert_eq!(ip, Ipv4Addr::new(192, 168, 88, 20));
        assert_eq!(len, 24);
        assert_eq!(gateway_for(ip, len).unwrap(), Ipv4Addr::new(192, 168, 88, 1));

        let (ip, len) = parse_cidr("10.1.2.3").unwrap();
        assert_eq!(len, 32);
        assert_eq!(gateway_for(ip, len).unwrap(), Ipv4Addr::new(10, 1, 2, 4));
        assert_eq!(gateway_for(ip, 0).unwrap(), Ipv4Addr::new(0, 0, 0, 1));

        assert!(parse_cidr("10.1.2.3/33").is_err());
        assert!(parse_cidr("10.1.2/24").is_err());
        assert!(gateway_for(Ipv4Addr::BROADCAST, 32).is_err());
    }

    #[tokio::test]
    async fn test_swap_with_overwrite() {
        let router = router(Some("1M/2M"));
        let (_dir, ledger) = ledger();
        let device = Device::new(&router, Settings::default());

        let summary = device
            .swap_lease_mac(&swap(QueueDecision::Overwrite), &ledger)
            .await
            .unwrap();

        assert_eq!(summary.gateway, Ipv4Addr::new(192, 168, 88, 1));
        assert_eq!(summary.old_mac, "00:11:22:33:44:55");
        assert_eq!(summary.new_mac, "7C:EA:48:05:E5:E4");
        assert_eq!(summary.queue_message, "Added static queue for 192.168.88.20");

        let lease = &router.rows(LEASE)[0];
        assert_eq!(lease["mac-address"], "7C:EA:48:05:E5:E4");
        assert_eq!(lease["disabled"], "no");
        assert!(!lease.contains_key("rate-limit"));
        assert_eq!(router.rows("/queue simple")[0]["max-limit"], "1M/2M");
        assert_eq!(ledger.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_undo_swap_and_queue_restores_router() {
        let router = router(Some("1M/2M"));
        let before = router.snapshot();
        let (_dir, ledger) = ledger();
        let device = Device::new(&router, Settings::default());

        let summary = device
            .swap_lease_mac(&swap(QueueDecision::Overwrite), &ledger)
            .await
            .unwrap();

        // newest first
        ledger.undo(summary.queue_action_id.unwrap(), &router).await.unwrap();
        ledger.undo(summary.swap_action_id, &router).await.unwrap();
        assert_eq!(router.snapshot(), before);
    }

    #[tokio::test]
    async fn test_swap_without_rate_adds_zero_queue() {
        let router = router(None);
        let (_dir, ledger) = ledger();
        let device = Device::new(&router, Settings::default());

        device
            .swap_lease_mac(&swap(QueueDecision::Overwrite), &ledger)
            .await
            .unwrap();
        assert_eq!(router.rows("/queue simple")[0]["max-limit"], "0");
    }

    #[tokio::test]
    async fn test_swap_no_queue_action() {
        let router = router(Some("1M/2M"));
        let (_dir, ledger) = ledger();
        let device = Device::new(&router, Settings::default());

        let summary = device
            .swap_lease_mac(&swap(QueueDecision::NoAction), &ledger)
            .await
            .unwrap();
        assert_eq!(summary.queue_action_id, None);
        assert_eq!(summary.queue_message, "No queue action");
        assert_eq!(router.rows(LEASE)[0]["rate-limit"], "1M/2M");
        assert_eq!(ledger.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_swap_rejects_bad_mac_first() {
        let router = router(Some("1M/2M"));
        let (_dir, ledger) = ledger();
        let device = Device::new(&router, Settings::default());

        let mut request = swap(QueueDecision::Overwrite);
        request.new_mac = "7C:EA:48".to_string();
        let err = device.swap_lease_mac(&request, &ledger).await.unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::InvalidFormat { .. })));
        assert!(router.commands().is_empty());
    }

    #[tokio::test]
    async fn test_swap_missing_lease() {
        let router = FakeRouter::new();
        let (_dir, ledger) = ledger();
        let device = Device::new(&router, Settings::default());

        let err = device
            .swap_lease_mac(&swap(QueueDecision::NoAction), &ledger)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Device(DeviceError::NotFound { .. })));
    }
}
