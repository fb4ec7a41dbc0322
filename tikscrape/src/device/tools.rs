//! Reachability tools: ping, traceroute and bounded parallel probing.

use futures_util::StreamExt;
use futures_util::stream;
use log::debug;

use super::Device;
use crate::codec::quote;
use crate::error::Result;
use crate::parser::detail::parse_pairs;
use crate::transport::Transport;

/// Totals printed on the last line of a RouterOS ping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PingSummary {
    pub target: String,
    pub sent: u32,
    pub received: u32,
    /// As printed, e.g. `25%`.
    pub packet_loss: String,
    pub avg_rtt: Option<String>,
    /// Raw output lines.
    pub lines: Vec<String>,
}

impl PingSummary {
    /// Parse `sent=4 received=3 packet-loss=25% ...` from ping output.
    pub fn parse(target: &str, lines: Vec<String>) -> Self {
        let mut summary = PingSummary {
            target: target.to_string(),
            ..Default::default()
        };
        if let Some(totals) = lines.iter().rev().find(|l| l.contains("sent=")) {
            for (key, value) in parse_pairs(totals) {
                match key.as_str() {
                    "sent" => summary.sent = value.parse().unwrap_or(0),
                    "received" => summary.received = value.parse().unwrap_or(0),
                    "packet-loss" => summary.packet_loss = value,
                    "avg-rtt" => summary.avg_rtt = Some(value),
                    _ => {}
                }
            }
        }
        summary.lines = lines;
        summary
    }

    pub fn is_reachable(&self) -> bool {
        self.received > 0
    }
}

/// One target's result from [`Device::probe_hosts`].
#[derive(Debug)]
pub struct ProbeResult {
    pub target: String,
    pub outcome: Result<PingSummary>,
}

impl<T: Transport> Device<'_, T> {
    /// `/ping <target> count=<count>`.
    pub async fn ping(&self, target: &str, count: u32) -> Result<PingSummary> {
        let command = format!("/ping {} count={}", quote(target), count);
        let lines = self.transport.run(&command).await?;
        Ok(PingSummary::parse(target, lines))
    }

    /// `/tool traceroute <target> count=<count>`, raw lines.
    pub async fn traceroute(&self, target: &str, count: u32) -> Result<Vec<String>> {
        let command = format!("/tool traceroute {} count={}", quote(target), count);
        self.transport.run(&command).await
    }

    /// Ping every target with at most `limit` pings in flight.
    ///
    /// Results come back in input order; one failing target does not stop
    /// the others.
    pub async fn probe_hosts(&self, targets: &[String], count: u32, limit: usize) -> Vec<ProbeResult> {
        let mut results: Vec<(usize, ProbeResult)> = stream::iter(targets.iter().cloned().enumerate())
            .map(|(index, target)| async move {
                let outcome = self.ping(&target, count).await;
                (index, ProbeResult { target, outcome })
            })
            .buffer_unordered(limit.max(1))
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);
        debug!(
            "probed {} hosts, {} reachable",
            results.len(),
            results
                .iter()
                .filter(|(_, r)| r.outcome.as_ref().is_ok_and(PingSummary::is_reachable))
                .count()
        );
        results.into_iter().map(|(_, result)| result).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::transport::fake::FakeRouter;

    const PING_OK: &str = "  SEQ HOST                                     SIZE TTL TIME  STATUS
    0 10.0.0.1                                   56  64 0ms
    1 10.0.0.1                                   56  64 0ms
    sent=2 received=2 packet-loss=0% min-rtt=0ms avg-rtt=0ms max-rtt=1ms
";

    const PING_LOSS: &str = "  SEQ HOST                                     SIZE TTL TIME  STATUS
    0 10.0.0.2                                                 timeout
    1 10.0.0.2                                                 timeout
    sent=2 received=0 packet-loss=100%
";

    #[test]
    fn test_parse_summary() {
        let lines = PING_OK.lines().map(str::to_string).collect();
        let summary = PingSummary::parse("10.0.0.1", lines);
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.received, 2);
        assert_eq!(summary.packet_loss, "0%");
        assert_eq!(summary.avg_rtt.as_deref(), Some("0ms"));
        assert!(summary.is_reachable());
    }

    #[test]
    fn test_parse_without_totals() {
        let summary = PingSummary::parse("x", vec!["garbage".to_string()]);
        assert_eq!(summary.sent, 0);
        assert!(!summary.is_reachable());
    }

    #[tokio::test]
    async fn test_ping_command() {
        let router = FakeRouter::new().reply("/ping 10.0.0.1 count=2", PING_OK);
        let device = Device::new(&router, Settings::default());

        let summary = device.ping("10.0.0.1", 2).await.unwrap();
        assert_eq!(summary.received, 2);
        assert_eq!(router.commands(), vec!["/ping 10.0.0.1 count=2"]);
    }

    #[tokio::test]
    async fn test_traceroute_lines() {
        let router = FakeRouter::new().reply(
            "/tool traceroute 8.8.8.8",
            " # ADDRESS        LOSS SENT LAST\n 1 192.168.88.1   0%   1    0.3ms\n",
        );
        let device = Device::new(&router, Settings::default());

        let lines = device.traceroute("8.8.8.8", 1).await.unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn test_probe_hosts_keeps_input_order() {
        let router = FakeRouter::new()
            .reply("/ping 10.0.0.1 ", PING_OK)
            .reply("/ping 10.0.0.2 ", PING_LOSS);
        let device = Device::new(&router, Settings::default());

        let targets = vec![
            "10.0.0.2".to_string(),
            "10.0.0.1".to_string(),
            "10.0.0.3".to_string(),
        ];
        let results = device.probe_hosts(&targets, 2, 2).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].target, "10.0.0.2");
        assert!(!results[0].outcome.as_ref().unwrap().is_reachable());
        assert!(results[1].outcome.as_ref().unwrap().is_reachable());
        // unknown to the fake: stderr -> error, others unaffected
        assert!(results[2].outcome.is_err());
    }
}
