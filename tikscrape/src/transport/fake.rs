//! Scripted in-memory router used by unit tests.
//!
//! Interprets the subset of RouterOS syntax the crate emits for leases,
//! simple queues, ARP and routes: `print detail [where k=v ...]`,
//! `add k=v ...`, `set [find k=v] k=v ...` and `remove [find k=v]`.
//! Anything else answers `bad command name` on stderr unless a canned
//! reply was registered.

use std::collections::BTreeMap;
use std::sync::Mutex;

use indexmap::IndexMap;

use super::Transport;
use super::output::CommandOutput;
use crate::codec::quote;
use crate::error::Result;
use crate::parser::detail::parse_pairs;

const MENUS: &[&str] = &["/ip dhcp-server lease", "/queue simple", "/ip arp", "/ip route"];

type Row = IndexMap<String, String>;

/// Observable table contents, order-insensitive.
pub(crate) type Snapshot = BTreeMap<String, Vec<BTreeMap<String, String>>>;

struct Fault {
    needle: String,
    stdout: String,
    stderr: String,
}

#[derive(Default)]
struct State {
    tables: IndexMap<String, Vec<Row>>,
    log: Vec<String>,
}

pub(crate) struct FakeRouter {
    state: Mutex<State>,
    replies: Vec<(String, String)>,
    faults: Vec<Fault>,
}

impl FakeRouter {
    pub(crate) fn new() -> Self {
        let mut state = State::default();
        for menu in MENUS {
            state.tables.insert(menu.to_string(), Vec::new());
        }
        Self {
            state: Mutex::new(state),
            replies: Vec::new(),
            faults: Vec::new(),
        }
    }

    /// Seed one row into a menu table.
    pub(crate) fn with_row(self, menu: &str, pairs: &[(&str, &str)]) -> Self {
        let row: Row = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), normalize_value(k, v)))
            .collect();
        self.state
            .lock()
            .unwrap()
            .tables
            .entry(menu.to_string())
            .or_default()
            .push(row);
        self
    }

    pub(crate) fn with_lease(self, pairs: &[(&str, &str)]) -> Self {
        self.with_row("/ip dhcp-server lease", pairs)
    }

    pub(crate) fn with_queue(self, pairs: &[(&str, &str)]) -> Self {
        self.with_row("/queue simple", pairs)
    }

    pub(crate) fn with_arp(self, pairs: &[(&str, &str)]) -> Self {
        self.with_row("/ip arp", pairs)
    }

    /// Answer commands starting with `prefix` with a fixed stdout.
    pub(crate) fn reply(mut self, prefix: &str, stdout: &str) -> Self {
        self.replies.push((prefix.to_string(), stdout.to_string()));
        self
    }

    /// Reject commands containing `needle` with the given stderr.
    pub(crate) fn fail_on(mut self, needle: &str, stderr: &str) -> Self {
        self.faults.push(Fault {
            needle: needle.to_string(),
            stdout: String::new(),
            stderr: stderr.to_string(),
        });
        self
    }

    /// Answer commands containing `needle` with an in-band failure on stdout.
    pub(crate) fn fail_stdout(mut self, needle: &str, stdout: &str) -> Self {
        self.faults.push(Fault {
            needle: needle.to_string(),
            stdout: stdout.to_string(),
            stderr: String::new(),
        });
        self
    }

    /// Every command received so far, in order.
    pub(crate) fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    /// Rows of one menu table.
    pub(crate) fn rows(&self, menu: &str) -> Vec<Row> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(menu)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().unwrap();
        state
            .tables
            .iter()
            .map(|(menu, rows)| {
                let mut rows: Vec<BTreeMap<String, String>> = rows
                    .iter()
                    .map(|row| row.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                    .collect();
                rows.sort();
                (menu.clone(), rows)
            })
            .collect()
    }

    fn handle(&self, command: &str) -> CommandOutput {
        let mut state = self.state.lock().unwrap();
        state.log.push(command.to_string());

        if let Some(fault) = self.faults.iter().find(|f| command.contains(&f.needle)) {
            return CommandOutput::new(command, fault.stdout.as_str(), fault.stderr.as_str());
        }
        if let Some((_, stdout)) = self.replies.iter().find(|(p, _)| command.starts_with(p)) {
            return CommandOutput::new(command, stdout.as_str(), "");
        }

        for menu in MENUS {
            if let Some(rest) = command.strip_prefix(menu) {
                if rest.starts_with(' ') {
                    let rows = state.tables.entry(menu.to_string()).or_default();
                    return table_command(menu, rows, command, rest.trim_start());
                }
            }
        }

        CommandOutput::new(command, "", "bad command name")
    }
}

impl Transport for FakeRouter {
    async fn execute(&self, command: &str) -> Result<CommandOutput> {
        Ok(self.handle(command))
    }
}

fn table_command(menu: &str, rows: &mut Vec<Row>, command: &str, rest: &str) -> CommandOutput {
    let (verb, args) = rest.split_once(' ').unwrap_or((rest, ""));
    match verb {
        "print" => {
            let conditions = match args.split_once("where") {
                Some((_, cond)) => parse_pairs(cond),
                None => Vec::new(),
            };
            let matched: Vec<&Row> = rows.iter().filter(|r| matches(r, &conditions)).collect();
            CommandOutput::new(command, render(menu, &matched), "")
        }
        "add" => {
            let row: Row = parse_pairs(args)
                .into_iter()
                .filter(|(_, v)| !v.is_empty())
                .map(|(k, v)| {
                    let value = normalize_value(&k, &v);
                    (k, value)
                })
                .collect();
            if let Some(name) = row.get("name") {
                if rows.iter().any(|r| r.get("name") == Some(name)) {
                    return CommandOutput::new(command, "failure: already have such name\n", "");
                }
            }
            rows.push(row);
            CommandOutput::new(command, "", "")
        }
        "set" => {
            let (conditions, assignments) = split_selector(args);
            for row in rows.iter_mut().filter(|r| matches(r, &conditions)) {
                for (key, value) in &assignments {
                    if value.is_empty() {
                        row.shift_remove(key);
                    } else {
                        row.insert(key.clone(), normalize_value(key, value));
                    }
                }
            }
            CommandOutput::new(command, "", "")
        }
        "remove" => {
            let (conditions, _) = split_selector(args);
            rows.retain(|r| !matches(r, &conditions));
            CommandOutput::new(command, "", "")
        }
        _ => CommandOutput::new(command, "", "bad command name"),
    }
}

fn split_selector(args: &str) -> (Vec<(String, String)>, Vec<(String, String)>) {
    if let Some(inner) = args.trim_start().strip_prefix("[find") {
        if let Some(end) = inner.find(']') {
            return (parse_pairs(&inner[..end]), parse_pairs(&inner[end + 1..]));
        }
    }
    (Vec::new(), parse_pairs(args))
}

fn normalize_value(key: &str, value: &str) -> String {
    if key == "target" && !value.is_empty() && !value.contains('/') {
        format!("{}/32", value)
    } else {
        value.to_string()
    }
}

fn matches(row: &Row, conditions: &[(String, String)]) -> bool {
    conditions.iter().all(|(key, want)| {
        let want = normalize_value(key, want);
        row.get(key).map(String::as_str).unwrap_or("") == want
    })
}

fn render(menu: &str, rows: &[&Row]) -> String {
    let mut out = format!("Flags: X - disabled; {}\n", menu);
    for (index, row) in rows.iter().enumerate() {
        let flags = if row.get("disabled").map(String::as_str) == Some("yes") {
            "X"
        } else {
            " "
        };
        let pairs: Vec<String> = row
            .iter()
            .filter(|(k, _)| k.as_str() != "comment" && k.as_str() != "disabled")
            .map(|(k, v)| format!("{}={}", k, quote(v)))
            .collect();
        match row.get("comment") {
            Some(comment) => {
                out.push_str(&format!("{:>2} {} ;;; {}\n", index, flags, comment));
                out.push_str(&format!("      {}\n", pairs.join(" ")));
            }
            None => out.push_str(&format!("{:>2} {} {}\n", index, flags, pairs.join(" "))),
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_detail_str;

    #[tokio::test]
    async fn test_print_renders_parseable_detail() {
        let router = FakeRouter::new()
            .with_queue(&[("name", "office pc"), ("target", "10.0.0.5"), ("comment", "desk 4")])
            .with_queue(&[("name", "cam"), ("target", "10.0.0.6"), ("disabled", "yes")]);

        let output = router
            .execute("/queue simple print detail without-paging")
            .await
            .unwrap();
        let records = parse_detail_str(&output.stdout, "/queue simple");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("name"), Some("office pc"));
        assert_eq!(records[0].get("target"), Some("10.0.0.5/32"));
        assert_eq!(records[0].comment(), Some("desk 4"));
        assert!(records[1].flag("disabled"));
    }

    #[tokio::test]
    async fn test_set_and_remove_with_selector() {
        let router = FakeRouter::new()
            .with_lease(&[("address", "10.0.0.5"), ("rate-limit", "1M/2M")])
            .with_arp(&[("address", "10.0.0.9"), ("interface", "bridge")]);

        router
            .execute("/ip dhcp-server lease set [find address=10.0.0.5] rate-limit=\"\"")
            .await
            .unwrap();
        assert!(!router.rows("/ip dhcp-server lease")[0].contains_key("rate-limit"));

        router
            .execute("/ip arp remove [find address=10.0.0.9]")
            .await
            .unwrap();
        assert!(router.rows("/ip arp").is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_queue_name_fails_in_band() {
        let router = FakeRouter::new().with_queue(&[("name", "a"), ("target", "10.0.0.1")]);
        let output = router
            .execute("/queue simple add name=a target=10.0.0.2")
            .await
            .unwrap();
        assert!(output.stdout.contains("failure"));
        assert_eq!(router.rows("/queue simple").len(), 1);
    }
}
