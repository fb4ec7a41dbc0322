//! Parser for RouterOS `print detail` output.
//!
//! Detail output prints one item per block. A block opens with a header
//! line that starts with the item index (or `*`), optionally followed by a
//! flag token and a `;;;` comment, and continues on indented lines of
//! `key=value` pairs:
//!
//! ```text
//! Flags: X - disabled, R - radius, D - dynamic, B - blocked
//!  0 X ;;; front desk printer, moved to the sec
//!        ond floor
//!      address=192.168.88.20 mac-address=7C:EA:48:05:E5:E4
//!      server=dhcp1 rate-limit="1M/2M"
//!
//!  1 D address=192.168.88.31 mac-address=00:11:22:33:44:55 server=dhcp1
//! ```
//!
//! Parsing is lenient: unparsable lines are skipped rather than failing the
//! whole transcript, since the output format is not contractually stable.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use super::flags::{self, Section};
use super::record::Record;
use crate::codec::unquote;

/// `key=value` where value is a double-quoted string or a bare token.
static PAIR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z0-9_-]+)=("(?:[^"\\]|\\.)*"|[^ \t\r\n]+)"#).unwrap()
});

const COMMENT_MARKER: &str = ";;;";
const LEGEND_PREFIX: &str = "Flags:";

/// Observable parser state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// No record is being built and no comment is waiting.
    BetweenRecords,
    /// A comment-only header was seen; waiting for wrapped text or fields.
    PendingComment,
    /// At least one field has been collected for the current record.
    InRecord,
}

/// Classification of a single input line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line<'a> {
    Blank,
    Legend,
    CommentHeader {
        flags: Option<String>,
        comment: &'a str,
    },
    Header {
        flags: Option<String>,
        pairs: Vec<(String, String)>,
        inline_comment: Option<&'a str>,
    },
    Continuation(&'a str),
    Pairs(Vec<(String, String)>),
}

fn classify(line: &str, comment_pending: bool) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }
    if trimmed.starts_with(LEGEND_PREFIX) {
        return Line::Legend;
    }

    let opens_record = trimmed.starts_with(|c: char| c.is_ascii_digit() || c == '*');
    if opens_record {
        let (head, comment) = match trimmed.split_once(COMMENT_MARKER) {
            Some((head, comment)) => (head, Some(comment.trim())),
            None => (trimmed, None),
        };
        let pairs = parse_pairs(head);

        if !pairs.is_empty() {
            return Line::Header {
                flags: flag_token(head),
                pairs,
                inline_comment: comment,
            };
        }
        if let Some(comment) = comment {
            return Line::CommentHeader {
                flags: flag_token(head),
                comment,
            };
        }
    }

    if comment_pending && !trimmed.contains('=') {
        return Line::Continuation(trimmed);
    }

    Line::Pairs(parse_pairs(trimmed))
}

/// The second whitespace token of a header, when it looks like flags.
fn flag_token(head: &str) -> Option<String> {
    let mut tokens = head.split_whitespace().peekable();
    if tokens.peek() == Some(&"*") {
        tokens.next();
    }
    tokens.next()?;
    let candidate = tokens.next()?;
    let is_flags = candidate
        .chars()
        .all(|c| c.is_alphabetic() || c == '*');
    is_flags.then(|| candidate.to_string())
}

/// Extract every `key=value` pair from a line, unquoting the values.
pub(crate) fn parse_pairs(text: &str) -> Vec<(String, String)> {
    PAIR_RE
        .captures_iter(text)
        .map(|caps| (caps[1].to_string(), unquote(&caps[2])))
        .collect()
}

/// Append a wrapped comment fragment.
///
/// Two alphanumeric characters meeting at the seam are treated as a word
/// split by the terminal width and joined without a space.
fn join_fragment(comment: &mut String, fragment: &str) {
    let glued = matches!(
        (comment.chars().last(), fragment.chars().next()),
        (Some(a), Some(b)) if a.is_alphanumeric() && b.is_alphanumeric()
    );
    if !glued && !comment.is_empty() {
        comment.push(' ');
    }
    comment.push_str(fragment);
}

/// Line-at-a-time parser for one command's detail output.
#[derive(Debug)]
pub struct DetailParser {
    section: Option<Section>,
    records: Vec<Record>,
    fields: IndexMap<String, String>,
    pending_flags: Option<String>,
    pending_comment: Option<String>,
}

impl DetailParser {
    /// Create a parser; `section` selects the flag alphabet.
    pub fn new(section: &str) -> Self {
        Self {
            section: Section::from_name(section),
            records: Vec::new(),
            fields: IndexMap::new(),
            pending_flags: None,
            pending_comment: None,
        }
    }

    /// Current state of the machine.
    pub fn state(&self) -> ParserState {
        if !self.fields.is_empty() {
            ParserState::InRecord
        } else if self.pending_comment.is_some() {
            ParserState::PendingComment
        } else {
            ParserState::BetweenRecords
        }
    }

    /// Records completed so far.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consume one input line.
    pub fn feed(&mut self, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);

        match classify(line, self.pending_comment.is_some()) {
            Line::Blank => self.flush(),
            Line::Legend => {}
            Line::CommentHeader { flags, comment } => {
                self.flush();
                self.pending_flags = flags;
                self.pending_comment = Some(comment.to_string());
            }
            Line::Header {
                flags,
                pairs,
                inline_comment,
            } => {
                self.flush();
                if let Some(comment) = self.pending_comment.take() {
                    self.fields.insert("comment".to_string(), comment);
                }
                if let Some(comment) = inline_comment {
                    self.fields.insert("comment".to_string(), comment.to_string());
                }
                self.pending_flags = flags;
                self.fields.extend(pairs);
            }
            Line::Continuation(fragment) => {
                if let Some(comment) = self.pending_comment.as_mut() {
                    join_fragment(comment, fragment);
                }
            }
            Line::Pairs(pairs) => self.fields.extend(pairs),
        }
    }

    /// Flush the last record and return everything parsed.
    pub fn finish(mut self) -> Vec<Record> {
        self.flush();
        self.records
    }

    /// Close the current record, if it has any fields.
    ///
    /// Pending comment and flags are cleared whenever a record is emitted so
    /// they cannot leak into the next one. With no fields collected this is
    /// a no-op, which lets a comment-only header carry its comment into the
    /// header that follows it.
    fn flush(&mut self) {
        if self.fields.is_empty() {
            return;
        }

        let mut fields = std::mem::take(&mut self.fields);
        if let Some(comment) = self.pending_comment.take() {
            fields.entry("comment".to_string()).or_insert(comment);
        }
        let raw_flags = self.pending_flags.take();
        let decoded = raw_flags
            .as_deref()
            .map(|f| flags::decode_for(f, self.section))
            .unwrap_or_default();

        self.records.push(Record::new(fields, raw_flags, decoded));
    }
}

/// Parse the detail output of one command.
pub fn parse_detail<I, S>(lines: I, section: &str) -> Vec<Record>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parser = DetailParser::new(section);
    for line in lines {
        parser.feed(line.as_ref());
    }
    parser.finish()
}

/// [`parse_detail`] over a whole output string.
pub fn parse_detail_str(text: &str, section: &str) -> Vec<Record> {
    parse_detail(text.lines(), section)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEASES: &str = "\
Flags: X - disabled, R - radius, D - dynamic, B - blocked
 0 X ;;; front desk printer, moved to the sec
       ond floor
     address=192.168.88.20 mac-address=7C:EA:48:05:E5:E4 server=dhcp1
     rate-limit=\"1M/2M\" last-seen=never

 1 D address=192.168.88.31 mac-address=00:11:22:33:44:55 server=dhcp1
     host-name=\"laptop one\"
";

    #[test]
    fn test_header_with_inline_comment() {
        let records = parse_detail(
            [r#" 3 XD key1=v1 key2="v two" ;;; comment text"#],
            "/ip dhcp-server lease",
        );
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.raw_flags(), Some("XD"));
        assert_eq!(record.get("key1"), Some("v1"));
        assert_eq!(record.get("key2"), Some("v two"));
        assert_eq!(record.comment(), Some("comment text"));
        assert!(record.flag("disabled"));
        assert!(record.flag("dynamic"));
    }

    #[test]
    fn test_lease_transcript() {
        let records = parse_detail_str(LEASES, "/ip dhcp-server lease");
        assert_eq!(records.len(), 2);

        let printer = &records[0];
        assert_eq!(
            printer.comment(),
            Some("front desk printer, moved to the second floor")
        );
        assert_eq!(printer.get("address"), Some("192.168.88.20"));
        assert_eq!(printer.get("rate-limit"), Some("1M/2M"));
        assert_eq!(printer.raw_flags(), Some("X"));
        assert!(printer.flag("disabled"));

        let laptop = &records[1];
        assert_eq!(laptop.get("host-name"), Some("laptop one"));
        assert!(laptop.flag("dynamic"));
        assert_eq!(laptop.comment(), None);
    }

    #[test]
    fn test_wrapped_comment_joins_words() {
        let records = parse_detail(
            [
                " 0 ;;; split acr",
                "       oss lines",
                "       - second part",
                "     address=10.0.0.1",
            ],
            "/ip arp",
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].comment(), Some("split across lines - second part"));
        assert_eq!(records[0].raw_flags(), None);
    }

    #[test]
    fn test_pending_comment_absorbed_by_next_header() {
        let records = parse_detail(
            [" 0 X ;;; orphaned comment", " 1 address=10.0.0.9 interface=ether2"],
            "/ip arp",
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].comment(), Some("orphaned comment"));
        // the header starts a new item, so it carries only its own flags
        assert_eq!(records[0].raw_flags(), None);
        assert!(records[0].flags().is_empty());
    }

    #[test]
    fn test_flags_do_not_cross_blank_line() {
        let records = parse_detail(
            [" 0 X ;;; note", "", " 1 address=10.0.0.2 interface=ether2"],
            "/ip arp",
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("address"), Some("10.0.0.2"));
        assert_eq!(records[0].raw_flags(), None);
        assert!(!records[0].flag("disabled"));
    }

    #[test]
    fn test_comment_header_flags_reach_indented_fields() {
        let records = parse_detail(
            [" 0 X ;;; note", "      address=10.0.0.2 interface=ether2"],
            "/ip arp",
        );
        assert_eq!(records[0].raw_flags(), Some("X"));
        assert!(records[0].flag("disabled"));
        assert_eq!(records[0].comment(), Some("note"));
    }

    #[test]
    fn test_inline_comment_wins_over_pending() {
        let records = parse_detail(
            [" 0 ;;; stale", " 1 address=10.0.0.9 ;;; fresh"],
            "/ip arp",
        );
        assert_eq!(records[0].comment(), Some("fresh"));
    }

    #[test]
    fn test_comment_does_not_bleed_into_next_record() {
        let records = parse_detail(
            [
                " 0 ;;; first",
                "     address=10.0.0.1",
                "",
                " 1 address=10.0.0.2",
            ],
            "/ip arp",
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].comment(), Some("first"));
        assert_eq!(records[1].comment(), None);
    }

    #[test]
    fn test_flags_only_apply_to_their_record() {
        let records = parse_detail(
            [" 0 X address=10.0.0.1", " 1 address=10.0.0.2"],
            "/ip arp",
        );
        assert_eq!(records[0].raw_flags(), Some("X"));
        assert_eq!(records[1].raw_flags(), None);
        assert!(records[1].flags().is_empty());
    }

    #[test]
    fn test_continuation_overwrites_keys() {
        let records = parse_detail(
            [" 0 name=a max-limit=1M/1M", "     max-limit=2M/2M"],
            "/queue simple",
        );
        assert_eq!(records[0].get("max-limit"), Some("2M/2M"));
        assert_eq!(records[0].len(), 2);
    }

    #[test]
    fn test_comment_pair_overrides_inline() {
        let records = parse_detail(
            [r#" 0 name=a comment="from pair" ;;; from marker"#],
            "/queue simple",
        );
        assert_eq!(records[0].comment(), Some("from pair"));

        let records = parse_detail(
            [" 0 ;;; from marker", r#"     name=a comment="from pair""#],
            "/queue simple",
        );
        assert_eq!(records[0].comment(), Some("from pair"));
    }

    #[test]
    fn test_escaped_quotes_in_values() {
        let records = parse_detail(
            [r#" 0 name=a comment="say \"hi\" twice""#],
            "/queue simple",
        );
        assert_eq!(records[0].comment(), Some("say \"hi\" twice"));
    }

    #[test]
    fn test_star_index_and_crlf() {
        let records = parse_detail(
            ["*1A D address=10.0.0.5 interface=bridge\r"],
            "/ip arp",
        );
        assert_eq!(records[0].raw_flags(), Some("D"));
        assert_eq!(records[0].get("interface"), Some("bridge"));
    }

    #[test]
    fn test_garbage_is_ignored() {
        let records = parse_detail(
            ["no pairs here", " 0 address=10.0.0.1", "   ???", "=broken"],
            "/ip arp",
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_detail(Vec::<String>::new(), "/ip arp").is_empty());
        assert!(parse_detail_str("Flags: X - disabled\n\n", "/ip arp").is_empty());
    }

    #[test]
    fn test_state_transitions() {
        let mut parser = DetailParser::new("/ip arp");
        assert_eq!(parser.state(), ParserState::BetweenRecords);

        parser.feed("Flags: X - disabled");
        assert_eq!(parser.state(), ParserState::BetweenRecords);

        parser.feed(" 0 X ;;; wait");
        assert_eq!(parser.state(), ParserState::PendingComment);

        parser.feed("    ing for fields");
        assert_eq!(parser.state(), ParserState::PendingComment);

        parser.feed("     address=10.0.0.1");
        assert_eq!(parser.state(), ParserState::InRecord);
        assert!(parser.records().is_empty());

        parser.feed("");
        assert_eq!(parser.state(), ParserState::BetweenRecords);
        assert_eq!(parser.records().len(), 1);
        assert_eq!(parser.records()[0].comment(), Some("waiting for fields"));

        let records = parser.finish();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_record_serializes_flat() {
        let records = parse_detail([" 0 X address=10.0.0.1"], "/ip arp");
        let json = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"address": "10.0.0.1", "_flags": "X", "disabled": true})
        );
    }

    #[test]
    fn test_classify_lines() {
        assert_eq!(classify("   ", false), Line::Blank);
        assert_eq!(classify("Flags: X - disabled", false), Line::Legend);
        assert_eq!(
            classify(" 4 X ;;; note", false),
            Line::CommentHeader {
                flags: Some("X".to_string()),
                comment: "note"
            }
        );
        assert_eq!(classify("  more words", true), Line::Continuation("more words"));
        assert_eq!(classify("  more words", false), Line::Pairs(vec![]));
    }
}
