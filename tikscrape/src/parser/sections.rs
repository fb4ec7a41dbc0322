//! Splitting of multi-command dumps.
//!
//! A dump concatenates the output of several commands, each introduced by a
//! marker line of the exact form `=== <command> ===`.

use indexmap::IndexMap;

use super::detail::parse_detail;
use super::record::Record;

const MARKER_OPEN: &str = "=== ";
const MARKER_CLOSE: &str = " ===";

/// Return the label of a marker line.
pub fn marker_label(line: &str) -> Option<&str> {
    let line = line.trim_end_matches(['\r', '\n']);
    line.strip_prefix(MARKER_OPEN)
        .and_then(|rest| rest.strip_suffix(MARKER_CLOSE))
        .map(str::trim)
}

/// Build the marker line for a command.
pub fn marker_line(label: &str) -> String {
    format!("{MARKER_OPEN}{label}{MARKER_CLOSE}")
}

/// Split a dump into blocks and parse each with its label as section name.
///
/// Labels keep the order they first appeared in. Lines before the first
/// marker are ignored. A block with no lines still gets an entry, holding
/// an empty record list; a repeated label replaces the earlier records.
pub fn split_sections<I, S>(lines: I) -> IndexMap<String, Vec<Record>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut blocks: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut current: Option<String> = None;

    for line in lines {
        let line = line.as_ref();
        if let Some(label) = marker_label(line) {
            blocks.insert(label.to_string(), Vec::new());
            current = Some(label.to_string());
        } else if let Some(label) = &current {
            if let Some(block) = blocks.get_mut(label) {
                block.push(line.to_string());
            }
        }
    }

    blocks
        .into_iter()
        .map(|(label, block)| {
            let records = parse_detail(&block, &label);
            (label, records)
        })
        .collect()
}

/// [`split_sections`] over a whole dump string.
pub fn split_sections_str(text: &str) -> IndexMap<String, Vec<Record>> {
    split_sections(text.lines())
}
