//! Field codec for RouterOS command tokens.
//!
//! RouterOS tokenizes arguments on whitespace, so any value holding a space,
//! comma or semicolon must travel inside double quotes. Inside quotes the
//! shell understands `\"` and `\\` escapes.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::FormatError;

/// 12 hexadecimal characters, separators already removed.
static MAC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9A-Fa-f]{12}$").unwrap());

/// Strip surrounding whitespace and one layer of matching quotes.
///
/// Double-quoted values have their `\"` and `\\` escapes resolved.
pub fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next_back()) {
        (Some('"'), Some('"')) => unescape(&trimmed[1..trimmed.len() - 1]),
        (Some('\''), Some('\'')) => trimmed[1..trimmed.len() - 1].to_string(),
        _ => trimmed.to_string(),
    }
}

/// [`unquote`] for values that may be absent; `None` yields an empty string.
pub fn unquote_opt(value: Option<&str>) -> String {
    value.map(unquote).unwrap_or_default()
}

/// Quote a value for use as a command argument.
///
/// Wraps in double quotes iff the value contains a space, comma or
/// semicolon. An empty value becomes `""`.
pub fn quote(value: &str) -> String {
    if value.is_empty() {
        return "\"\"".to_string();
    }
    if !value.contains([' ', ',', ';']) {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// [`quote`] for values that may be absent; `None` yields `""`.
pub fn quote_opt(value: Option<&str>) -> String {
    value.map(quote).unwrap_or_else(|| "\"\"".to_string())
}

/// Normalise a MAC address to colon-separated upper case (`AA:BB:CC:DD:EE:FF`).
///
/// Accepts `7C:EA:48:05:E5:E4`, `7C-EA-48-05-E5-E4`, `7cea.4805.e5e4` and
/// `7CEA4805E5E4`.
pub fn normalize_mac(raw: &str) -> Result<String, FormatError> {
    let hex: String = raw
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.') && !c.is_whitespace())
        .collect();

    if !MAC_RE.is_match(&hex) {
        return Err(FormatError::invalid("MAC address", raw));
    }

    let upper = hex.to_ascii_uppercase();
    let octets: Vec<&str> = (0..12).step_by(2).map(|i| &upper[i..i + 2]).collect();
    Ok(octets.join(":"))
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(next @ ('"' | '\\')) => out.push(next),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}
