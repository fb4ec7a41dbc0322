//! Parsing of RouterOS CLI transcripts.
//!
//! - [`flags`] decodes single-character flag tokens per menu
//! - [`detail`] turns `print detail` output into [`Record`]s
//! - [`sections`] splits `=== command ===` delimited dumps

pub mod detail;
pub mod flags;
mod record;
pub mod sections;

pub use detail::{DetailParser, ParserState, parse_detail, parse_detail_str};
pub use flags::{Section, decode};
pub use record::{FLAGS_KEY, Record};
pub use sections::{split_sections, split_sections_str};
