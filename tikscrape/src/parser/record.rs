//! Parsed record type.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Key under which the raw flag string is exposed when serialized.
pub const FLAGS_KEY: &str = "_flags";

/// One parsed RouterOS item (a route, lease, queue, ...).
///
/// Fields keep the order they appeared in. The raw flag token and its
/// decoded names are kept apart from the fields so that a `disabled=yes`
/// field and a decoded `X` flag never overwrite each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: IndexMap<String, String>,
    raw_flags: Option<String>,
    flags: IndexMap<String, bool>,
}

impl Record {
    pub(crate) fn new(
        fields: IndexMap<String, String>,
        raw_flags: Option<String>,
        flags: IndexMap<String, bool>,
    ) -> Self {
        Self {
            fields,
            raw_flags,
            flags,
        }
    }

    /// Get a field value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Get a field value, empty when absent.
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// Check whether a field is present.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// All fields in order of appearance.
    pub fn fields(&self) -> &IndexMap<String, String> {
        &self.fields
    }

    /// The raw flag token from the header line (the `_flags` value).
    pub fn raw_flags(&self) -> Option<&str> {
        self.raw_flags.as_deref()
    }

    /// Decoded flags, keyed by semantic name or literal character.
    pub fn flags(&self) -> &IndexMap<String, bool> {
        &self.flags
    }

    /// Whether a decoded flag is set.
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    /// The item comment, if any.
    pub fn comment(&self) -> Option<&str> {
        self.get("comment")
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        if let Some(raw) = &self.raw_flags {
            map.serialize_entry(FLAGS_KEY, raw)?;
            for (name, set) in &self.flags {
                if !self.fields.contains_key(name) {
                    map.serialize_entry(name, set)?;
                }
            }
        }
        map.end()
    }
}
