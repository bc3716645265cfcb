//! Partition filters: an ordered list of slash-delimited prefixes that scopes
//! which store records a transfer cares about.

use serde::{Deserialize, Serialize};

/// Ordered list of partition prefixes.
///
/// A record matches a filter iff its `partition` has any listed prefix as a
/// prefix. On the wire the prefixes are newline-joined into a single string
/// (see [`Filter::to_wire_string`] / [`Filter::from_wire_string`]), matching
/// the `TransferSession.filter` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter {
    prefixes: Vec<String>,
}

impl Filter {
    /// An empty filter matches nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self { prefixes: Vec::new() }
    }

    #[must_use]
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    /// Parses the newline-separated wire representation.
    #[must_use]
    pub fn from_wire_string(raw: &str) -> Self {
        let prefixes = raw
            .split('\n')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect();
        Self { prefixes }
    }

    /// Renders the newline-separated wire representation.
    #[must_use]
    pub fn to_wire_string(&self) -> String {
        self.prefixes.join("\n")
    }

    #[must_use]
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Whether `partition` is covered by any prefix in this filter.
    ///
    /// Matching is a plain string-prefix test: `partition` matches iff some
    /// listed prefix is a prefix of `partition`.
    #[must_use]
    pub fn matches(&self, partition: &str) -> bool {
        self.prefixes.iter().any(|p| partition.starts_with(p.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::empty()
    }
}
