//! Provenance records
//!
//! Every mutation of a field appends one [`HistoryEntry`]: a snapshot of the
//! value after the mutation, the call-site that caused it, and a label naming
//! the operation. Logs are append-only.

use std::fmt::Write as _;
use std::panic::Location;

use crate::value::Value;

/// Source location of a declaration or mutation
pub type CallSite = &'static Location<'static>;

/// One provenance record
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    value: Value,
    at: CallSite,
    label: String,
}

impl HistoryEntry {
    /// Create a new record
    #[inline]
    #[must_use]
    pub fn new(value: Value, at: CallSite, label: impl Into<String>) -> Self {
        Self {
            value,
            at,
            label: label.into(),
        }
    }

    /// Value snapshot
    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Call-site of the mutation
    #[inline]
    #[must_use]
    pub fn at(&self) -> CallSite {
        self.at
    }

    /// Operation label (`"assignment"`, `"insert"`, `"setitem[2]"`, ...)
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Append-only log of provenance records for one field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    /// Create an empty log
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, value: Value, at: CallSite, label: impl Into<String>) {
        self.entries.push(HistoryEntry::new(value, at, label));
    }

    /// Number of records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the log is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent record
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// All records, oldest first
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Iterate over records, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Labels of all records, oldest first
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(HistoryEntry::label).collect()
    }

    /// Render the log as an aligned table
    ///
    /// ```text
    /// root.threshold:
    /// 3.0   default     src/lib.rs:10:5
    /// 4.5   assignment  src/main.rs:22:9
    /// ```
    #[must_use]
    pub fn format(&self, title: &str) -> String {
        let values: Vec<String> = self.entries.iter().map(|e| e.value.to_string()).collect();
        let value_width = values.iter().map(String::len).max().unwrap_or(0);
        let label_width = self.entries.iter().map(|e| e.label.len()).max().unwrap_or(0);

        let mut out = format!("{title}:");
        for (entry, value) in self.entries.iter().zip(&values) {
            let _ = write!(
                out,
                "\n{value:<value_width$}  {label:<label_width$}  {at}",
                label = entry.label,
                at = entry.at,
            );
        }
        out
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a HistoryEntry;
    type IntoIter = std::slice::Iter<'a, HistoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
