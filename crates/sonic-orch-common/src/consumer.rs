//! Table event entries and the deduplicating per-table queue.

use std::collections::BTreeMap;

/// Operation carried by a table event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Set operation (insert or update)
    Set,
    /// Delete operation
    Del,
}

impl Operation {
    /// Returns true if this is a Set operation.
    pub fn is_set(&self) -> bool {
        matches!(self, Operation::Set)
    }

    /// Returns true if this is a Del operation.
    pub fn is_del(&self) -> bool {
        matches!(self, Operation::Del)
    }
}

/// A field-value pair from a table row.
pub type FieldValue = (String, String);

/// Key, operation, and field-values tuple.
///
/// This is the fundamental unit of data consumed from a table.
#[derive(Debug, Clone)]
pub struct KeyOpFieldsValues {
    /// The row key (e.g., "Ethernet0|10.0.0.1/24", "10.0.0.0/24")
    pub key: String,
    /// The operation (Set or Del)
    pub op: Operation,
    /// Field-value pairs (empty for Del operations)
    pub fvs: Vec<FieldValue>,
}

impl KeyOpFieldsValues {
    /// Creates a Set entry.
    pub fn set(key: impl Into<String>, fvs: Vec<FieldValue>) -> Self {
        Self {
            key: key.into(),
            op: Operation::Set,
            fvs,
        }
    }

    /// Creates a Del entry.
    pub fn del(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            op: Operation::Del,
            fvs: vec![],
        }
    }

    /// Returns the value for a field, if present.
    pub fn get_field(&self, field: &str) -> Option<&str> {
        self.fvs
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if this entry has the given field.
    pub fn has_field(&self, field: &str) -> bool {
        self.fvs.iter().any(|(f, _)| f == field)
    }
}

/// Helper trait for working with field-value collections.
pub trait FieldValuesExt {
    /// Gets the value for a field, if present.
    fn get_field(&self, field: &str) -> Option<&str>;

    /// Gets the value for a field, returning the default if not present.
    fn get_field_or<'a>(&'a self, field: &str, default: &'a str) -> &'a str;

    /// Checks if a field exists.
    fn has_field(&self, field: &str) -> bool;
}

impl FieldValuesExt for [FieldValue] {
    fn get_field(&self, field: &str) -> Option<&str> {
        self.iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    fn get_field_or<'a>(&'a self, field: &str, default: &'a str) -> &'a str {
        self.get_field(field).unwrap_or(default)
    }

    fn has_field(&self, field: &str) -> bool {
        self.iter().any(|(f, _)| f == field)
    }
}

/// Deduplicating queue of pending entries for one table.
///
/// When multiple operations accumulate for the same key before the daemon
/// gets to process them, redundant work is collapsed:
///
/// - SET after SET: field-values are merged, newer values win
/// - DEL after anything: pending entries for the key are dropped, only the
///   DEL remains
/// - SET after DEL: both are kept, in order
pub struct Consumer {
    table_name: String,
    priority: i32,
    pending: BTreeMap<String, Vec<KeyOpFieldsValues>>,
}

impl Consumer {
    /// Creates a consumer for the given table.
    ///
    /// Lower `priority` values are dispatched first by the event loop.
    pub fn new(table_name: impl Into<String>, priority: i32) -> Self {
        Self {
            table_name: table_name.into(),
            priority,
            pending: BTreeMap::new(),
        }
    }

    /// Returns the table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns the dispatch priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns true if no entries are pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns the number of pending entries.
    pub fn len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Queues an entry, merging with pending work on the same key.
    pub fn push(&mut self, entry: KeyOpFieldsValues) {
        let queue = self.pending.entry(entry.key.clone()).or_default();

        match entry.op {
            Operation::Del => {
                // Pending SETs for this key are now moot.
                queue.clear();
                queue.push(entry);
            }
            Operation::Set => {
                match queue.last_mut() {
                    Some(last) if last.op.is_set() => merge_fields(&mut last.fvs, entry.fvs),
                    _ => queue.push(entry),
                }
            }
        }
    }

    /// Drains all pending entries, in key order, preserving per-key
    /// operation order.
    pub fn drain(&mut self) -> Vec<KeyOpFieldsValues> {
        std::mem::take(&mut self.pending)
            .into_values()
            .flatten()
            .collect()
    }
}

/// Merges `newer` field-values into `older`, newer values winning.
fn merge_fields(older: &mut Vec<FieldValue>, newer: Vec<FieldValue>) {
    for (field, value) in newer {
        match older.iter_mut().find(|(f, _)| *f == field) {
            Some(existing) => existing.1 = value,
            None => older.push((field, value)),
        }
    }
}
