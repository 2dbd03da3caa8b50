//! In-memory table bus: named key/value tables with change subscriptions.
//!
//! This module provides the "subscribable key/value table" abstraction the
//! daemons are written against. Rows are hashes of field-value pairs, writes
//! are last-write-wins upserts, and every write to a subscribed table is
//! delivered as a [`TableEvent`] on a fan-in channel, so a single-task event
//! loop can wait on all of its sources at once.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::{FieldValue, KeyOpFieldsValues, Operation};

/// A change event delivered to subscribers.
#[derive(Debug, Clone)]
pub struct TableEvent {
    /// Name of the table the event originated from.
    pub table: String,
    /// The key, operation, and field-values of the write.
    pub entry: KeyOpFieldsValues,
}

struct Subscription {
    tables: HashSet<String>,
    tx: mpsc::UnboundedSender<TableEvent>,
}

#[derive(Default)]
struct DatabaseInner {
    tables: HashMap<String, BTreeMap<String, Vec<FieldValue>>>,
    subscriptions: Vec<Subscription>,
}

/// A set of named key/value tables with pub/sub change delivery.
///
/// Cloning is cheap; clones share the same underlying tables. All operations
/// take the lock for the duration of one map access and never block on
/// subscribers (delivery uses unbounded channels).
#[derive(Clone, Default)]
pub struct Database {
    inner: Arc<Mutex<DatabaseInner>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle bound to one table of this database.
    pub fn table(&self, name: impl Into<String>) -> Table {
        Table {
            db: self.clone(),
            name: name.into(),
        }
    }

    /// Subscribes to change events from the given tables.
    ///
    /// Every subsequent write to any of the tables is delivered on the
    /// returned channel, in write order across all of them.
    pub fn subscribe<S: AsRef<str>>(&self, tables: &[S]) -> mpsc::UnboundedReceiver<TableEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        inner.subscriptions.push(Subscription {
            tables: tables.iter().map(|s| s.as_ref().to_string()).collect(),
            tx,
        });
        rx
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DatabaseInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(inner: &mut DatabaseInner, table: &str, entry: KeyOpFieldsValues) {
        // Drop subscribers whose receiver is gone.
        inner.subscriptions.retain(|sub| {
            if !sub.tables.contains(table) {
                return true;
            }
            sub.tx
                .send(TableEvent {
                    table: table.to_string(),
                    entry: entry.clone(),
                })
                .is_ok()
        });
    }
}

/// Producer/reader handle for one table of a [`Database`].
#[derive(Clone)]
pub struct Table {
    db: Database,
    name: String,
}

impl Table {
    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Upserts a row (last-write-wins) and notifies subscribers.
    pub fn set(&self, key: impl Into<String>, fvs: Vec<FieldValue>) {
        let key = key.into();
        let mut inner = self.db.lock();
        inner
            .tables
            .entry(self.name.clone())
            .or_default()
            .insert(key.clone(), fvs.clone());
        debug!(table = %self.name, %key, "table set");
        Database::notify(
            &mut inner,
            &self.name,
            KeyOpFieldsValues {
                key,
                op: Operation::Set,
                fvs,
            },
        );
    }

    /// Deletes a row and notifies subscribers. Deleting an absent key is a
    /// no-op and produces no event.
    pub fn del(&self, key: &str) {
        let mut inner = self.db.lock();
        let existed = inner
            .tables
            .get_mut(&self.name)
            .map(|rows| rows.remove(key).is_some())
            .unwrap_or(false);
        if !existed {
            return;
        }
        debug!(table = %self.name, %key, "table del");
        Database::notify(&mut inner, &self.name, KeyOpFieldsValues::del(key));
    }

    /// Returns the row for `key`, if present.
    pub fn get(&self, key: &str) -> Option<Vec<FieldValue>> {
        self.db
            .lock()
            .tables
            .get(&self.name)
            .and_then(|rows| rows.get(key).cloned())
    }

    /// Returns all rows, in key order. Used for startup reconciliation.
    pub fn snapshot(&self) -> Vec<(String, Vec<FieldValue>)> {
        self.db
            .lock()
            .tables
            .get(&self.name)
            .map(|rows| rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }
}
