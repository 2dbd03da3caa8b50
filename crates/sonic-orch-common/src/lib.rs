//! Common orchestration abstractions for SONiC control-plane daemons.
//!
//! This crate provides the table plumbing shared by orchestration daemons:
//!
//! - [`Database`]: named key/value tables with last-write-wins upserts,
//!   snapshot reads, and change subscriptions
//! - [`Table`]: a producer/reader handle bound to one table of a [`Database`]
//! - [`Consumer`]: per-table pending-event queue with deduplication
//! - [`KeyOpFieldsValues`]: the `(key, operation, field-values)` unit of work
//!
//! # Architecture
//!
//! The event flow follows the swss model:
//!
//! 1. Producers write rows into tables via [`Table::set`] / [`Table::del`]
//! 2. A daemon subscribes to the tables it cares about and receives every
//!    write as a [`TableEvent`] on a single fan-in channel
//! 3. Ready events are drained into per-table [`Consumer`]s, which merge
//!    redundant operations on the same key
//! 4. The daemon dispatches drained entries to its handlers in consumer
//!    priority order
//!
//! Snapshot reads ([`Table::snapshot`]) serve startup reconciliation: a
//! daemon replays current table contents before switching to live events.

mod consumer;
mod table;

pub use consumer::{Consumer, FieldValue, FieldValuesExt, KeyOpFieldsValues, Operation};
pub use table::{Database, Table, TableEvent};
