//! Daemon entry: startup reconciliation and the event loop.
//!
//! The loop is single-threaded over a fan-in subscription channel. Pending
//! events are drained into per-table consumers and dispatched in table
//! priority order, so interface addressing is always applied before the
//! routes that depend on it.

use std::time::Duration;

use anyhow::bail;
use sonic_orch_common::{Consumer, Database, KeyOpFieldsValues, Operation, TableEvent};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::route_mgr::StaticRouteBfdMgr;
use crate::tables::{
    defaults, CFG_BFD_SESSION_TABLE, CFG_INTF_TABLE, CFG_LOOPBACK_INTF_TABLE,
    CFG_PORTCHANNEL_INTF_TABLE, CFG_STATIC_ROUTE_TABLE, STATE_BFD_SESSION_TABLE,
};
use crate::types::BfdSessionParams;

/// Input tables, in dispatch priority order.
const INPUT_TABLES: [&str; 5] = [
    CFG_LOOPBACK_INTF_TABLE,
    CFG_INTF_TABLE,
    CFG_PORTCHANNEL_INTF_TABLE,
    CFG_STATIC_ROUTE_TABLE,
    STATE_BFD_SESSION_TABLE,
];

/// Runs the daemon against the given database until shutdown.
pub async fn run(db: Database, bfd_params: Option<BfdSessionParams>) -> anyhow::Result<()> {
    // Subscribe before reconciling so nothing written in between is lost.
    let mut events = db.subscribe(&INPUT_TABLES);
    let mut mgr = StaticRouteBfdMgr::new(&db, bfd_params);

    reconcile_startup(&mut mgr, &db);
    event_loop(&mut mgr, &mut events).await
}

/// Replays existing table content to rebuild state after a restart.
///
/// Order matters: interface addressing first so session requests resolve
/// directly, then pre-existing session rows, then routes (which claim the
/// sessions they need), then the sweep of unclaimed sessions, and finally
/// reported session state.
pub fn reconcile_startup(mgr: &mut StaticRouteBfdMgr, db: &Database) {
    info!("replaying table snapshots");

    for table in [
        CFG_LOOPBACK_INTF_TABLE,
        CFG_INTF_TABLE,
        CFG_PORTCHANNEL_INTF_TABLE,
    ] {
        for (key, _fvs) in db.table(table).snapshot() {
            if let Err(e) = mgr.handle_intf_event(&key, Operation::Set) {
                warn!(table, key = %key, error = %e, "skipping interface row");
            }
        }
    }

    for (key, _fvs) in db.table(CFG_BFD_SESSION_TABLE).snapshot() {
        if let Err(e) = mgr.seed_existing_session(&key) {
            warn!(table = CFG_BFD_SESSION_TABLE, key = %key, error = %e, "skipping session row");
        }
    }

    for (key, fvs) in db.table(CFG_STATIC_ROUTE_TABLE).snapshot() {
        if let Err(e) = mgr.set_route(&key, &fvs) {
            warn!(table = CFG_STATIC_ROUTE_TABLE, key = %key, error = %e, "skipping route row");
        }
    }

    mgr.sweep_unowned_sessions();

    for (key, fvs) in db.table(STATE_BFD_SESSION_TABLE).snapshot() {
        mgr.handle_bfd_state_event(&key, &fvs);
    }

    info!("startup reconciliation complete");
}

async fn event_loop(
    mgr: &mut StaticRouteBfdMgr,
    events: &mut UnboundedReceiver<TableEvent>,
) -> anyhow::Result<()> {
    let mut consumers: Vec<Consumer> = INPUT_TABLES
        .iter()
        .enumerate()
        .map(|(priority, table)| Consumer::new(*table, priority as i32))
        .collect();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    info!("entering event loop");

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("shutdown signal received");
                return Ok(());
            }
            polled = tokio::time::timeout(
                Duration::from_millis(defaults::SELECT_TIMEOUT_MS),
                events.recv(),
            ) => {
                let first = match polled {
                    Err(_) => continue, // poll timeout, nothing pending
                    Ok(None) => bail!("table event subscription closed"),
                    Ok(Some(event)) => event,
                };

                // Batch everything already queued, then dispatch by table
                // priority with per-key dedup applied by the consumers.
                enqueue(&mut consumers, first);
                while let Ok(event) = events.try_recv() {
                    enqueue(&mut consumers, event);
                }
                for consumer in &mut consumers {
                    let table = consumer.table_name().to_string();
                    for entry in consumer.drain() {
                        dispatch(mgr, &table, entry);
                    }
                }
            }
        }
    }
}

fn enqueue(consumers: &mut [Consumer], event: TableEvent) {
    match consumers
        .iter_mut()
        .find(|c| c.table_name() == event.table)
    {
        Some(consumer) => consumer.push(event.entry),
        None => debug!(table = %event.table, "event for unhandled table"),
    }
}

/// Routes one table entry to its handler. Handler errors are logged and
/// the entry is dropped; one bad row must not stall the loop.
pub fn dispatch(mgr: &mut StaticRouteBfdMgr, table: &str, entry: KeyOpFieldsValues) {
    let result = match table {
        CFG_LOOPBACK_INTF_TABLE | CFG_INTF_TABLE | CFG_PORTCHANNEL_INTF_TABLE => {
            mgr.handle_intf_event(&entry.key, entry.op)
        }
        CFG_STATIC_ROUTE_TABLE => match entry.op {
            Operation::Set => mgr.set_route(&entry.key, &entry.fvs),
            Operation::Del => mgr.del_route(&entry.key),
        },
        STATE_BFD_SESSION_TABLE => {
            match entry.op {
                Operation::Set => mgr.handle_bfd_state_event(&entry.key, &entry.fvs),
                Operation::Del => mgr.handle_bfd_state_delete(&entry.key),
            }
            Ok(())
        }
        _ => Ok(()),
    };

    if let Err(e) = result {
        warn!(table, key = %entry.key, error = %e, "dropping event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::APP_STATIC_ROUTE_TABLE;
    use pretty_assertions::assert_eq;
    use sonic_orch_common::FieldValuesExt;

    fn fvs(pairs: &[(&str, &str)]) -> Vec<sonic_orch_common::FieldValue> {
        pairs
            .iter()
            .map(|(f, v)| (f.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_reconcile_startup_rebuilds_published_state() {
        let db = Database::new();
        db.table(CFG_INTF_TABLE)
            .set("Ethernet0|10.0.0.100/24", fvs(&[("NULL", "NULL")]));
        db.table(CFG_STATIC_ROUTE_TABLE).set(
            "192.168.0.0/24",
            fvs(&[("nexthop", "10.0.0.1"), ("ifname", "Ethernet0"), ("bfd", "true")]),
        );
        db.table(STATE_BFD_SESSION_TABLE)
            .set("default|default|10.0.0.1", fvs(&[("state", "Up")]));
        // A session row left over from a previous run of the daemon.
        db.table(CFG_BFD_SESSION_TABLE).set(
            "default:default:10.0.0.1",
            fvs(&[("local_addr", "10.0.0.100")]),
        );
        // A session someone else owns.
        db.table(CFG_BFD_SESSION_TABLE).set(
            "default:default:9.9.9.9",
            fvs(&[("local_addr", "10.0.0.100")]),
        );

        let mut mgr = StaticRouteBfdMgr::new(&db, None);
        reconcile_startup(&mut mgr, &db);

        // The route comes back filtered to its reachable nexthop.
        let rows = db.table(APP_STATIC_ROUTE_TABLE).snapshot();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "default:192.168.0.0/24");
        assert_eq!(rows[0].1.get_field("nexthop"), Some("10.0.0.1"));

        // The foreign session row is untouched but no longer tracked.
        assert_eq!(db.table(CFG_BFD_SESSION_TABLE).snapshot().len(), 2);
        let foreign =
            crate::types::BfdSessionKey::parse_output_key("default:default:9.9.9.9").unwrap();
        assert!(mgr.store().bfd_session(&foreign).is_none());
    }

    #[test]
    fn test_dispatch_handles_route_lifecycle() {
        let db = Database::new();
        let mut mgr = StaticRouteBfdMgr::new(&db, None);

        dispatch(
            &mut mgr,
            CFG_INTF_TABLE,
            KeyOpFieldsValues::set("Ethernet0|10.0.0.100/24", vec![]),
        );
        dispatch(
            &mut mgr,
            CFG_STATIC_ROUTE_TABLE,
            KeyOpFieldsValues::set(
                "192.168.0.0/24",
                fvs(&[("nexthop", "10.0.0.1"), ("ifname", "Ethernet0"), ("bfd", "true")]),
            ),
        );
        dispatch(
            &mut mgr,
            STATE_BFD_SESSION_TABLE,
            KeyOpFieldsValues::set("default|default|10.0.0.1", fvs(&[("state", "Up")])),
        );
        assert_eq!(db.table(APP_STATIC_ROUTE_TABLE).snapshot().len(), 1);

        dispatch(
            &mut mgr,
            CFG_STATIC_ROUTE_TABLE,
            KeyOpFieldsValues::del("192.168.0.0/24"),
        );
        assert!(db.table(APP_STATIC_ROUTE_TABLE).snapshot().is_empty());
        assert!(db.table(CFG_BFD_SESSION_TABLE).snapshot().is_empty());
    }

    #[test]
    fn test_dispatch_drops_malformed_entries() {
        let db = Database::new();
        let mut mgr = StaticRouteBfdMgr::new(&db, None);

        dispatch(
            &mut mgr,
            CFG_STATIC_ROUTE_TABLE,
            KeyOpFieldsValues::set("not-a-prefix", fvs(&[("nexthop", "10.0.0.1")])),
        );
        dispatch(
            &mut mgr,
            CFG_INTF_TABLE,
            KeyOpFieldsValues::set("Ethernet0|bad", vec![]),
        );
        assert!(db.table(APP_STATIC_ROUTE_TABLE).snapshot().is_empty());
    }
}
