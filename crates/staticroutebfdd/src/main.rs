//! staticroutebfdd - static route BFD manager daemon
//!
//! Monitors BFD-enabled static routes and keeps their published nexthops
//! consistent with BFD session liveness.

use sonic_orch_common::Database;
use sonic_staticroutebfdd::run;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    info!("--- Starting staticroutebfdd (Rust) ---");

    let db = Database::new();
    match run(db, None).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "staticroutebfdd terminated");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();
}
