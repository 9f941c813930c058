pub mod availability;
mod error;
mod orchestrator;

pub use error::OrchestrationError;
pub use orchestrator::{
    Orchestrator, METHOD_CANCEL_REBOOK, METHOD_LEGACY_CANCEL, METHOD_LEGACY_CHANGE_DATE,
    METHOD_LEGACY_PICKUP, METHOD_STANDARD_CANCEL, METHOD_STANDARD_PATCH,
};

use crate::config::AppConfig;
use crate::db::change_requests;
use crate::db::connection::Database;
use crate::reservations::{LegacyClient, StandardClient};
use chrono::Utc;

/// Creation of a ledger entry is the sole trigger for processing: spawn a
/// detached worker for exactly this request. The worker opens its own DB
/// connection and builds its own upstream clients; nothing is shared with
/// other runs.
pub fn spawn_worker(db: &Database, config: &AppConfig, request_id: String) {
    let db = db.clone(); // cheap clone (path only)
    let config = config.clone();

    std::thread::spawn(move || {
        let legacy = match LegacyClient::new(
            config.legacy_base_url.clone(),
            config.legacy.clone(),
            config.call_timeout,
        ) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("❌ Legacy client init failed for {request_id}: {e}");
                fail_unstarted(&db, &request_id, &format!("legacy client init failed: {e}"));
                return;
            }
        };
        let standard = match StandardClient::new(
            config.standard_base_url.clone(),
            config.standard.clone(),
            config.call_timeout,
        ) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("❌ Standard client init failed for {request_id}: {e}");
                fail_unstarted(&db, &request_id, &format!("standard client init failed: {e}"));
                return;
            }
        };

        let orchestrator = Orchestrator::new(
            &db,
            &legacy,
            &standard,
            config.operator_tz,
            config.run_budget,
        );
        if let Err(e) = orchestrator.process(&request_id) {
            eprintln!("❌ Orchestration of {request_id} errored: {e}");
        }
    });
}

/// Terminal-fail a request whose worker could not even start its run.
/// A row left PENDING would be invisible to the stale-PROCESSING view,
/// so claim it and fail it while the worker can still report why.
pub(crate) fn fail_unstarted(db: &Database, request_id: &str, message: &str) {
    let now = Utc::now().naive_utc();
    match change_requests::claim(db, request_id, now) {
        Ok(true) => {
            if let Err(e) = change_requests::fail(db, request_id, message, None, now) {
                eprintln!("⚠️ Could not fail unstarted request {request_id}: {e}");
            }
        }
        Ok(false) => {} // someone else claimed it; their run owns the outcome
        Err(e) => eprintln!("⚠️ Could not claim unstarted request {request_id}: {e}"),
    }
}
