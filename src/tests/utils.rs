use crate::config::{AppConfig, LegacyCredentials, StandardCredentials};
use crate::db::connection::{init_db, Database};
use chrono::FixedOffset;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize a fresh test DB using the production schema. Each call gets
/// its own file so parallel tests never share state.
pub fn init_test_db() -> Database {
    let n = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!(
        "tourops_test_{}_{n}.sqlite",
        std::process::id()
    ));
    let db = Database::new(path.to_string_lossy().to_string());

    init_db(&db, "sql/schema.sql")
        .unwrap_or_else(|e| panic!("Database initialization failed: {e}"));

    db
}

/// Config pointing at ports nothing listens on, so any accidental real
/// network call fails immediately instead of hanging.
pub fn test_config() -> AppConfig {
    AppConfig {
        db_path: ":memory:".to_string(),
        legacy_base_url: "http://127.0.0.1:1".to_string(),
        standard_base_url: "http://127.0.0.1:1".to_string(),
        legacy: LegacyCredentials {
            access_key: "test-access".to_string(),
            secret_key: "test-secret".to_string(),
        },
        standard: StandardCredentials {
            api_token: "test-token".to_string(),
        },
        operator_tz: FixedOffset::east_opt(0).unwrap(),
        call_timeout: Duration::from_secs(1),
        run_budget: Duration::from_secs(5),
        stale_after: Duration::from_secs(15 * 60),
    }
}
