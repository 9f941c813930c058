// src/config.rs
use chrono::FixedOffset;
use std::time::Duration;

/// Credentials for the legacy signed reservation API.
/// Passed explicitly into the client constructor; clients never read env.
#[derive(Clone)]
pub struct LegacyCredentials {
    pub access_key: String,
    pub secret_key: String,
}

/// Bearer token for the standard reservation API.
#[derive(Clone)]
pub struct StandardCredentials {
    pub api_token: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub db_path: String,
    pub legacy_base_url: String,
    pub standard_base_url: String,
    pub legacy: LegacyCredentials,
    pub standard: StandardCredentials,
    /// Operator-local timezone as a fixed UTC offset, used for "is this
    /// date in the past" validation.
    pub operator_tz: FixedOffset,
    /// Per-upstream-call timeout.
    pub call_timeout: Duration,
    /// Overall wall-clock budget for one orchestration run.
    pub run_budget: Duration,
    /// PROCESSING rows older than this are surfaced as stale.
    pub stale_after: Duration,
}

impl AppConfig {
    /// Read everything from the environment once, at startup.
    pub fn from_env() -> Result<Self, String> {
        let legacy = LegacyCredentials {
            access_key: require("LEGACY_API_ACCESS_KEY")?,
            secret_key: require("LEGACY_API_SECRET_KEY")?,
        };
        let standard = StandardCredentials {
            api_token: require("STANDARD_API_TOKEN")?,
        };

        let offset_hours: i32 = std::env::var("OPERATOR_UTC_OFFSET_HOURS")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .map_err(|_| "OPERATOR_UTC_OFFSET_HOURS must be an integer".to_string())?;
        let operator_tz = FixedOffset::east_opt(offset_hours * 3600)
            .ok_or_else(|| "OPERATOR_UTC_OFFSET_HOURS out of range".to_string())?;

        Ok(Self {
            db_path: std::env::var("TOUROPS_DB").unwrap_or_else(|_| "tourops.sqlite3".into()),
            legacy_base_url: std::env::var("LEGACY_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.bookings.example.com".into()),
            standard_base_url: std::env::var("STANDARD_API_BASE_URL")
                .unwrap_or_else(|_| "https://octo.bookings.example.com/v1".into()),
            legacy,
            standard,
            operator_tz,
            call_timeout: Duration::from_secs(15),
            run_budget: Duration::from_secs(60),
            stale_after: Duration::from_secs(15 * 60),
        })
    }
}

fn require(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|_| format!("{name} environment variable not set"))
}
