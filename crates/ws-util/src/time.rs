//! Time utilities for the workspace tools
//!
//! Expirations and trash generations are plain epoch seconds. Durations in
//! the policy store and on the command line are whole days.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `WS_MOCK_TIME` environment variable can be set to
//! shift the clock used for expirations and release generations.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 14:30:00`)

use chrono::{DateTime, Local, TimeZone};
use std::sync::OnceLock;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "WS_MOCK_TIME";

/// Seconds in one day of workspace lifetime
pub const SECONDS_PER_DAY: i64 = 24 * 3600;

/// Offset between mock time and real time, computed once per process.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let raw = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            let parsed = chrono::NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .and_then(|naive| Local.from_local_datetime(&naive).single());
            match parsed {
                Some(mock_dt) => {
                    let offset = mock_dt.signed_duration_since(Local::now());
                    tracing::info!(
                        mock_time = %raw,
                        offset_secs = offset.num_seconds(),
                        "Mock time enabled"
                    );
                    Some(offset)
                }
                None => {
                    tracing::warn!(
                        mock_time = %raw,
                        expected_format = "%Y-%m-%d %H:%M:%S",
                        "Invalid mock time, using real time"
                    );
                    None
                }
            }
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Current local time, respecting mock time in debug builds.
pub fn now() -> DateTime<Local> {
    let real_now = Local::now();
    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Expiration epoch for a workspace living `days` days from `now`.
pub fn expiration_after(now: DateTime<Local>, days: i64) -> i64 {
    now.timestamp()
        .saturating_add(days.saturating_mul(SECONDS_PER_DAY))
}

/// Whole days left until `expiration`, negative once expired.
pub fn remaining_days(expiration: i64, now: DateTime<Local>) -> i64 {
    (expiration - now.timestamp()) / SECONDS_PER_DAY
}

/// Render an epoch timestamp in local time, e.g. for "unavailable since".
pub fn format_epoch(epoch: i64) -> String {
    match Local.timestamp_opt(epoch, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("@{epoch}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiration_is_whole_days_from_now() {
        let now = Local.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(expiration_after(now, 10), 1_700_000_000 + 10 * 86_400);
        assert_eq!(expiration_after(now, 0), 1_700_000_000);
    }

    #[test]
    fn remaining_days_truncates() {
        let now = Local.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(remaining_days(1_700_000_000 + 86_400 * 3 + 100, now), 3);
        assert_eq!(remaining_days(1_700_000_000, now), 0);
    }

    #[test]
    fn format_epoch_renders_date() {
        let s = format_epoch(1_700_000_000);
        assert!(s.starts_with("2023-11-1"));
    }
}
