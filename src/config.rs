//! Application-level configuration loading, including the daily schedule.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::SystemTime};

use serde::Deserialize;
use time::{Duration, OffsetDateTime, Time, UtcOffset};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LAST_TOUCH_BACK_CONFIG_PATH";

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    schedule: DailySchedule,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// built-in daily schedule (noon at UTC-5, the original game's anchor).
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => match AppConfig::try_from(raw) {
                    Ok(config) => {
                        info!(
                            path = %path.display(),
                            schedule = ?config.schedule,
                            "loaded daily schedule from config"
                        );
                        config
                    }
                    Err(err) => {
                        warn!(
                            path = %path.display(),
                            error = %err,
                            "config contains an invalid schedule; falling back to defaults"
                        );
                        Self::default()
                    }
                },
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// The configured daily schedule.
    pub fn schedule(&self) -> &DailySchedule {
        &self.schedule
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schedule: DailySchedule::default(),
        }
    }
}

/// When the daily game starts, expressed in a fixed UTC offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySchedule {
    start: Time,
    offset: UtcOffset,
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self {
            start: Time::MIDNIGHT + Duration::hours(12),
            offset: UtcOffset::from_hms(-5, 0, 0).unwrap_or(UtcOffset::UTC),
        }
    }
}

impl DailySchedule {
    /// Next start instant at or after `now`: today's start if it has not
    /// passed yet, otherwise tomorrow's.
    pub fn next_start(&self, now: SystemTime) -> SystemTime {
        let local = OffsetDateTime::from(now).to_offset(self.offset);
        let today_start = local.replace_time(self.start);
        let start = if local < today_start {
            today_start
        } else {
            today_start + Duration::days(1)
        };
        start.into()
    }

    /// The local-day window `[midnight, next midnight)` containing `now`,
    /// used to look up "today's game".
    pub fn day_window(&self, now: SystemTime) -> (SystemTime, SystemTime) {
        let local = OffsetDateTime::from(now).to_offset(self.offset);
        let midnight = local.replace_time(Time::MIDNIGHT);
        (midnight.into(), (midnight + Duration::days(1)).into())
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_start_hour")]
    start_hour: u8,
    #[serde(default)]
    start_minute: u8,
    #[serde(default = "default_utc_offset_hours")]
    utc_offset_hours: i8,
}

fn default_start_hour() -> u8 {
    12
}

fn default_utc_offset_hours() -> i8 {
    -5
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = time::error::ComponentRange;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let start = Time::from_hms(raw.start_hour, raw.start_minute, 0)?;
        let offset = UtcOffset::from_hms(raw.utc_offset_hours, 0, 0)?;
        Ok(Self {
            schedule: DailySchedule { start, offset },
        })
    }
}

fn resolve_config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn schedule() -> DailySchedule {
        DailySchedule::default()
    }

    #[test]
    fn next_start_is_today_before_noon_local() {
        // 10:00 UTC-5 == 15:00 UTC.
        let now: SystemTime = datetime!(2026-08-06 15:00 UTC).into();
        let expected: SystemTime = datetime!(2026-08-06 12:00 -5).into();
        assert_eq!(schedule().next_start(now), expected);
    }

    #[test]
    fn next_start_rolls_to_tomorrow_after_noon_local() {
        // 13:30 UTC-5.
        let now: SystemTime = datetime!(2026-08-06 18:30 UTC).into();
        let expected: SystemTime = datetime!(2026-08-07 12:00 -5).into();
        assert_eq!(schedule().next_start(now), expected);
    }

    #[test]
    fn day_window_brackets_now_and_contains_next_start() {
        let now: SystemTime = datetime!(2026-08-06 15:00 UTC).into();
        let (from, to) = schedule().day_window(now);
        assert!(from <= now && now < to);
        assert!(from <= schedule().next_start(now) && schedule().next_start(now) < to);
    }

    #[test]
    fn invalid_raw_schedule_is_rejected() {
        let raw = RawConfig {
            start_hour: 24,
            start_minute: 0,
            utc_offset_hours: 0,
        };
        assert!(AppConfig::try_from(raw).is_err());
    }
}
