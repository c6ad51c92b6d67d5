use std::env;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub port: u16,
    pub scheduling: SchedulingConfig,
}

/// Working window and slot geometry shared by every scheduling component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
    pub slot_granularity_minutes: i64,
    pub appointment_duration_minutes: i64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            day_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            day_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            slot_granularity_minutes: 1,
            appointment_duration_minutes: 60,
        }
    }
}

impl SchedulingConfig {
    /// Noon splits the working window into its AM and PM halves.
    pub fn midday() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            day_start: parse_time(&lookup, "CLINIC_DAY_START", defaults.day_start),
            day_end: parse_time(&lookup, "CLINIC_DAY_END", defaults.day_end),
            slot_granularity_minutes: parse_minutes(
                &lookup,
                "CLINIC_SLOT_MINUTES",
                defaults.slot_granularity_minutes,
            ),
            appointment_duration_minutes: parse_minutes(
                &lookup,
                "CLINIC_APPOINTMENT_MINUTES",
                defaults.appointment_duration_minutes,
            ),
        };

        if config.day_start >= config.day_end {
            warn!(
                "CLINIC_DAY_START ({}) is not before CLINIC_DAY_END ({}), using default window",
                config.day_start, config.day_end
            );
            return Self {
                day_start: defaults.day_start,
                day_end: defaults.day_end,
                ..config
            };
        }

        config
    }
}

fn parse_time<F>(lookup: &F, key: &str, default: NaiveTime) -> NaiveTime
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M").unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using {}", key, raw, default);
            default
        }),
        None => default,
    }
}

/// Longest slot or appointment accepted from the environment: one day.
pub const MAX_MINUTES: i64 = 24 * 60;

fn parse_minutes<F>(lookup: &F, key: &str, default: i64) -> i64
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(minutes) if (1..=MAX_MINUTES).contains(&minutes) => minutes,
            _ => {
                warn!("{} has invalid value '{}', using {}", key, raw, default);
                default
            }
        },
        None => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            port: env::var("PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(3000),
            scheduling: SchedulingConfig::from_lookup(|key| env::var(key).ok()),
        };

        if !config.is_configured() {
            warn!("Supabase not configured - falling back to the in-memory store");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}
