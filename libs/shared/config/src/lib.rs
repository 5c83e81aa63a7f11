use std::env;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    /// Offset of the hospital's local calendar from UTC. Day-scoped
    /// identifiers roll over at local midnight.
    pub utc_offset_minutes: i32,
    pub default_tax_rate: f64,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            jwt_refresh_secret: env::var("JWT_REFRESH_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_REFRESH_SECRET not set, using empty value");
                    String::new()
                }),
            access_token_ttl_minutes: parse_or("ACCESS_TOKEN_TTL_MINUTES", 15),
            refresh_token_ttl_days: parse_or("REFRESH_TOKEN_TTL_DAYS", 7),
            utc_offset_minutes: parse_or("UTC_OFFSET_MINUTES", 0),
            default_tax_rate: parse_or("DEFAULT_TAX_RATE", 0.10),
            port: parse_or("PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_service_key.is_empty()
            && !self.jwt_secret.is_empty()
            && !self.jwt_refresh_secret.is_empty()
    }

    pub fn local_offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                warn!("UTC_OFFSET_MINUTES {} out of range, falling back to UTC", self.utc_offset_minutes);
                Utc.fix()
            })
    }

    /// Calendar date of `instant` in the hospital's local time.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.local_offset()).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }
}

fn parse_or<T: FromStr + std::fmt::Display + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config_with_offset(minutes: i32) -> AppConfig {
        AppConfig {
            supabase_url: "http://localhost".to_string(),
            supabase_service_key: "key".to_string(),
            jwt_secret: "secret".to_string(),
            jwt_refresh_secret: "refresh".to_string(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
            utc_offset_minutes: minutes,
            default_tax_rate: 0.10,
            port: 3000,
        }
    }

    #[test]
    fn test_local_date_crosses_midnight_with_positive_offset() {
        let config = config_with_offset(7 * 60);
        let instant = Utc.with_ymd_and_hms(2025, 6, 14, 18, 30, 0).unwrap();

        assert_eq!(config.local_date(instant), NaiveDate::from_ymd_opt(2025, 6, 15).unwrap());
    }

    #[test]
    fn test_local_date_in_utc() {
        let config = config_with_offset(0);
        let instant = Utc.with_ymd_and_hms(2025, 6, 14, 23, 59, 59).unwrap();

        assert_eq!(config.local_date(instant), NaiveDate::from_ymd_opt(2025, 6, 14).unwrap());
    }

    #[test]
    fn test_out_of_range_offset_falls_back_to_utc() {
        for minutes in [i32::MAX, i32::MIN, 24 * 60, -(24 * 60)] {
            assert_eq!(config_with_offset(minutes).local_offset(), Utc.fix(), "{}", minutes);
        }
        assert_eq!(config_with_offset(-(5 * 60)).local_offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn test_is_configured_requires_secrets() {
        let mut config = config_with_offset(0);
        assert!(config.is_configured());

        config.jwt_refresh_secret.clear();
        assert!(!config.is_configured());
    }
}
