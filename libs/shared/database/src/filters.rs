// PostgREST query-string fragments built from user input.

use chrono::{DateTime, NaiveDate, Utc};
use shared_config::AppConfig;

/// Characters that carry meaning inside PostgREST logical filters.
const RESERVED: &[char] = &['(', ')', ',', '*', '"', '\\'];

fn sanitize(term: &str) -> String {
    term.trim().chars().filter(|c| !RESERVED.contains(c)).collect()
}

/// `column=eq.value` with the value URL-encoded.
pub fn eq(column: &str, value: impl ToString) -> String {
    format!("{}=eq.{}", column, urlencoding::encode(&value.to_string()))
}

/// Case-insensitive substring match on any of `columns`, or `None` when the
/// term is blank after sanitizing.
pub fn ilike_any(columns: &[&str], term: &str) -> Option<String> {
    let term = sanitize(term);
    if term.is_empty() {
        return None;
    }

    let clauses = columns
        .iter()
        .map(|column| format!("{}.ilike.*{}*", column, term))
        .collect::<Vec<_>>()
        .join(",");

    Some(format!("or=({})", urlencoding::encode(&clauses)))
}

/// UTC bounds `[start, end)` of a local calendar day.
pub fn local_day_bounds(config: &AppConfig, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset = config.local_offset();
    let start = date
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(offset).single())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN).and_utc());

    (start, start + chrono::Duration::days(1))
}

/// `column=gte.<start>&column=lt.<end>` for the local day `date`.
pub fn within_local_day(config: &AppConfig, column: &str, date: NaiveDate) -> String {
    let (start, end) = local_day_bounds(config, date);
    format!(
        "{column}=gte.{}&{column}=lt.{}",
        urlencoding::encode(&start.to_rfc3339()),
        urlencoding::encode(&end.to_rfc3339()),
        column = column,
    )
}

/// Joins non-empty fragments with `&`.
pub fn join(fragments: impl IntoIterator<Item = String>) -> String {
    fragments
        .into_iter()
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(offset_minutes: i32) -> AppConfig {
        AppConfig {
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            jwt_secret: String::new(),
            jwt_refresh_secret: String::new(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
            utc_offset_minutes: offset_minutes,
            default_tax_rate: 0.10,
            port: 3000,
        }
    }

    #[test]
    fn test_eq_encodes_value() {
        assert_eq!(eq("email", "a+b@hospital.test"), "email=eq.a%2Bb%40hospital.test");
        assert_eq!(eq("status", "PAID"), "status=eq.PAID");
    }

    #[test]
    fn test_ilike_any_strips_reserved_characters() {
        let filter = ilike_any(&["name", "phone"], " si(ti), ").unwrap();
        let decoded = urlencoding::decode(&filter).unwrap();

        assert_eq!(decoded, "or=(name.ilike.*siti*,phone.ilike.*siti*)");
        assert!(ilike_any(&["name"], " (*) ").is_none());
    }

    #[test]
    fn test_local_day_bounds_follow_offset() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();

        let (start, end) = local_day_bounds(&config(0), date);
        assert_eq!(start.to_rfc3339(), "2025-06-15T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-06-16T00:00:00+00:00");

        // UTC+7: local midnight is 17:00 UTC of the previous day.
        let (start, _) = local_day_bounds(&config(420), date);
        assert_eq!(start.to_rfc3339(), "2025-06-14T17:00:00+00:00");
    }

    #[test]
    fn test_join_skips_empty_fragments() {
        let query = join(vec!["a=eq.1".to_string(), String::new(), "b=eq.2".to_string()]);
        assert_eq!(query, "a=eq.1&b=eq.2");
    }
}
