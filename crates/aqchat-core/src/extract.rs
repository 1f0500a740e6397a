//! Deterministic slot extraction from free-text messages.
//!
//! Pure functions that turn a raw user message into candidate slot values:
//! pollutant tokens, UTC date ranges, month pairs, and tenant-name-like
//! substrings. No NLU model is involved; everything is a fixed pattern rule
//! so behavior stays predictable and testable.
//!
//! Pattern checks that need diacritic tolerance run over
//! [`crate::text::normalize`]d text; verbatim values (pollutant case, date
//! digits) are always taken from the raw message.

use chrono::{DateTime, Months, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::text::normalize;

// ============================================================================
// Pollutants
// ============================================================================

/// Canonical pollutant vocabulary, in extraction priority order.
pub const POLLUTANTS: [&str; 6] = ["PM2.5", "PM10", "NO2", "SO2", "O3", "CO"];

static CO_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bCO\b").unwrap());

static POLLUTANT_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(pm2\.5|pm25|pm10|no2|so2|o3|co)\b").unwrap());

/// Scans the raw message for a single pollutant token.
///
/// Priority order is PM2.5 > PM10 > NO2 > SO2 > O3 > CO; `PM25` counts as
/// PM2.5. `CO` is only matched as a standalone word so it cannot collide
/// with substrings of other tokens.
pub fn extract_pollutant(message: &str) -> Option<&'static str> {
    let upper = message.to_uppercase();
    if upper.contains("PM2.5") || upper.contains("PM25") {
        return Some("PM2.5");
    }
    if upper.contains("PM10") {
        return Some("PM10");
    }
    if upper.contains("NO2") {
        return Some("NO2");
    }
    if upper.contains("SO2") {
        return Some("SO2");
    }
    if upper.contains("O3") {
        return Some("O3");
    }
    if CO_WORD.is_match(&upper) {
        return Some("CO");
    }
    None
}

/// Extracts every pollutant mentioned in the message as a de-duplicated
/// list in vocabulary priority order (`PM25` collapses into `PM2.5`).
pub fn extract_pollutants(message: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for m in POLLUTANT_WORD.find_iter(message) {
        let token = normalize_pollutant_token(m.as_str());
        if !out.iter().any(|p| p.eq_ignore_ascii_case(&token)) {
            out.push(token);
        }
    }
    out.sort_by_key(|p| {
        POLLUTANTS
            .iter()
            .position(|c| *c == p.as_str())
            .unwrap_or(POLLUTANTS.len())
    });
    out
}

/// Whether the message names any pollutant from the closed vocabulary.
pub fn has_pollutant_token(message: &str) -> bool {
    POLLUTANT_WORD.is_match(message)
}

/// Trims, uppercases, and collapses the `PM25` spelling into `PM2.5`.
pub fn normalize_pollutant_token(pollutant: &str) -> String {
    let p = pollutant.trim().to_uppercase();
    if p == "PM25" {
        "PM2.5".to_string()
    } else {
        p
    }
}

/// Maps a pollutant token to the versioned database parameter code used by
/// the aggregation engine. Total and idempotent; unrecognized input passes
/// through case-normalized.
pub fn normalize_db_parameter(pollutant: &str) -> String {
    let p = normalize_pollutant_token(pollutant);
    match p.as_str() {
        "PM10" => "PM10-24h".to_string(),
        "PM2.5" => "PM2.5-24h".to_string(),
        "NO2" => "NO2-1h".to_string(),
        "O3" => "O3-1h".to_string(),
        "SO2" => "SO2-1h".to_string(),
        "CO" => "CO-8h".to_string(),
        _ => p,
    }
}

// ============================================================================
// Date ranges
// ============================================================================

/// A half-open UTC interval `[start, end)` representing whole-day spans
/// unambiguously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// One whole day: `[day, day+1)`.
    pub fn single_day(day: NaiveDate) -> Self {
        Self::inclusive_days(day, day)
    }

    /// Inclusive day span: `[start, end+1)`.
    pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: at_midnight_utc(start),
            end: at_midnight_utc(end + chrono::Days::new(1)),
        }
    }

    /// Default query window: the last 7 days up to tomorrow midnight,
    /// `[today-7, today+1)`.
    pub fn last_week(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        Self {
            start: at_midnight_utc(today - chrono::Days::new(7)),
            end: at_midnight_utc(today + chrono::Days::new(1)),
        }
    }

    /// Boundary dates formatted `YYYY-MM-DD` (the exclusive end is
    /// formatted as-is, matching the reply templates).
    pub fn format_dates(&self) -> (String, String) {
        (
            self.start.format("%Y-%m-%d").to_string(),
            self.end.format("%Y-%m-%d").to_string(),
        )
    }
}

fn at_midnight_utc(day: NaiveDate) -> DateTime<Utc> {
    // Unspecified kinds are treated as already-UTC wall clock.
    Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).expect("midnight is valid"))
}

static DATE_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2}).*(\d{4})-(\d{2})-(\d{2})").unwrap());

static DATE_SINGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap());

fn parse_day(caps: &regex::Captures<'_>, offset: usize) -> Option<NaiveDate> {
    let s = format!("{}-{}-{}", &caps[offset], &caps[offset + 1], &caps[offset + 2]);
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Recognizes a date range in the message, in priority order:
///
/// 1. an explicit `YYYY-MM-DD .. YYYY-MM-DD` pair anywhere in the text,
///    mapped to the half-open range `[start, end+1)`;
/// 2. a single `YYYY-MM-DD` date, mapped to that whole day;
/// 3. the relative phrases `dün` (yesterday), `bugün` (today) and
///    `son gün` / `son 24 saat` / `son 1 gün` (the last day).
///
/// Returns `None` when nothing matches; callers apply
/// [`DateRange::last_week`] as the default at resolution time.
pub fn extract_date_range(message: &str, now: DateTime<Utc>) -> Option<DateRange> {
    if let Some(caps) = DATE_PAIR.captures(message) {
        if let (Some(start), Some(end)) = (parse_day(&caps, 1), parse_day(&caps, 4)) {
            return Some(DateRange::inclusive_days(start, end));
        }
    }

    if let Some(caps) = DATE_SINGLE.captures(message) {
        if let Some(day) = parse_day(&caps, 1) {
            return Some(DateRange::single_day(day));
        }
    }

    let norm = normalize(message);
    let today = now.date_naive();
    if norm.contains("bugun") {
        return Some(DateRange::single_day(today));
    }
    if norm.contains("dun")
        || norm.contains("son gun")
        || norm.contains("son 24 saat")
        || norm.contains("son 1 gun")
    {
        return Some(DateRange::single_day(today - chrono::Days::new(1)));
    }

    None
}

// ============================================================================
// Month pairs
// ============================================================================

static MONTH_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})").unwrap());

static MONTH_NAME_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(ocak|subat|mart|nisan|mayis|haziran|temmuz|agustos|eylul|ekim|kasim|aralik)\s+(\d{4})",
    )
    .unwrap()
});

/// Turkish month names (diacritic-folded) to month numbers.
static MONTH_MAP: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    HashMap::from([
        ("ocak", 1),
        ("subat", 2),
        ("mart", 3),
        ("nisan", 4),
        ("mayis", 5),
        ("haziran", 6),
        ("temmuz", 7),
        ("agustos", 8),
        ("eylul", 9),
        ("ekim", 10),
        ("kasim", 11),
        ("aralik", 12),
    ])
});

/// Recognizes a `(month1, month2)` pair of `YYYY-MM` values, in priority
/// order: two explicit `YYYY-MM` tokens left-to-right, two Turkish
/// month-name + year occurrences (`"ocak 2025"`), or the relative phrases
/// `bu ay` / `geçen ay` mapped to (previous month, current month) of `now`.
pub fn extract_month_pair(message: &str, now: DateTime<Utc>) -> Option<(String, String)> {
    let tokens: Vec<&str> = MONTH_TOKEN
        .find_iter(message)
        .map(|m| m.as_str())
        .collect();
    if tokens.len() >= 2 {
        return Some((tokens[0].to_string(), tokens[1].to_string()));
    }

    let norm = normalize(message);
    let names: Vec<(u32, i32)> = MONTH_NAME_YEAR
        .captures_iter(&norm)
        .filter_map(|caps| {
            let month = *MONTH_MAP.get(&caps[1])?;
            let year: i32 = caps[2].parse().ok()?;
            Some((month, year))
        })
        .collect();
    if names.len() >= 2 {
        let (m1, y1) = names[0];
        let (m2, y2) = names[1];
        return Some((format!("{y1:04}-{m1:02}"), format!("{y2:04}-{m2:02}")));
    }

    if norm.contains("bu ay") || norm.contains("gecen ay") {
        let this_month = now.format("%Y-%m").to_string();
        let prev = now
            .checked_sub_months(Months::new(1))
            .unwrap_or(now)
            .format("%Y-%m")
            .to_string();
        return Some((prev, this_month));
    }

    None
}

// ============================================================================
// Tenant-name candidates
// ============================================================================

static TENANT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-ZÇĞİÖŞÜ][^\n]{1,60})\b").unwrap());

/// Best-effort capture of a capitalized word run, used only as a
/// last-resort candidate for tenant disambiguation.
pub fn extract_tenant_name(message: &str) -> Option<String> {
    TENANT_NAME
        .captures(message)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 10, 30, 0).unwrap()
    }

    #[test]
    fn pollutant_priority_prefers_fine_particulates() {
        assert_eq!(extract_pollutant("pm10 ve PM2.5 analizi"), Some("PM2.5"));
        assert_eq!(extract_pollutant("PM25 nedir"), Some("PM2.5"));
        assert_eq!(extract_pollutant("no2 trendi"), Some("NO2"));
        assert_eq!(extract_pollutant("hava durumu"), None);
    }

    #[test]
    fn co_only_matches_as_standalone_word() {
        assert_eq!(extract_pollutant("CO seviyesi"), Some("CO"));
        // "CO" inside a longer word must not match
        assert_eq!(extract_pollutant("conta fiyatlari"), None);
    }

    #[test]
    fn pollutant_list_is_ordered_and_deduplicated() {
        let list = extract_pollutants("NO2 ile PM25 ve pm2.5, sonra PM10");
        assert_eq!(list, vec!["PM2.5", "PM10", "NO2"]);
    }

    #[test]
    fn db_parameter_map_is_total_and_idempotent() {
        assert_eq!(normalize_db_parameter("PM10"), "PM10-24h");
        assert_eq!(normalize_db_parameter("pm25"), "PM2.5-24h");
        assert_eq!(normalize_db_parameter("NO2"), "NO2-1h");
        assert_eq!(normalize_db_parameter("CO"), "CO-8h");
        for p in POLLUTANTS {
            let once = normalize_db_parameter(p);
            assert_eq!(normalize_db_parameter(&once), once);
        }
        assert_eq!(normalize_db_parameter("benzene"), "BENZENE");
    }

    #[test]
    fn explicit_date_pair_becomes_half_open_range() {
        let range =
            extract_date_range("2025-01-01 ile 2025-01-08 arası", fixed_now()).unwrap();
        assert_eq!(range.start.format("%Y-%m-%d").to_string(), "2025-01-01");
        assert_eq!(range.end.format("%Y-%m-%d").to_string(), "2025-01-09");
        assert_eq!(range.end - range.start, chrono::Duration::days(8));
    }

    #[test]
    fn single_date_is_one_day_range() {
        let range = extract_date_range("2025-02-10 verisi", fixed_now()).unwrap();
        assert_eq!(range.end - range.start, chrono::Duration::days(1));
    }

    #[test]
    fn relative_phrases_resolve_against_now() {
        let yesterday = extract_date_range("dün neler oldu", fixed_now()).unwrap();
        assert_eq!(yesterday.start.format("%Y-%m-%d").to_string(), "2025-03-14");
        let today = extract_date_range("bugün göster", fixed_now()).unwrap();
        assert_eq!(today.start.format("%Y-%m-%d").to_string(), "2025-03-15");
        let last = extract_date_range("son 24 saat", fixed_now()).unwrap();
        assert_eq!(last.start.format("%Y-%m-%d").to_string(), "2025-03-14");
    }

    #[test]
    fn no_date_signal_yields_none() {
        assert!(extract_date_range("pm10 durumu nasil", fixed_now()).is_none());
        let default = DateRange::last_week(fixed_now());
        assert_eq!(default.start.format("%Y-%m-%d").to_string(), "2025-03-08");
        assert_eq!(default.end.format("%Y-%m-%d").to_string(), "2025-03-16");
    }

    #[test]
    fn month_pair_from_explicit_tokens() {
        let pair = extract_month_pair("2025-01 ile 2025-02 karşılaştır", fixed_now()).unwrap();
        assert_eq!(pair, ("2025-01".to_string(), "2025-02".to_string()));
    }

    #[test]
    fn month_pair_from_turkish_month_names() {
        let pair = extract_month_pair("ocak 2025 ile şubat 2025 karşılaştır", fixed_now()).unwrap();
        assert_eq!(pair, ("2025-01".to_string(), "2025-02".to_string()));
    }

    #[test]
    fn month_pair_from_relative_phrase() {
        let pair = extract_month_pair("bu ay ile geçen ay farkı", fixed_now()).unwrap();
        assert_eq!(pair, ("2025-02".to_string(), "2025-03".to_string()));
    }

    #[test]
    fn month_pair_absent_yields_none() {
        assert!(extract_month_pair("pm10 analizi", fixed_now()).is_none());
    }

    #[test]
    fn tenant_name_captures_capitalized_run() {
        assert_eq!(
            extract_tenant_name("Akçansa için analiz").as_deref(),
            Some("Akçansa için analiz")
        );
        assert!(extract_tenant_name("küçük harfli mesaj").is_none());
    }
}
