//! Intent classification for incoming messages.
//!
//! Two passes are combined: a deterministic heuristic pass that always
//! runs, and an optional secondary pass behind [`SecondaryClassifier`]
//! whose non-`Unknown` verdict overrides the heuristic. A guardrail runs
//! last: a generic "hava kalitesi" question without a named pollutant is a
//! multi-pollutant summary request, never a single-series query.

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::Result;
use crate::extract::{
    DateRange, extract_date_range, extract_month_pair, extract_pollutant, has_pollutant_token,
    normalize_pollutant_token,
};
use crate::text::normalize;

/// The finite label set for a classified turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
pub enum IntentKind {
    /// Not an air-quality question we can route.
    #[default]
    Unknown,
    /// Single-pollutant aggregate query.
    AirQualityQuery,
    /// Multi-pollutant statistical/long-form analysis.
    StatisticalAnalysis,
    /// Month-over-month comparison.
    ComparisonAnalysis,
}

/// Ephemeral per-turn detection output; its fields feed session/context
/// updates but are never persisted directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntentDetection {
    pub intent: IntentKind,
    pub tenant_slug: Option<String>,
    pub pollutant: Option<String>,
    pub date_range: Option<DateRange>,
    pub month_pair: Option<(String, String)>,
}

static COMPARISON_KEYWORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(karsilastir|kiyasla|kiyas|fark)\b").unwrap());

static ANALYSIS_KEYWORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(analiz|istatistik|trend|dagilim)\b").unwrap());

/// Deterministic heuristic pass over the normalized message text.
pub fn heuristic_intent(message: &str) -> IntentKind {
    let norm = normalize(message);

    if COMPARISON_KEYWORDS.is_match(&norm) {
        return IntentKind::ComparisonAnalysis;
    }
    if ANALYSIS_KEYWORDS.is_match(&norm) {
        return IntentKind::StatisticalAnalysis;
    }
    if has_pollutant_token(message) {
        return IntentKind::AirQualityQuery;
    }
    IntentKind::Unknown
}

/// Merges the optional secondary verdict into the heuristic one.
///
/// A secondary `Unknown` (or an absent/failed secondary pass) never
/// downgrades a heuristic result.
pub fn combine_intents(heuristic: IntentKind, secondary: Option<IntentKind>) -> IntentKind {
    match secondary {
        Some(verdict) if verdict != IntentKind::Unknown => verdict,
        _ => heuristic,
    }
}

/// Guardrail override, applied after both passes.
///
/// A message carrying a generic air-quality phrase without any pollutant
/// token is forced to `StatisticalAnalysis`, whatever the passes chose.
pub fn apply_guardrail(intent: IntentKind, message: &str) -> IntentKind {
    let norm = normalize(message);
    let generic = norm.contains("hava kalitesi") || norm.contains("hava kalitesini");
    if generic && !has_pollutant_token(message) {
        IntentKind::StatisticalAnalysis
    } else {
        intent
    }
}

/// An independent classifier that may refine the heuristic verdict.
///
/// The pass is best-effort: the orchestrator bounds it with a timeout and
/// swallows every failure, so implementations are free to call out to
/// slower backends.
#[async_trait]
pub trait SecondaryClassifier: Send + Sync {
    async fn detect(
        &self,
        message: &str,
        domain: Option<&str>,
        tenant_slug: Option<&str>,
    ) -> Result<IntentDetection>;
}

/// The in-tree secondary classifier: the same fixed pattern rules as the
/// heuristic pass plus full slot extraction, so callers get pollutant,
/// date-range, and month-pair candidates in one detection result.
#[derive(Debug, Default)]
pub struct RuleBasedClassifier;

#[async_trait]
impl SecondaryClassifier for RuleBasedClassifier {
    async fn detect(
        &self,
        message: &str,
        _domain: Option<&str>,
        tenant_slug: Option<&str>,
    ) -> Result<IntentDetection> {
        let message = message.trim();
        let now = Utc::now();

        Ok(IntentDetection {
            intent: heuristic_intent(message),
            tenant_slug: tenant_slug.map(str::to_string),
            pollutant: extract_pollutant(message).map(normalize_pollutant_token),
            date_range: extract_date_range(message, now),
            month_pair: extract_month_pair(message, now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_keywords_win_over_pollutants() {
        assert_eq!(
            heuristic_intent("akcansa ocak 2025 ile şubat 2025 karşılaştır"),
            IntentKind::ComparisonAnalysis
        );
        assert_eq!(
            heuristic_intent("PM10 ile PM2.5 kıyasla"),
            IntentKind::ComparisonAnalysis
        );
    }

    #[test]
    fn analysis_keywords_beat_bare_pollutants() {
        assert_eq!(
            heuristic_intent("akcansa için PM10 istatistik ver"),
            IntentKind::StatisticalAnalysis
        );
        assert_eq!(heuristic_intent("dağılım raporu"), IntentKind::StatisticalAnalysis);
    }

    #[test]
    fn inflected_keywords_do_not_match_word_boundaries() {
        // "analizi" is not the bare keyword "analiz", so the pollutant rule wins.
        assert_eq!(
            heuristic_intent("akcansa için 2025-01-01 ile 2025-01-08 arası PM10 analizi"),
            IntentKind::AirQualityQuery
        );
    }

    #[test]
    fn bare_pollutant_is_air_quality_query() {
        assert_eq!(heuristic_intent("pm10 kaç"), IntentKind::AirQualityQuery);
        assert_eq!(heuristic_intent("selam"), IntentKind::Unknown);
    }

    #[test]
    fn secondary_unknown_never_downgrades() {
        assert_eq!(
            combine_intents(IntentKind::AirQualityQuery, Some(IntentKind::Unknown)),
            IntentKind::AirQualityQuery
        );
        assert_eq!(
            combine_intents(IntentKind::AirQualityQuery, None),
            IntentKind::AirQualityQuery
        );
        assert_eq!(
            combine_intents(IntentKind::Unknown, Some(IntentKind::ComparisonAnalysis)),
            IntentKind::ComparisonAnalysis
        );
    }

    #[test]
    fn guardrail_forces_statistical_without_pollutant() {
        assert_eq!(
            apply_guardrail(IntentKind::AirQualityQuery, "son gün hava kalitesini göster"),
            IntentKind::StatisticalAnalysis
        );
        // An explicit comparison is also overridden; the guardrail runs last.
        assert_eq!(
            apply_guardrail(IntentKind::ComparisonAnalysis, "hava kalitesi karşılaştır"),
            IntentKind::StatisticalAnalysis
        );
    }

    #[test]
    fn guardrail_leaves_pollutant_queries_alone() {
        assert_eq!(
            apply_guardrail(IntentKind::AirQualityQuery, "hava kalitesi PM10 göster"),
            IntentKind::AirQualityQuery
        );
        assert_eq!(
            apply_guardrail(IntentKind::AirQualityQuery, "pm10 göster"),
            IntentKind::AirQualityQuery
        );
    }

    #[tokio::test]
    async fn rule_based_classifier_fills_slots() {
        let detection = RuleBasedClassifier
            .detect(
                "akcansa için 2025-01-01 ile 2025-01-08 arası PM10 analizi",
                None,
                Some("akcansa"),
            )
            .await
            .unwrap();
        assert_eq!(detection.intent, IntentKind::AirQualityQuery);
        assert_eq!(detection.pollutant.as_deref(), Some("PM10"));
        let range = detection.date_range.unwrap();
        assert_eq!(range.end - range.start, chrono::Duration::days(8));
        assert_eq!(detection.tenant_slug.as_deref(), Some("akcansa"));
    }

    #[tokio::test]
    async fn rule_based_classifier_detects_comparison_months() {
        let detection = RuleBasedClassifier
            .detect("akcansa ocak 2025 ile şubat 2025 karşılaştır", None, None)
            .await
            .unwrap();
        assert_eq!(detection.intent, IntentKind::ComparisonAnalysis);
        assert_eq!(
            detection.month_pair,
            Some(("2025-01".to_string(), "2025-02".to_string()))
        );
    }
}
