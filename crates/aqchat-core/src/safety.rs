//! Response safety filter.
//!
//! Tenant-aware topic restriction and tone softening applied to final
//! reply text. Two tiers: a small global restricted-topic set replaces the
//! whole reply with a fixed refusal, and per-tenant rules remove offending
//! lines and soften alarmist vocabulary. The filter never errors;
//! unmatched input passes through unchanged.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Globally forbidden topic phrases; matching any of them replaces the
/// entire reply.
static GLOBAL_RESTRICTED_TOPICS: [&str; 6] = [
    "çevre aktivizmi",
    "environmental activism",
    "politik",
    "political",
    "protesto",
    "protest",
];

/// Per-tenant restriction configuration.
#[derive(Debug, Clone)]
pub struct TenantPolicy {
    pub restricted_topics: &'static [&'static str],
    pub tone_guidelines: &'static str,
    pub max_severity: &'static str,
}

static TENANT_RULES: Lazy<HashMap<&'static str, TenantPolicy>> = Lazy::new(|| {
    HashMap::from([
        (
            "akcansa",
            TenantPolicy {
                restricted_topics: &["çevre", "environment", "emisyon azaltma önerileri"],
                tone_guidelines: "Sertlikte konuşmamak, profesyonel ve objektif olmak",
                max_severity: "info",
            },
        ),
        (
            "tupras",
            TenantPolicy {
                restricted_topics: &["rafineri operasyonları", "refinery operations"],
                tone_guidelines: "Teknik ve objektif, spekülasyon yapmamak",
                max_severity: "info",
            },
        ),
    ])
});

static HARSH_TONE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\b(tehlikeli|dangerous|kritik|critical|alarm|acil|emergency|felaket|disaster)\b")
            .unwrap(),
        Regex::new(r"!!+").unwrap(),
        Regex::new(r"\b(ÇOK YÜKSEK|VERY HIGH|EXTREMELY|SON DERECE)\b").unwrap(),
    ]
});

static SOFTER_SYNONYMS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)\btehlikeli\b").unwrap(), "yüksek"),
        (Regex::new(r"(?i)\bdangerous\b").unwrap(), "elevated"),
        (Regex::new(r"(?i)\bkritik\b").unwrap(), "dikkat edilmesi gereken"),
        (Regex::new(r"(?i)\bcritical\b").unwrap(), "notable"),
        (Regex::new(r"(?i)\balarm\b").unwrap(), "bilgi"),
        (Regex::new(r"(?i)\bacil\b").unwrap(), "önemli"),
        (Regex::new(r"(?i)\bemergency\b").unwrap(), "important"),
    ]
});

static EXCLAMATION_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"!!+").unwrap());

static ALL_CAPS_EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(ÇOK YÜKSEK|VERY HIGH|EXTREMELY|SON DERECE)\b").unwrap());

const GLOBAL_REFUSAL: &str = "Üzgünüm, sadece hava kalitesi ölçüm verileri ve analizleri \
hakkında bilgi verebilirim. Lütfen hava kalitesi ile ilgili teknik sorular sorun.";

const FILTERED_FALLBACK: &str = "Hava kalitesi verileri analiz edildi. Detaylı bilgi için \
lütfen spesifik bir parametre belirtin (örn: PM10, PM2.5, NO2).";

/// Tenant-aware reply restriction and tone softening.
#[derive(Debug, Default)]
pub struct ResponseSafetyFilter;

impl ResponseSafetyFilter {
    pub fn new() -> Self {
        Self
    }

    /// Validates and, where necessary, rewrites the final reply text.
    ///
    /// Topic filtering and tone softening are independent; both may apply
    /// to the same reply. The user message is accepted for parity with the
    /// audit surface but plays no role in the current rules.
    pub fn validate(&self, reply: &str, tenant_slug: Option<&str>, _user_message: &str) -> String {
        if reply.trim().is_empty() {
            return reply.to_string();
        }

        if contains_global_restricted(reply) {
            tracing::warn!("reply contains globally restricted content, replacing");
            return GLOBAL_REFUSAL.to_string();
        }

        let Some(rules) = tenant_slug.and_then(|slug| TENANT_RULES.get(slug)) else {
            return reply.to_string();
        };

        let mut out = reply.to_string();
        if contains_any_topic(&out, rules.restricted_topics) {
            tracing::warn!(tenant = tenant_slug, "reply contains tenant-restricted topics, filtering");
            out = filter_restricted_lines(&out, rules.restricted_topics);
        }
        if has_harsh_tone(&out) {
            tracing::warn!(tenant = tenant_slug, "reply has harsh tone, softening");
            out = soften_tone(&out);
        }
        out
    }

    /// The same two checks as [`validate`](Self::validate), without
    /// mutating the text; for policy/audit use by callers.
    pub fn should_restrict(&self, reply: &str, tenant_slug: Option<&str>) -> bool {
        if reply.trim().is_empty() {
            return false;
        }
        if contains_global_restricted(reply) {
            return true;
        }
        let Some(rules) = tenant_slug.and_then(|slug| TENANT_RULES.get(slug)) else {
            return false;
        };
        contains_any_topic(reply, rules.restricted_topics) || has_harsh_tone(reply)
    }
}

fn contains_global_restricted(text: &str) -> bool {
    contains_any_topic(text, &GLOBAL_RESTRICTED_TOPICS)
}

fn contains_any_topic(text: &str, topics: &[&str]) -> bool {
    let lower = text.to_lowercase();
    topics.iter().any(|topic| lower.contains(&topic.to_lowercase()))
}

/// Removes lines containing restricted topics. If that eliminates more
/// than two-thirds of the original text, returns the fixed fallback
/// instead of a mutilated reply.
fn filter_restricted_lines(text: &str, topics: &[&str]) -> String {
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            !topics.iter().any(|topic| lower.contains(&topic.to_lowercase()))
        })
        .collect();

    let result = kept.join("\n").trim().to_string();
    if result.len() < text.len() / 3 {
        FILTERED_FALLBACK.to_string()
    } else {
        result
    }
}

fn has_harsh_tone(text: &str) -> bool {
    HARSH_TONE_PATTERNS.iter().any(|pattern| pattern.is_match(text))
}

fn soften_tone(text: &str) -> String {
    let mut softened = text.to_string();
    for (pattern, replacement) in SOFTER_SYNONYMS.iter() {
        softened = pattern.replace_all(&softened, *replacement).into_owned();
    }
    softened = EXCLAMATION_RUN.replace_all(&softened, ".").into_owned();
    softened = ALL_CAPS_EMPHASIS
        .replace_all(&softened, |caps: &regex::Captures<'_>| {
            let m = &caps[0];
            let mut chars = m.chars();
            match chars.next() {
                Some(first) => first.to_string() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .into_owned();
    softened
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> ResponseSafetyFilter {
        ResponseSafetyFilter::new()
    }

    #[test]
    fn global_restriction_replaces_whole_reply() {
        let reply = "PM10 yüksek. Protesto çağrısı yapılıyor.";
        let out = filter().validate(reply, Some("akcansa"), "pm10");
        assert_eq!(out, GLOBAL_REFUSAL);
        assert!(filter().should_restrict(reply, None));
    }

    #[test]
    fn tenant_restricted_lines_are_removed() {
        let reply = "PM10 ortalaması 42 µg/m³ ölçüldü ve sınır değerin altında kaldı.\n\
                     Çevre yatırımları hakkında öneriler sunulabilir.\n\
                     Ölçüm sayısı 168 olarak kaydedildi ve veriler tam görünüyor.";
        let out = filter().validate(reply, Some("akcansa"), "pm10");
        assert!(!out.to_lowercase().contains("çevre"));
        assert!(out.contains("PM10 ortalaması 42"));
        assert!(out.contains("Ölçüm sayısı 168"));
    }

    #[test]
    fn over_filtered_reply_becomes_fallback() {
        let reply = "çevre etkisi büyük\nçevre raporu hazır\nOK";
        let out = filter().validate(reply, Some("akcansa"), "pm10");
        assert_eq!(out, FILTERED_FALLBACK);
    }

    #[test]
    fn harsh_tone_is_softened() {
        let reply = "PM10 tehlikeli seviyede!! Durum ÇOK YÜKSEK";
        let out = filter().validate(reply, Some("akcansa"), "pm10");
        assert!(out.contains("yüksek seviyede."));
        assert!(!out.contains("!!"));
        assert!(out.contains("Çok yüksek"));
    }

    #[test]
    fn unmatched_reply_passes_through() {
        let reply = "PM10 ortalaması 42 µg/m³.";
        assert_eq!(filter().validate(reply, Some("akcansa"), "pm10"), reply);
        assert_eq!(filter().validate(reply, None, "pm10"), reply);
        assert!(!filter().should_restrict(reply, Some("akcansa")));
    }

    #[test]
    fn tone_check_applies_only_with_tenant_rules() {
        let reply = "Durum kritik!!";
        // No tenant policy: passes through untouched.
        assert_eq!(filter().validate(reply, Some("bilinmeyen"), "x"), reply);
        assert!(filter().should_restrict(reply, Some("tupras")));
    }
}
