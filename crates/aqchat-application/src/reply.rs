//! Reply text post-processing.
//!
//! Collaborators embed informational footers in their markdown output that
//! must not reach end users, and the retrieval-augmentation section is
//! dropped wholesale when it reports zero results. The patterns here are
//! fixed structural ones, not general formatting.

use once_cell::sync::Lazy;
use regex::Regex;

/// Heading under which related prior analyses are appended.
pub const RELATED_ANALYSES_HEADING: &str = "## İlgili önceki analizler (RAG)";

static SAVED_FOOTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\n*✅\s*\*\*Analiz\s+vector\s+database['’]?e\s+kaydedildi\*\*.*?(\n\n|$)")
        .unwrap()
});

static RAG_FOLLOWUP_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^Artık\s+RAG\s+ile\s+arama\s+yapabilirsiniz\.?\s*$").unwrap());

static TRIVIAL_SEARCH_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)(Bulunan\s+Sonuç\s*:\s*0|0\s+adet|bulunamadı)").unwrap()
});

static EMPTY_RAG_SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)##\s*İlgili\s+önceki\s+analizler\s*\(RAG\).*?(Bulunan\s+Sonuç\s*:\s*0|0\s+adet|bulunamadı)",
    )
    .unwrap()
});

static RAG_SECTION_TAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\n\n---\n\n##\s*İlgili\s+önceki\s+analizler\s*\(RAG\)\s*.*$").unwrap()
});

/// Strips collaborator-emitted informational blocks and drops a
/// zero-result related-analyses section, then trims whitespace.
pub fn clean_reply(text: &str) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }

    let mut out = SAVED_FOOTER.replace_all(text, "\n\n").into_owned();
    out = RAG_FOLLOWUP_LINE.replace_all(&out, "").into_owned();

    if EMPTY_RAG_SECTION.is_match(&out) {
        out = RAG_SECTION_TAIL.replace_all(&out, "").into_owned();
    }

    out.trim().to_string()
}

/// Appends a separated related-analyses section to the reply.
pub fn append_related_analyses(reply: &str, related: &str) -> String {
    format!("{reply}\n\n---\n\n{RELATED_ANALYSES_HEADING}\n\n{related}")
}

/// Whether a search result text is a formatted "nothing found" message
/// that should be treated as empty.
pub fn is_trivial_search_text(text: &str) -> bool {
    TRIVIAL_SEARCH_TEXT.is_match(text)
}

/// Caps the text at `budget` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, budget: usize) -> String {
    if text.chars().count() > budget {
        let cut: String = text.chars().take(budget).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

/// Formats a measurement value with at most two decimal places, `N/A`
/// when absent.
pub fn format_measurement(value: Option<f64>) -> String {
    match value {
        Some(v) => {
            let s = format!("{v:.2}");
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_saved_footer_block() {
        let text = "PM10 raporu hazır.\n\n✅ **Analiz vector database'e kaydedildi**\nid: 42\n\nDevamı";
        let cleaned = clean_reply(text);
        assert!(!cleaned.contains("kaydedildi"));
        assert!(cleaned.contains("PM10 raporu hazır."));
        assert!(cleaned.contains("Devamı"));
    }

    #[test]
    fn strips_rag_followup_line() {
        let text = "Analiz bitti.\nArtık RAG ile arama yapabilirsiniz.\nSon satır";
        let cleaned = clean_reply(text);
        assert!(!cleaned.contains("RAG ile arama"));
        assert!(cleaned.contains("Son satır"));
    }

    #[test]
    fn drops_zero_result_rag_section() {
        let reply = append_related_analyses("Ana cevap", "Bulunan Sonuç: 0");
        let cleaned = clean_reply(&reply);
        assert_eq!(cleaned, "Ana cevap");
    }

    #[test]
    fn keeps_populated_rag_section() {
        let reply = append_related_analyses("Ana cevap", "2025-01 PM10 analizi: ortalama 38");
        let cleaned = clean_reply(&reply);
        assert!(cleaned.contains(RELATED_ANALYSES_HEADING));
        assert!(cleaned.contains("ortalama 38"));
    }

    #[test]
    fn trivial_search_text_is_detected() {
        assert!(is_trivial_search_text("Bulunan Sonuç: 0"));
        assert!(is_trivial_search_text("kayıt bulunamadı"));
        assert!(is_trivial_search_text("0 adet analiz"));
        assert!(!is_trivial_search_text("3 analiz bulundu"));
    }

    #[test]
    fn truncation_adds_ellipsis_only_over_budget() {
        assert_eq!(truncate_chars("kısa", 10), "kısa");
        let long = "x".repeat(20);
        assert_eq!(truncate_chars(&long, 10), format!("{}...", "x".repeat(10)));
    }

    #[test]
    fn measurements_render_trimmed() {
        assert_eq!(format_measurement(Some(42.0)), "42");
        assert_eq!(format_measurement(Some(41.5)), "41.5");
        assert_eq!(format_measurement(Some(41.567)), "41.57");
        assert_eq!(format_measurement(None), "N/A");
    }
}
