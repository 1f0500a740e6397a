//! Diacritic-folding and normalization helpers shared by all parsers.
//!
//! Keyword and phrase matching must tolerate Turkish diacritics, so every
//! pattern check runs over [`normalize`]d text. Verbatim values (pollutant
//! tokens, date digits) are always extracted from the raw message instead.

/// Folds the Turkish diacritics `ı ğ ü ş ö ç` (and their uppercase forms)
/// to their ASCII base letters. Digits, punctuation, and word boundaries
/// are left untouched.
pub fn fold_diacritics(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'ı' | 'İ' => 'i',
            'ğ' | 'Ğ' => 'g',
            'ü' | 'Ü' => 'u',
            'ş' | 'Ş' => 's',
            'ö' | 'Ö' => 'o',
            'ç' | 'Ç' => 'c',
            _ => c,
        })
        .collect()
}

/// Diacritic fold plus lowercasing, for case/diacritic-insensitive
/// pattern matching. Idempotent.
pub fn normalize(text: &str) -> String {
    fold_diacritics(text).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_turkish_diacritics() {
        assert_eq!(fold_diacritics("karşılaştır"), "karsilastir");
        assert_eq!(fold_diacritics("Büyükşehir"), "Buyuksehir");
        assert_eq!(fold_diacritics("Akçansa"), "Akcansa");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("Dağılım ANALİZİ 2025-01-01");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn leaves_digits_and_punctuation_alone() {
        assert_eq!(normalize("2025-01-01 .. 2025-01-08"), "2025-01-01 .. 2025-01-08");
    }
}
