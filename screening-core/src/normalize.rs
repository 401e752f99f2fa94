//! Name canonicalization shared by list ingestion and roster queries.

use unicode_normalization::UnicodeNormalization;

/// Canonical form of a free-text name.
///
/// Compatibility decomposition (NFKD) splits accented letters into a base
/// letter plus combining marks; everything outside ASCII is then dropped, so
/// `Petrović` folds to `petrovic`. `đ` has no decomposition and is mapped to
/// `d` explicitly. The result is lowercased, hyphens become spaces, and
/// surrounding whitespace is trimmed.
///
/// `normalize(normalize(x)) == normalize(x)` for every input.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfkd()
        .map(fold_stroke)
        .filter(char::is_ascii)
        .collect();

    folded.to_lowercase().replace('-', " ").trim().to_string()
}

/// [`normalize`] for optional fields; a missing value is the empty string.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}

// Letters with a stroke are atomic in Unicode and would otherwise vanish.
fn fold_stroke(c: char) -> char {
    match c {
        'đ' => 'd',
        'Đ' => 'D',
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_diacritics() {
        assert_eq!(normalize("Petrović"), "petrovic");
        assert_eq!(normalize("ŠIMIĆ Željko"), "simic zeljko");
        assert_eq!(normalize("Čačić"), "cacic");
        assert_eq!(normalize("Đurđević"), "durdevic");
    }

    #[test]
    fn test_hyphen_and_trim() {
        assert_eq!(normalize("  Jean-Pierre "), "jean pierre");
        assert_eq!(normalize("-Ana-"), "ana");
    }

    #[test]
    fn test_non_latin_folds_away() {
        assert_eq!(normalize("Иван"), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_missing_is_empty() {
        assert_eq!(normalize_opt(None), "");
        assert_eq!(normalize_opt(Some("Ivan")), "ivan");
    }

    #[test]
    fn test_idempotent_on_samples() {
        for sample in ["Müller-Lüdenscheidt", " - ", "O'Brien", "ﬁlip", "Ǆemal"] {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "sample: {sample}");
        }
    }
}
