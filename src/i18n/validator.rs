//! Translation quality validation module.
//!
//! Checks translated content for signs that the external translation service
//! failed: Korean source text leaking into a non-Korean variant, the target
//! script never appearing, implausible length changes, and links that were
//! dropped or invented along the way.

use crate::i18n::script::{self, Script};
use crate::i18n::Language;
use regex::Regex;
use std::sync::OnceLock;

/// Translations shorter than this fraction of the source are suspicious.
const MIN_LENGTH_RATIO: f64 = 0.2;
/// Translations longer than this multiple of the source are suspicious.
const MAX_LENGTH_RATIO: f64 = 5.0;
/// Below this many characters the length ratio says nothing useful.
const MIN_CHARS_FOR_RATIO: usize = 20;

/// Validation report containing errors and warnings about a translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Critical errors that indicate translation failure
    pub errors: Vec<String>,

    /// Non-critical warnings about potential issues
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Create a new empty validation report
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Check if the report has any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Check if the report is clean (no errors or warnings)
    pub fn is_clean(&self) -> bool {
        !self.has_errors() && !self.has_warnings()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Validator for translation quality.
pub struct TranslationValidator;

static URL_REGEX: OnceLock<Regex> = OnceLock::new();
static HREF_REGEX: OnceLock<Regex> = OnceLock::new();

impl TranslationValidator {
    /// True when `text` declared as `language` contains Korean source text.
    ///
    /// Empty and whitespace-only text is never flagged, and Korean content is
    /// allowed to contain Hangul.
    pub fn has_source_leakage(text: &str, language: Language) -> bool {
        if text.trim().is_empty() || language.is_canonical() {
            return false;
        }
        script::contains_hangul(text)
    }

    /// Validate a fresh translation against its source text.
    ///
    /// Source leakage is an error; everything else is a warning:
    /// - the target script never appears (non-Latin targets only)
    /// - the length ratio falls outside 0.2x–5x of the source
    /// - URLs or `href` attributes were lost or added
    pub fn validate(source: &str, translated: &str, target: Language) -> ValidationReport {
        let mut report = ValidationReport::new();

        if translated.trim().is_empty() {
            if !source.trim().is_empty() {
                report
                    .errors
                    .push("Translation is empty but source is not".to_string());
            }
            return report;
        }

        if Self::has_source_leakage(translated, target) {
            report.errors.push(format!(
                "Korean text found in {} translation",
                target.name()
            ));
        }

        let expected = target.script();
        if expected != Script::Latin && !script::contains_script(translated, expected) {
            report.warnings.push(format!(
                "No {:?} characters found in {} translation",
                expected,
                target.name()
            ));
        }

        let source_len = source.chars().count();
        let translated_len = translated.chars().count();
        if source_len >= MIN_CHARS_FOR_RATIO {
            let ratio = translated_len as f64 / source_len as f64;
            if !(MIN_LENGTH_RATIO..=MAX_LENGTH_RATIO).contains(&ratio) {
                report.warnings.push(format!(
                    "Length anomaly: source has {} chars, translation has {} (ratio {:.2})",
                    source_len, translated_len, ratio
                ));
            }
        }

        let orig_urls = Self::extract_urls(source);
        let trans_urls = Self::extract_urls(translated);
        if orig_urls != trans_urls {
            report.warnings.push(format!(
                "URL mismatch: original has {} URLs, translation has {} URLs",
                orig_urls.len(),
                trans_urls.len()
            ));
        }

        let orig_hrefs = Self::extract_hrefs(source);
        let trans_hrefs = Self::extract_hrefs(translated);
        if orig_hrefs != trans_hrefs {
            report.warnings.push(format!(
                "Link mismatch: original has {:?}, translation has {:?}",
                orig_hrefs, trans_hrefs
            ));
        }

        report
    }

    /// Extract all absolute URLs from text
    fn extract_urls(text: &str) -> Vec<String> {
        let regex =
            URL_REGEX.get_or_init(|| Regex::new(r#"https?://[^\s)\]"'<>]+"#).unwrap());

        regex
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Extract `href` targets from HTML
    fn extract_hrefs(text: &str) -> Vec<String> {
        let regex =
            HREF_REGEX.get_or_init(|| Regex::new(r#"href\s*=\s*["']([^"']*)["']"#).unwrap());

        regex
            .captures_iter(text)
            .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ==================== Leakage Tests ====================

    #[test]
    fn test_leakage_in_english() {
        assert!(TranslationValidator::has_source_leakage(
            "SIM 유심 guide",
            Language::ENGLISH
        ));
    }

    #[test]
    fn test_no_leakage_in_korean() {
        assert!(!TranslationValidator::has_source_leakage(
            "유심 구매 가이드",
            Language::KOREAN
        ));
    }

    #[test]
    fn test_whitespace_is_never_flagged() {
        assert!(!TranslationValidator::has_source_leakage("", Language::ENGLISH));
        assert!(!TranslationValidator::has_source_leakage("  \n\t", Language::THAI));
    }

    // ==================== Extraction Tests ====================

    #[test]
    fn test_extract_urls() {
        let text = r#"See <a href="https://example.com/plan">plan</a> and http://test.org"#;
        let urls = TranslationValidator::extract_urls(text);
        assert_eq!(urls, vec!["https://example.com/plan", "http://test.org"]);
    }

    #[test]
    fn test_extract_hrefs() {
        let text = r#"<a href="/tips/esim-guide">a</a> <a href='/tips/prepaid'>b</a>"#;
        let hrefs = TranslationValidator::extract_hrefs(text);
        assert_eq!(hrefs, vec!["/tips/esim-guide", "/tips/prepaid"]);
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_validate_clean_translation() {
        let source = r#"<p>유심 구매 가이드 <a href="/tips/esim">eSIM</a></p>"#;
        let translated = r#"<p>SIM purchase guide <a href="/tips/esim">eSIM</a></p>"#;

        let report = TranslationValidator::validate(source, translated, Language::ENGLISH);
        assert!(report.is_clean(), "{:?}", report);
    }

    #[test]
    fn test_validate_untranslated_text_is_error() {
        let source = "유심 구매 가이드";
        let report = TranslationValidator::validate(source, source, Language::ENGLISH);
        assert!(report.has_errors());
        assert!(report.errors[0].contains("Korean text"));
    }

    #[test]
    fn test_validate_missing_target_script_is_warning() {
        let report = TranslationValidator::validate(
            "유심 구매 가이드",
            "SIM purchase guide",
            Language::THAI,
        );
        assert!(!report.has_errors());
        assert!(report.warnings.iter().any(|w| w.contains("Thai")));
    }

    #[test]
    fn test_validate_length_anomaly() {
        let source = "외국인을 위한 선불 유심 요금제를 비교하고 가장 저렴한 요금제를 찾아보세요";
        let report = TranslationValidator::validate(source, "SIM", Language::ENGLISH);
        assert!(report.warnings.iter().any(|w| w.contains("Length anomaly")));
    }

    #[test]
    fn test_validate_short_text_skips_ratio() {
        let report = TranslationValidator::validate("유심", "SIM card", Language::ENGLISH);
        assert!(report.is_clean());
    }

    #[test]
    fn test_validate_dropped_link() {
        let source = r#"<a href="/tips/esim">eSIM 안내</a>"#;
        let report =
            TranslationValidator::validate(source, "eSIM guide", Language::ENGLISH);
        assert!(report.warnings.iter().any(|w| w.contains("Link mismatch")));
    }

    #[test]
    fn test_validate_empty_translation_of_nonempty_source() {
        let report = TranslationValidator::validate("유심", "  ", Language::ENGLISH);
        assert!(report.has_errors());
    }

    #[test]
    fn test_validate_empty_both() {
        let report = TranslationValidator::validate("", "", Language::ENGLISH);
        assert!(report.is_clean());
    }

    #[test]
    fn test_validation_report_with_warning() {
        let mut report = ValidationReport::new();
        report.warnings.push("Test warning".to_string());

        assert!(!report.is_clean());
        assert!(!report.has_errors());
        assert!(report.has_warnings());
    }

    // ==================== Property Tests ====================

    proptest! {
        #[test]
        fn prop_latin_text_never_leaks(text in "[a-zA-Z0-9 .,!?-]{0,80}") {
            prop_assert!(!TranslationValidator::has_source_leakage(&text, Language::ENGLISH));
        }

        #[test]
        fn prop_embedded_hangul_always_leaks(
            prefix in "[a-zA-Z ]{0,30}",
            korean in "[가-힣]{1,10}",
            suffix in "[a-zA-Z ]{0,30}",
        ) {
            let text = format!("{}{}{}", prefix, korean, suffix);
            prop_assert!(TranslationValidator::has_source_leakage(&text, Language::VIETNAMESE));
        }

        #[test]
        fn prop_korean_variant_never_flagged(text in "[가-힣a-z ]{0,40}") {
            prop_assert!(!TranslationValidator::has_source_leakage(&text, Language::KOREAN));
        }
    }
}
