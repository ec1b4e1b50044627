//! Language registry: Single source of truth for all supported languages.
//!
//! The site publishes every piece of content in twelve languages. Korean is
//! the canonical authoring language; the other eleven are translation targets.
//! The order of `default_languages()` is the declared processing order used by
//! the orchestrator when filling in missing translations.

use crate::i18n::script::Script;
use crate::i18n::strings::{self, LanguageStrings};
use std::sync::OnceLock;

/// Configuration for a supported language.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// ISO 639-1 language code (e.g., "ko", "en", "vi")
    pub code: &'static str,

    /// English name of the language (e.g., "Korean", "Vietnamese")
    pub name: &'static str,

    /// Native name of the language (e.g., "한국어", "Tiếng Việt")
    pub native_name: &'static str,

    /// Writing system the language is expected to appear in
    pub script: Script,

    /// Whether this is the canonical/source language (only one should be true)
    pub is_canonical: bool,

    /// Whether this language is enabled for use
    pub enabled: bool,

    /// Localized strings used in generated content sections
    pub strings: LanguageStrings,
}

/// Global language registry singleton.
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

/// Global registry instance (initialized lazily)
static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Get the global language registry instance.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: default_languages(),
        })
    }

    /// Get a language configuration by its code.
    ///
    /// # Returns
    /// * `Some(&LanguageConfig)` if the language exists
    /// * `None` if the language is not found
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// Get all enabled languages, in declared order.
    pub fn list_enabled(&self) -> Vec<&LanguageConfig> {
        self.languages.iter().filter(|lang| lang.enabled).collect()
    }

    /// Get all languages (including disabled ones), in declared order.
    pub fn list_all(&self) -> Vec<&LanguageConfig> {
        self.languages.iter().collect()
    }

    /// Position of a language in the declared order.
    ///
    /// Unknown codes sort after every registered language.
    pub fn position(&self, code: &str) -> usize {
        self.languages
            .iter()
            .position(|lang| lang.code == code)
            .unwrap_or(usize::MAX)
    }

    /// Get the canonical language configuration.
    ///
    /// # Panics
    /// Panics if no canonical language is found or if multiple canonical
    /// languages are defined (this indicates a configuration error).
    pub fn canonical(&self) -> &LanguageConfig {
        let canonical_langs: Vec<_> = self
            .languages
            .iter()
            .filter(|lang| lang.is_canonical)
            .collect();

        match canonical_langs.len() {
            0 => panic!("No canonical language found in registry"),
            1 => canonical_langs[0],
            _ => panic!("Multiple canonical languages found in registry"),
        }
    }

    /// Check if a language code is supported and enabled.
    pub fn is_enabled(&self, code: &str) -> bool {
        self.get_by_code(code)
            .map(|lang| lang.enabled)
            .unwrap_or(false)
    }
}

fn language(
    code: &'static str,
    name: &'static str,
    native_name: &'static str,
    script: Script,
    strings: LanguageStrings,
) -> LanguageConfig {
    LanguageConfig {
        code,
        name,
        native_name,
        script,
        is_canonical: false,
        enabled: true,
        strings,
    }
}

/// Default language configurations, in declared processing order.
fn default_languages() -> Vec<LanguageConfig> {
    vec![
        LanguageConfig {
            is_canonical: true,
            ..language("ko", "Korean", "한국어", Script::Hangul, strings::KOREAN_STRINGS)
        },
        language("en", "English", "English", Script::Latin, strings::ENGLISH_STRINGS),
        language("zh", "Chinese", "中文", Script::Cjk, strings::CHINESE_STRINGS),
        language("ja", "Japanese", "日本語", Script::Cjk, strings::JAPANESE_STRINGS),
        language("vi", "Vietnamese", "Tiếng Việt", Script::Latin, strings::VIETNAMESE_STRINGS),
        language("th", "Thai", "ไทย", Script::Thai, strings::THAI_STRINGS),
        language("ru", "Russian", "Русский", Script::Cyrillic, strings::RUSSIAN_STRINGS),
        language("mn", "Mongolian", "Монгол", Script::Cyrillic, strings::MONGOLIAN_STRINGS),
        language("uz", "Uzbek", "Oʻzbekcha", Script::Latin, strings::UZBEK_STRINGS),
        language("ne", "Nepali", "नेपाली", Script::Devanagari, strings::NEPALI_STRINGS),
        language("my", "Burmese", "မြန်မာ", Script::Burmese, strings::BURMESE_STRINGS),
        language("id", "Indonesian", "Bahasa Indonesia", Script::Latin, strings::INDONESIAN_STRINGS),
    ]
}
