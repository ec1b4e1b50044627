//! Language type: Flexible, validated language representation.

use crate::i18n::{LanguageConfig, LanguageRegistry, Script};
use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A validated language.
///
/// Only codes present and enabled in the registry can be turned into a
/// `Language`, so holding one is proof that the code is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Language {
    /// ISO 639-1 language code (e.g., "ko", "en")
    code: &'static str,
}

impl Language {
    pub const KOREAN: Language = Language { code: "ko" };
    pub const ENGLISH: Language = Language { code: "en" };
    pub const VIETNAMESE: Language = Language { code: "vi" };
    pub const THAI: Language = Language { code: "th" };

    /// Create a Language from a language code string.
    ///
    /// # Returns
    /// * `Ok(Language)` if the code is valid and the language is enabled
    /// * `Err` if the code is not found or the language is disabled
    pub fn from_code(code: &str) -> Result<Language> {
        let registry = LanguageRegistry::get();

        match registry.get_by_code(code) {
            Some(config) if config.enabled => Ok(Language { code: config.code }),
            Some(_) => bail!("Language '{}' is not enabled", code),
            None => bail!("Unknown language code: '{}'", code),
        }
    }

    /// Get the canonical (source) language.
    ///
    /// All originals are authored in this language and every translation is
    /// derived from it.
    pub fn canonical() -> Language {
        let config = LanguageRegistry::get().canonical();
        Language { code: config.code }
    }

    /// All enabled translation targets, in declared order.
    pub fn targets() -> Vec<Language> {
        LanguageRegistry::get()
            .list_enabled()
            .into_iter()
            .filter(|config| !config.is_canonical)
            .map(|config| Language { code: config.code })
            .collect()
    }

    /// Get the ISO 639-1 language code.
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the full language configuration from the registry.
    ///
    /// # Panics
    /// Panics if the language code is not found in the registry. This cannot
    /// happen for a Language constructed via `from_code` or the constants.
    pub fn config(&self) -> &'static LanguageConfig {
        LanguageRegistry::get()
            .get_by_code(self.code)
            .expect("Language code should always be valid")
    }

    /// Get the English name of the language.
    pub fn name(&self) -> &'static str {
        self.config().name
    }

    /// Get the native name of the language.
    pub fn native_name(&self) -> &'static str {
        self.config().native_name
    }

    /// Script the language is written in.
    pub fn script(&self) -> Script {
        self.config().script
    }

    /// Check if this is the canonical language.
    pub fn is_canonical(&self) -> bool {
        self.config().is_canonical
    }

    /// Position in the registry's declared order.
    pub fn order(&self) -> usize {
        LanguageRegistry::get().position(self.code)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

impl Serialize for Language {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code)
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Language::from_code(&code).map_err(serde::de::Error::custom)
    }
}

/// Parse a comma-separated list of language codes.
///
/// The result is de-duplicated, sorted into declared order, and never
/// contains the canonical language.
pub fn parse_language_list(list: &str) -> Result<Vec<Language>> {
    let mut languages = Vec::new();

    for code in list.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        let language = Language::from_code(code)?;
        if language.is_canonical() {
            bail!("Canonical language '{}' cannot be a translation target", code);
        }
        if !languages.contains(&language) {
            languages.push(language);
        }
    }

    languages.sort_by_key(Language::order);
    Ok(languages)
}
