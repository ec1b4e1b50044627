//! Content model: tips with their language variants, and SIM plans with
//! per-language descriptions.

use crate::i18n::Language;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ContentId = i64;
pub type PlanId = i64;

/// A tip (blog post) in one language.
///
/// `original_id == None` marks the Korean original; variants point at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub slug: String,
    pub language: Language,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub thumbnail: Option<String>,
    pub category: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub is_published: bool,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub original_id: Option<ContentId>,
}

impl ContentItem {
    pub fn is_original(&self) -> bool {
        self.original_id.is_none()
    }
}

/// Insert payload for a tip; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContentItem {
    pub slug: String,
    pub language: Language,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub thumbnail: Option<String>,
    pub category: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub is_published: bool,
    pub original_id: Option<ContentId>,
}

impl NewContentItem {
    /// Build a variant of `original` in `language` from translated text.
    ///
    /// Non-text attributes (category, thumbnail, SEO metadata, publication
    /// flag) are copied from the original.
    pub fn variant_of(original: &ContentItem, language: Language, text: TranslatedText) -> Self {
        Self {
            slug: variant_slug(&original.slug, language),
            language,
            title: text.title,
            body: text.body,
            excerpt: text.excerpt,
            thumbnail: original.thumbnail.clone(),
            category: original.category.clone(),
            seo_title: original.seo_title.clone(),
            seo_description: original.seo_description.clone(),
            is_published: original.is_published,
            original_id: Some(original.id),
        }
    }
}

/// Slug of the `language` variant of an original with `slug`.
pub fn variant_slug(slug: &str, language: Language) -> String {
    format!("{}-{}", slug, language.code())
}

/// The three translated text fields of a tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedText {
    pub title: String,
    pub excerpt: String,
    pub body: String,
}

/// Which text field a check or repair refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    Title,
    Excerpt,
    Body,
    Description,
    Features,
}

/// What kind of record a report entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Tip,
    Plan,
}

/// An original plus every variant pointing at it.
#[derive(Debug, Clone)]
pub struct TranslationGroup {
    pub original: ContentItem,
    pub variants: Vec<ContentItem>,
}

impl TranslationGroup {
    pub fn new(original: ContentItem, variants: Vec<ContentItem>) -> Self {
        Self { original, variants }
    }

    pub fn has_language(&self, language: Language) -> bool {
        self.original.language == language || self.variants.iter().any(|v| v.language == language)
    }

    /// Required languages the group lacks, in the order given.
    pub fn missing_languages(&self, required: &[Language]) -> Vec<Language> {
        required
            .iter()
            .copied()
            .filter(|lang| !self.has_language(*lang))
            .collect()
    }

    pub fn is_complete(&self, required: &[Language]) -> bool {
        self.missing_languages(required).is_empty()
    }
}

/// A SIM plan with its Korean description and the per-language translations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanDescription {
    pub id: PlanId,
    pub name: String,
    pub carrier: String,
    pub description: String,
    pub features: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub translations: BTreeMap<String, PlanTranslation>,
}

/// Translated description and features of one plan in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTranslation {
    pub description: Option<String>,
    pub features: Option<String>,
}

impl PlanDescription {
    pub fn translation(&self, language: Language) -> Option<&PlanTranslation> {
        self.translations.get(language.code())
    }

    /// True if `language` has a non-empty description, or has a stored row
    /// and the Korean description itself is blank.
    pub fn has_translation(&self, language: Language) -> bool {
        let Some(translation) = self.translation(language) else {
            return false;
        };
        self.description.trim().is_empty()
            || translation
                .description
                .as_deref()
                .is_some_and(|d| !d.trim().is_empty())
    }

    /// Targets without a translated description, in the order given.
    pub fn missing_languages(&self, required: &[Language]) -> Vec<Language> {
        required
            .iter()
            .copied()
            .filter(|lang| !self.has_translation(*lang))
            .collect()
    }

    /// Legacy wide-row view: `description_<lang>` / `features_<lang>` columns.
    ///
    /// Every registered target language gets both keys; absent translations
    /// are `None`.
    pub fn wide_projection(&self) -> BTreeMap<String, Option<String>> {
        let mut columns = BTreeMap::new();
        columns.insert("description".to_string(), Some(self.description.clone()));
        columns.insert("features".to_string(), Some(self.features.clone()));

        for language in Language::targets() {
            let translation = self.translation(language);
            columns.insert(
                format!("description_{}", language.code()),
                translation.and_then(|t| t.description.clone()),
            );
            columns.insert(
                format!("features_{}", language.code()),
                translation.and_then(|t| t.features.clone()),
            );
        }

        columns
    }
}

/// Insert payload for a plan (used by bulk replacement).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewPlan {
    pub name: String,
    pub carrier: String,
    pub description: String,
    pub features: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}
