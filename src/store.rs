//! Content Store: the storage collaborator the pipeline reads from and writes to.
//!
//! `ContentStore` is implemented by the PostgreSQL `Database` in production and
//! by `MemoryStore` for tests and dry runs.

use crate::content::{
    ContentId, ContentItem, NewContentItem, NewPlan, PlanDescription, PlanId, PlanTranslation,
    TranslationGroup,
};
use crate::i18n::Language;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("original {original_id} already has a {language} variant")]
    DuplicateVariant {
        original_id: ContentId,
        language: Language,
    },

    #[error("slug '{slug}' already exists for language {language}")]
    SlugCollision { language: Language, slug: String },

    #[error("variant points at missing original {0}")]
    MissingOriginal(ContentId),

    #[error("invalid data: {0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Partial update of a tip; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentUpdate {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub body: Option<String>,
    pub thumbnail: Option<Option<String>>,
}

impl ContentUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.excerpt.is_none()
            && self.body.is_none()
            && self.thumbnail.is_none()
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    // ==================== Tips ====================

    /// Number of originals (items without `original_id`).
    async fn count_originals(&self) -> Result<usize, StoreError>;

    /// Originals, newest first (`created_at` desc, then id desc).
    async fn list_originals(&self, skip: usize, limit: usize)
        -> Result<Vec<ContentItem>, StoreError>;

    async fn get_item(&self, id: ContentId) -> Result<Option<ContentItem>, StoreError>;

    /// Variants pointing at `original_id`.
    async fn list_variants(&self, original_id: ContentId) -> Result<Vec<ContentItem>, StoreError>;

    /// Every item whose language is not the canonical one.
    async fn list_translated_items(&self) -> Result<Vec<ContentItem>, StoreError>;

    /// Published items in `language`.
    async fn list_published(&self, language: Language) -> Result<Vec<ContentItem>, StoreError>;

    async fn find_by_slug(
        &self,
        language: Language,
        slug: &str,
    ) -> Result<Option<ContentItem>, StoreError>;

    /// Insert a tip. Rejects slug collisions and duplicate variants.
    async fn insert_item(&self, item: NewContentItem) -> Result<ContentItem, StoreError>;

    async fn update_item(
        &self,
        id: ContentId,
        update: ContentUpdate,
    ) -> Result<ContentItem, StoreError>;

    // ==================== Plans ====================

    async fn count_active_plans(&self) -> Result<usize, StoreError>;

    /// Active plans ordered by id, with their translations.
    async fn list_active_plans(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<PlanDescription>, StoreError>;

    async fn get_plan(&self, id: PlanId) -> Result<Option<PlanDescription>, StoreError>;

    /// Insert or overwrite the `language` translation of a plan.
    async fn save_plan_translation(
        &self,
        plan_id: PlanId,
        language: Language,
        translation: PlanTranslation,
    ) -> Result<(), StoreError>;

    /// Clear every translation of every active plan. Returns rows cleared.
    async fn reset_plan_translations(&self) -> Result<usize, StoreError>;

    /// Atomically replace all plans. Nothing changes if any plan is rejected.
    async fn replace_all_plans(&self, plans: Vec<NewPlan>) -> Result<usize, StoreError>;
}

/// Load the translation group rooted at `original`.
pub async fn load_group(
    store: &dyn ContentStore,
    original: ContentItem,
) -> Result<TranslationGroup, StoreError> {
    let variants = store.list_variants(original.id).await?;
    Ok(TranslationGroup::new(original, variants))
}

/// Load every original with its variants, newest original first.
pub async fn load_all_groups(store: &dyn ContentStore) -> Result<Vec<TranslationGroup>, StoreError> {
    let total = store.count_originals().await?;
    let originals = store.list_originals(0, total).await?;

    let mut groups = Vec::with_capacity(originals.len());
    for original in originals {
        groups.push(load_group(store, original).await?);
    }
    Ok(groups)
}

pub(crate) fn validate_plan(plan: &NewPlan) -> Result<(), StoreError> {
    if plan.name.trim().is_empty() {
        return Err(StoreError::Invalid("plan name is empty".to_string()));
    }
    if plan.carrier.trim().is_empty() {
        return Err(StoreError::Invalid(format!(
            "plan '{}' has no carrier",
            plan.name
        )));
    }
    Ok(())
}

// ==================== In-memory store ====================

#[derive(Debug, Default)]
struct MemoryState {
    items: Vec<ContentItem>,
    plans: Vec<PlanDescription>,
    next_item_id: ContentId,
    next_plan_id: PlanId,
    writes: usize,
}

/// In-memory `ContentStore` with the same integrity rules as the database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful write operations so far.
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }

    /// Set the view counter of an item.
    pub async fn set_view_count(&self, id: ContentId, views: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let item = state
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(StoreError::NotFound { kind: "item", id })?;
        item.view_count = views;
        Ok(())
    }

    /// Snapshot of every stored item.
    pub async fn all_items(&self) -> Vec<ContentItem> {
        self.state.lock().await.items.clone()
    }
}

fn newest_first(a: &ContentItem, b: &ContentItem) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn count_originals(&self) -> Result<usize, StoreError> {
        let state = self.state.lock().await;
        Ok(state.items.iter().filter(|i| i.is_original()).count())
    }

    async fn list_originals(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<ContentItem>, StoreError> {
        let state = self.state.lock().await;
        let mut originals: Vec<ContentItem> = state
            .items
            .iter()
            .filter(|i| i.is_original())
            .cloned()
            .collect();
        originals.sort_by(newest_first);
        Ok(originals.into_iter().skip(skip).take(limit).collect())
    }

    async fn get_item(&self, id: ContentId) -> Result<Option<ContentItem>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.items.iter().find(|i| i.id == id).cloned())
    }

    async fn list_variants(&self, original_id: ContentId) -> Result<Vec<ContentItem>, StoreError> {
        let state = self.state.lock().await;
        let mut variants: Vec<ContentItem> = state
            .items
            .iter()
            .filter(|i| i.original_id == Some(original_id))
            .cloned()
            .collect();
        variants.sort_by_key(|v| v.language.order());
        Ok(variants)
    }

    async fn list_translated_items(&self) -> Result<Vec<ContentItem>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .iter()
            .filter(|i| !i.language.is_canonical())
            .cloned()
            .collect())
    }

    async fn list_published(&self, language: Language) -> Result<Vec<ContentItem>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .iter()
            .filter(|i| i.language == language && i.is_published)
            .cloned()
            .collect())
    }

    async fn find_by_slug(
        &self,
        language: Language,
        slug: &str,
    ) -> Result<Option<ContentItem>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .iter()
            .find(|i| i.language == language && i.slug == slug)
            .cloned())
    }

    async fn insert_item(&self, item: NewContentItem) -> Result<ContentItem, StoreError> {
        let mut state = self.state.lock().await;

        if state
            .items
            .iter()
            .any(|i| i.language == item.language && i.slug == item.slug)
        {
            return Err(StoreError::SlugCollision {
                language: item.language,
                slug: item.slug,
            });
        }

        if let Some(original_id) = item.original_id {
            let original_exists = state
                .items
                .iter()
                .any(|i| i.id == original_id && i.is_original());
            if !original_exists {
                return Err(StoreError::MissingOriginal(original_id));
            }
            if state
                .items
                .iter()
                .any(|i| i.original_id == Some(original_id) && i.language == item.language)
            {
                return Err(StoreError::DuplicateVariant {
                    original_id,
                    language: item.language,
                });
            }
        }

        state.next_item_id += 1;
        let now = Utc::now();
        let stored = ContentItem {
            id: state.next_item_id,
            slug: item.slug,
            language: item.language,
            title: item.title,
            body: item.body,
            excerpt: item.excerpt,
            thumbnail: item.thumbnail,
            category: item.category,
            seo_title: item.seo_title,
            seo_description: item.seo_description,
            is_published: item.is_published,
            view_count: 0,
            created_at: now,
            updated_at: now,
            original_id: item.original_id,
        };
        state.items.push(stored.clone());
        state.writes += 1;
        Ok(stored)
    }

    async fn update_item(
        &self,
        id: ContentId,
        update: ContentUpdate,
    ) -> Result<ContentItem, StoreError> {
        let mut state = self.state.lock().await;
        let item = state
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(StoreError::NotFound { kind: "item", id })?;

        if let Some(title) = update.title {
            item.title = title;
        }
        if let Some(excerpt) = update.excerpt {
            item.excerpt = excerpt;
        }
        if let Some(body) = update.body {
            item.body = body;
        }
        if let Some(thumbnail) = update.thumbnail {
            item.thumbnail = thumbnail;
        }
        item.updated_at = Utc::now();

        let updated = item.clone();
        state.writes += 1;
        Ok(updated)
    }

    async fn count_active_plans(&self) -> Result<usize, StoreError> {
        let state = self.state.lock().await;
        Ok(state.plans.iter().filter(|p| p.is_active).count())
    }

    async fn list_active_plans(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<PlanDescription>, StoreError> {
        let state = self.state.lock().await;
        let mut plans: Vec<PlanDescription> =
            state.plans.iter().filter(|p| p.is_active).cloned().collect();
        plans.sort_by_key(|p| p.id);
        Ok(plans.into_iter().skip(skip).take(limit).collect())
    }

    async fn get_plan(&self, id: PlanId) -> Result<Option<PlanDescription>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.plans.iter().find(|p| p.id == id).cloned())
    }

    async fn save_plan_translation(
        &self,
        plan_id: PlanId,
        language: Language,
        translation: PlanTranslation,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let plan = state
            .plans
            .iter_mut()
            .find(|p| p.id == plan_id)
            .ok_or(StoreError::NotFound {
                kind: "plan",
                id: plan_id,
            })?;
        plan.translations
            .insert(language.code().to_string(), translation);
        state.writes += 1;
        Ok(())
    }

    async fn reset_plan_translations(&self) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let mut cleared = 0;
        for plan in state.plans.iter_mut().filter(|p| p.is_active) {
            cleared += plan.translations.len();
            plan.translations.clear();
        }
        state.writes += 1;
        Ok(cleared)
    }

    async fn replace_all_plans(&self, plans: Vec<NewPlan>) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;

        for plan in &plans {
            validate_plan(plan)?;
        }

        let mut next_id = state.next_plan_id;
        let now = Utc::now();
        let replacement: Vec<PlanDescription> = plans
            .into_iter()
            .map(|plan| {
                next_id += 1;
                PlanDescription {
                    id: next_id,
                    name: plan.name,
                    carrier: plan.carrier,
                    description: plan.description,
                    features: plan.features,
                    is_active: plan.is_active,
                    created_at: now,
                    translations: BTreeMap::new(),
                }
            })
            .collect();

        let count = replacement.len();
        state.plans = replacement;
        state.next_plan_id = next_id;
        state.writes += 1;
        Ok(count)
    }
}
