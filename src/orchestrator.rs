//! Translation Orchestrator: fills in missing language variants of tips and
//! missing per-language descriptions of plans.

use crate::content::{
    ContentId, ContentItem, ContentKind, NewContentItem, PlanDescription, PlanTranslation,
    TranslatedText,
};
use crate::i18n::{Language, TranslationMetrics};
use crate::store::{load_group, ContentStore, StoreError};
use crate::translation::{TranslationError, Translator};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A language that could not be produced for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageFailure {
    pub language: Language,
    pub error: String,
}

/// What happened to one original (or plan) during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Every required language already existed; nothing was written.
    AlreadyComplete,
    Translated {
        created: Vec<Language>,
        failed: Vec<LanguageFailure>,
    },
}

impl ItemOutcome {
    pub fn created(&self) -> &[Language] {
        match self {
            ItemOutcome::AlreadyComplete => &[],
            ItemOutcome::Translated { created, .. } => created,
        }
    }

    pub fn failed(&self) -> &[LanguageFailure] {
        match self {
            ItemOutcome::AlreadyComplete => &[],
            ItemOutcome::Translated { failed, .. } => failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub kind: ContentKind,
    pub id: i64,
    /// Slug for tips, name for plans
    pub label: String,
    pub outcome: ItemOutcome,
}

/// Result of one batch over originals or plans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    /// Items in this batch
    pub batch: usize,
    /// Items covered so far, this batch included
    pub processed: usize,
    pub total: usize,
    pub remaining: usize,
    pub has_more: bool,
    pub next_skip: usize,
    /// Languages stored in this batch
    pub translated: usize,
    /// Languages that failed in this batch
    pub failed: usize,
    pub items: Vec<ItemReport>,
    pub errors: Vec<String>,
}

impl BatchProgress {
    fn new(skip: usize, batch: usize, total: usize) -> Self {
        let processed = skip + batch;
        Self {
            batch,
            processed,
            total,
            remaining: total.saturating_sub(processed),
            has_more: processed < total,
            next_skip: processed,
            translated: 0,
            failed: 0,
            items: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn record(&mut self, report: ItemReport) {
        self.translated += report.outcome.created().len();
        self.failed += report.outcome.failed().len();
        for failure in report.outcome.failed() {
            self.errors.push(format!(
                "{} ({}): {}",
                report.label, failure.language, failure.error
            ));
        }
        self.items.push(report);
    }

    /// An item that could not be processed at all.
    fn record_error(&mut self, label: &str, error: &StoreError) {
        self.failed += 1;
        self.errors.push(format!("{}: {}", label, error));
    }
}

/// Totals of a full pass over every original.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub originals: usize,
    pub variants_created: usize,
    pub already_complete: usize,
    pub failures: Vec<(ContentId, LanguageFailure)>,
    /// Originals whose group could not be loaded
    pub item_errors: Vec<(ContentId, String)>,
}

impl RunSummary {
    pub fn failure_count(&self) -> usize {
        self.failures.len() + self.item_errors.len()
    }
}

pub struct Orchestrator {
    store: Arc<dyn ContentStore>,
    translator: Arc<dyn Translator>,
    languages: Vec<Language>,
}

impl Orchestrator {
    /// `languages` are the required target languages, in declared order.
    pub fn new(
        store: Arc<dyn ContentStore>,
        translator: Arc<dyn Translator>,
        languages: Vec<Language>,
    ) -> Self {
        let mut languages: Vec<Language> = languages
            .into_iter()
            .filter(|lang| !lang.is_canonical())
            .collect();
        languages.sort_by_key(|lang| lang.order());
        languages.dedup();

        Self {
            store,
            translator,
            languages,
        }
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    // ==================== Tips ====================

    /// Create every missing variant of `original`.
    ///
    /// A language whose translation or insert fails is recorded and the
    /// remaining languages are still attempted.
    pub async fn translate_original(
        &self,
        original: &ContentItem,
    ) -> Result<ItemOutcome, StoreError> {
        if !original.is_original() {
            return Err(StoreError::Invalid(format!(
                "item {} is a variant, not an original",
                original.id
            )));
        }

        let group = load_group(self.store.as_ref(), original.clone()).await?;

        if group.is_complete(&self.languages) {
            debug!("'{}': all translations exist", original.slug);
            TranslationMetrics::global().record_group_complete();
            return Ok(ItemOutcome::AlreadyComplete);
        }

        let missing = group.missing_languages(&self.languages);
        info!(
            "'{}': translating into {} language(s)",
            original.slug,
            missing.len()
        );

        let mut created = Vec::new();
        let mut failed = Vec::new();

        for language in missing {
            match self.create_variant(original, language).await {
                Ok(variant) => {
                    info!("  ✓ {} → {}", language.code(), variant.slug);
                    TranslationMetrics::global().record_translation_saved();
                    created.push(language);
                }
                Err(error) => {
                    warn!("  ✗ {} for '{}': {}", language.code(), original.slug, error);
                    failed.push(LanguageFailure {
                        language,
                        error: error.to_string(),
                    });
                }
            }
        }

        Ok(ItemOutcome::Translated { created, failed })
    }

    async fn create_variant(
        &self,
        original: &ContentItem,
        language: Language,
    ) -> Result<ContentItem, VariantError> {
        let text = self.translate_text(original, language).await?;
        let variant = NewContentItem::variant_of(original, language, text);
        Ok(self.store.insert_item(variant).await?)
    }

    /// Title, excerpt and body are translated by three separate calls.
    async fn translate_text(
        &self,
        original: &ContentItem,
        language: Language,
    ) -> Result<TranslatedText, TranslationError> {
        let source = original.language;
        let title = self
            .translator
            .translate(&original.title, source, language)
            .await?;
        let excerpt = self
            .translator
            .translate(&original.excerpt, source, language)
            .await?;
        let body = self
            .translator
            .translate(&original.body, source, language)
            .await?;

        Ok(TranslatedText {
            title,
            excerpt,
            body,
        })
    }

    /// Process `batch_size` originals starting at `skip`, newest first.
    pub async fn run_batch(
        &self,
        skip: usize,
        batch_size: usize,
    ) -> Result<BatchProgress, StoreError> {
        let total = self.store.count_originals().await?;
        let originals = self.store.list_originals(skip, batch_size).await?;

        let mut progress = BatchProgress::new(skip, originals.len(), total);
        info!(
            "Tip batch: {} original(s) at offset {} of {}",
            progress.batch, skip, total
        );

        for original in originals {
            match self.translate_original(&original).await {
                Ok(outcome) => progress.record(ItemReport {
                    kind: ContentKind::Tip,
                    id: original.id,
                    label: original.slug,
                    outcome,
                }),
                Err(error) => {
                    warn!("✗ '{}' skipped: {}", original.slug, error);
                    progress.record_error(&original.slug, &error);
                }
            }
        }

        info!(
            "Tip batch done: {} stored, {} failed, {}/{} processed",
            progress.translated, progress.failed, progress.processed, progress.total
        );
        Ok(progress)
    }

    /// Process every original.
    pub async fn run_all(&self) -> Result<RunSummary, StoreError> {
        let total = self.store.count_originals().await?;
        let originals = self.store.list_originals(0, total).await?;

        let mut summary = RunSummary {
            originals: originals.len(),
            ..RunSummary::default()
        };

        for original in originals {
            match self.translate_original(&original).await {
                Ok(ItemOutcome::AlreadyComplete) => summary.already_complete += 1,
                Ok(ItemOutcome::Translated { created, failed }) => {
                    summary.variants_created += created.len();
                    summary
                        .failures
                        .extend(failed.into_iter().map(|f| (original.id, f)));
                }
                Err(error) => {
                    warn!("✗ '{}' skipped: {}", original.slug, error);
                    summary.item_errors.push((original.id, error.to_string()));
                }
            }
        }

        info!(
            "✓ Translation run complete: {} originals, {} variants created, {} already complete, {} failures",
            summary.originals,
            summary.variants_created,
            summary.already_complete,
            summary.failure_count()
        );
        Ok(summary)
    }

    // ==================== Plans ====================

    /// Fill in missing translations of one plan.
    ///
    /// A language whose translation or save fails is recorded and the
    /// remaining languages are still attempted.
    pub async fn translate_plan(&self, plan: &PlanDescription) -> ItemOutcome {
        let missing = plan.missing_languages(&self.languages);
        if missing.is_empty() {
            return ItemOutcome::AlreadyComplete;
        }

        let mut created = Vec::new();
        let mut failed = Vec::new();

        for language in missing {
            match self.create_plan_translation(plan, language).await {
                Ok(()) => {
                    TranslationMetrics::global().record_translation_saved();
                    created.push(language);
                }
                Err(error) => {
                    warn!("  ✗ {} for plan '{}': {}", language.code(), plan.name, error);
                    failed.push(LanguageFailure {
                        language,
                        error: error.to_string(),
                    });
                }
            }
        }

        ItemOutcome::Translated { created, failed }
    }

    async fn create_plan_translation(
        &self,
        plan: &PlanDescription,
        language: Language,
    ) -> Result<(), VariantError> {
        let translation = self.translate_plan_text(plan, language).await?;
        Ok(self
            .store
            .save_plan_translation(plan.id, language, translation)
            .await?)
    }

    async fn translate_plan_text(
        &self,
        plan: &PlanDescription,
        language: Language,
    ) -> Result<PlanTranslation, TranslationError> {
        let source = Language::canonical();
        let description = self
            .translator
            .translate(&plan.description, source, language)
            .await?;
        let features = self
            .translator
            .translate(&plan.features, source, language)
            .await?;

        Ok(PlanTranslation {
            description: Some(description),
            features: Some(features),
        })
    }

    /// Process `batch_size` active plans starting at `skip`, by id.
    pub async fn translate_plans_batch(
        &self,
        skip: usize,
        batch_size: usize,
    ) -> Result<BatchProgress, StoreError> {
        let total = self.store.count_active_plans().await?;
        let plans = self.store.list_active_plans(skip, batch_size).await?;

        let mut progress = BatchProgress::new(skip, plans.len(), total);
        info!(
            "Plan batch: {} plan(s) at offset {} of {}",
            progress.batch, skip, total
        );

        for plan in plans {
            let outcome = self.translate_plan(&plan).await;
            progress.record(ItemReport {
                kind: ContentKind::Plan,
                id: plan.id,
                label: plan.name,
                outcome,
            });
        }

        info!(
            "Plan batch done: {} stored, {} failed, {}/{} processed",
            progress.translated, progress.failed, progress.processed, progress.total
        );
        Ok(progress)
    }
}

#[derive(Debug, thiserror::Error)]
enum VariantError {
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
