//! Store-wide scan for Korean text left in translated content, and the
//! explicit repair that re-translates what the scan flagged.

use crate::content::{ContentId, ContentKind, PlanId, PlanTranslation, TextField};
use crate::i18n::{Language, TranslationValidator};
use crate::store::{ContentStore, ContentUpdate, StoreError};
use crate::translation::Translator;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// One field of one record that contains Korean text but should not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityFlag {
    pub kind: ContentKind,
    pub id: i64,
    pub language: Language,
    pub field: TextField,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QualityReport {
    pub tips_checked: usize,
    pub plans_checked: usize,
    pub flagged_tips: usize,
    pub flagged_plans: usize,
    pub flags: Vec<QualityFlag>,
}

impl QualityReport {
    pub fn is_clean(&self) -> bool {
        self.flags.is_empty()
    }

    fn push_if_leaking(
        &mut self,
        kind: ContentKind,
        id: i64,
        language: Language,
        field: TextField,
        text: &str,
    ) {
        if TranslationValidator::has_source_leakage(text, language) {
            self.flags.push(QualityFlag {
                kind,
                id,
                language,
                field,
            });
        }
    }
}

/// Scan every variant title/excerpt and every plan translation.
///
/// Read-only: nothing is modified.
pub async fn scan(store: &dyn ContentStore) -> Result<QualityReport, StoreError> {
    let mut report = QualityReport::default();

    let variants = store.list_translated_items().await?;
    report.tips_checked = variants.len();
    for item in &variants {
        report.push_if_leaking(
            ContentKind::Tip,
            item.id,
            item.language,
            TextField::Title,
            &item.title,
        );
        report.push_if_leaking(
            ContentKind::Tip,
            item.id,
            item.language,
            TextField::Excerpt,
            &item.excerpt,
        );
    }

    let total = store.count_active_plans().await?;
    let plans = store.list_active_plans(0, total).await?;
    report.plans_checked = plans.len();
    for plan in &plans {
        for (code, translation) in &plan.translations {
            let language = match Language::from_code(code) {
                Ok(language) => language,
                Err(e) => {
                    warn!("Plan {} has translation in unknown language: {}", plan.id, e);
                    continue;
                }
            };
            if let Some(description) = &translation.description {
                report.push_if_leaking(
                    ContentKind::Plan,
                    plan.id,
                    language,
                    TextField::Description,
                    description,
                );
            }
            if let Some(features) = &translation.features {
                report.push_if_leaking(
                    ContentKind::Plan,
                    plan.id,
                    language,
                    TextField::Features,
                    features,
                );
            }
        }
    }

    report.flagged_tips = distinct_ids(&report.flags, ContentKind::Tip);
    report.flagged_plans = distinct_ids(&report.flags, ContentKind::Plan);

    if report.is_clean() {
        info!(
            "✓ Quality scan clean ({} variants, {} plans)",
            report.tips_checked, report.plans_checked
        );
    } else {
        warn!(
            "Quality scan: {} flag(s) on {} variant(s) and {} plan(s)",
            report.flags.len(),
            report.flagged_tips,
            report.flagged_plans
        );
    }
    Ok(report)
}

fn distinct_ids(flags: &[QualityFlag], kind: ContentKind) -> usize {
    flags
        .iter()
        .filter(|f| f.kind == kind)
        .map(|f| f.id)
        .collect::<BTreeSet<_>>()
        .len()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairSummary {
    pub repaired: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl RepairSummary {
    fn fail(&mut self, message: String) {
        warn!("Repair failed: {}", message);
        self.failed += 1;
        self.errors.push(message);
    }
}

/// Re-translate only the flagged records, overwriting them in place.
///
/// A re-translation that still contains Korean is not saved.
pub async fn repair(
    store: &dyn ContentStore,
    translator: &dyn Translator,
    report: &QualityReport,
) -> Result<RepairSummary, StoreError> {
    let mut summary = RepairSummary::default();

    let mut tip_fields: BTreeMap<ContentId, Vec<TextField>> = BTreeMap::new();
    let mut plan_languages: Vec<(PlanId, Language)> = Vec::new();
    for flag in &report.flags {
        match flag.kind {
            ContentKind::Tip => tip_fields.entry(flag.id).or_default().push(flag.field),
            ContentKind::Plan => {
                if !plan_languages.contains(&(flag.id, flag.language)) {
                    plan_languages.push((flag.id, flag.language));
                }
            }
        }
    }

    for (id, fields) in tip_fields {
        match repair_tip(store, translator, id, &fields).await {
            Ok(()) => summary.repaired += 1,
            Err(message) => summary.fail(message),
        }
    }

    for (plan_id, language) in plan_languages {
        match repair_plan(store, translator, plan_id, language).await {
            Ok(()) => summary.repaired += 1,
            Err(message) => summary.fail(message),
        }
    }

    info!(
        "Quality repair: {} repaired, {} failed",
        summary.repaired, summary.failed
    );
    Ok(summary)
}

async fn repair_tip(
    store: &dyn ContentStore,
    translator: &dyn Translator,
    id: ContentId,
    fields: &[TextField],
) -> Result<(), String> {
    let variant = store
        .get_item(id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("tip {} no longer exists", id))?;
    let original_id = variant
        .original_id
        .ok_or_else(|| format!("tip {} is an original", id))?;
    let original = store
        .get_item(original_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| StoreError::MissingOriginal(original_id).to_string())?;

    let mut update = ContentUpdate::default();
    for field in fields {
        let source = match field {
            TextField::Title => &original.title,
            TextField::Excerpt => &original.excerpt,
            TextField::Body => &original.body,
            TextField::Description | TextField::Features => continue,
        };
        let translated = translator
            .translate(source, original.language, variant.language)
            .await
            .map_err(|e| format!("tip {} ({}): {}", id, variant.language, e))?;
        if TranslationValidator::has_source_leakage(&translated, variant.language) {
            return Err(format!(
                "tip {} ({}): re-translation still contains Korean",
                id, variant.language
            ));
        }
        match field {
            TextField::Title => update.title = Some(translated),
            TextField::Excerpt => update.excerpt = Some(translated),
            _ => update.body = Some(translated),
        }
    }

    if update.is_empty() {
        return Ok(());
    }
    store
        .update_item(id, update)
        .await
        .map_err(|e| e.to_string())?;
    info!("  ✓ Repaired tip {} ({})", variant.slug, variant.language);
    Ok(())
}

async fn repair_plan(
    store: &dyn ContentStore,
    translator: &dyn Translator,
    plan_id: PlanId,
    language: Language,
) -> Result<(), String> {
    let plan = store
        .get_plan(plan_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("plan {} no longer exists", plan_id))?;

    let source = Language::canonical();
    let description = translator
        .translate(&plan.description, source, language)
        .await
        .map_err(|e| format!("plan {} ({}): {}", plan.name, language, e))?;
    let features = translator
        .translate(&plan.features, source, language)
        .await
        .map_err(|e| format!("plan {} ({}): {}", plan.name, language, e))?;

    if TranslationValidator::has_source_leakage(&description, language)
        || TranslationValidator::has_source_leakage(&features, language)
    {
        return Err(format!(
            "plan {} ({}): re-translation still contains Korean",
            plan.name, language
        ));
    }

    store
        .save_plan_translation(
            plan_id,
            language,
            PlanTranslation {
                description: Some(description),
                features: Some(features),
            },
        )
        .await
        .map_err(|e| e.to_string())?;
    info!("  ✓ Repaired plan {} ({})", plan.name, language);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentItem;
    use crate::store::test_support::{original, plan};
    use crate::store::MemoryStore;
    use crate::translation::test_support::FakeTranslator;

    async fn seed_variant(
        store: &MemoryStore,
        slug: &str,
        language: Language,
        title: &str,
        excerpt: &str,
    ) -> (ContentItem, ContentItem) {
        let source = store
            .insert_item(original(slug, "유심 구매 가이드"))
            .await
            .expect("insert");
        let mut variant = original(&format!("{}-{}", slug, language), title);
        variant.language = language;
        variant.excerpt = excerpt.to_string();
        variant.original_id = Some(source.id);
        let variant = store.insert_item(variant).await.expect("insert");
        (source, variant)
    }

    fn plan_translation(description: &str) -> PlanTranslation {
        PlanTranslation {
            description: Some(description.to_string()),
            features: Some("5G".to_string()),
        }
    }

    // ==================== Scan Tests ====================

    #[tokio::test]
    async fn test_scan_flags_korean_in_title() {
        let store = MemoryStore::new();
        let (_, variant) =
            seed_variant(&store, "a", Language::THAI, "유심 guide", "คู่มือซิม").await;

        let report = scan(&store).await.expect("scan");

        assert_eq!(report.tips_checked, 1);
        assert_eq!(
            report.flags,
            vec![QualityFlag {
                kind: ContentKind::Tip,
                id: variant.id,
                language: Language::THAI,
                field: TextField::Title,
            }]
        );
        assert_eq!(report.flagged_tips, 1);
    }

    #[tokio::test]
    async fn test_scan_ignores_empty_and_clean_text() {
        let store = MemoryStore::new();
        seed_variant(&store, "a", Language::ENGLISH, "SIM guide", "   ").await;

        let report = scan(&store).await.expect("scan");
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_scan_ignores_originals() {
        let store = MemoryStore::new();
        store
            .insert_item(original("a", "유심"))
            .await
            .expect("insert");

        let report = scan(&store).await.expect("scan");
        assert_eq!(report.tips_checked, 0);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_scan_flags_plan_translations() {
        let store = MemoryStore::new();
        store
            .replace_all_plans(vec![plan("A"), plan("B")])
            .await
            .expect("seed");
        store
            .save_plan_translation(1, Language::ENGLISH, plan_translation("Unlimited data"))
            .await
            .expect("save");
        store
            .save_plan_translation(2, Language::VIETNAMESE, plan_translation("무제한 dữ liệu"))
            .await
            .expect("save");

        let report = scan(&store).await.expect("scan");

        assert_eq!(report.plans_checked, 2);
        assert_eq!(report.flags.len(), 1);
        assert_eq!(report.flags[0].id, 2);
        assert_eq!(report.flags[0].field, TextField::Description);
        assert_eq!(report.flagged_plans, 1);
    }

    #[tokio::test]
    async fn test_scan_does_not_write() {
        let store = MemoryStore::new();
        seed_variant(&store, "a", Language::ENGLISH, "유심", "요약").await;
        let writes = store.write_count().await;

        scan(&store).await.expect("scan");
        assert_eq!(store.write_count().await, writes);
    }

    // ==================== Repair Tests ====================

    #[tokio::test]
    async fn test_repair_overwrites_flagged_fields_in_place() {
        let store = MemoryStore::new();
        let (_, variant) =
            seed_variant(&store, "a", Language::ENGLISH, "유심 guide", "Summary").await;
        let translator = FakeTranslator::new();

        let report = scan(&store).await.expect("scan");
        let summary = repair(&store, &translator, &report).await.expect("repair");

        assert_eq!(summary.repaired, 1);
        assert_eq!(summary.failed, 0);
        // Only the flagged title was re-translated
        assert_eq!(translator.calls(), 1);

        let repaired = store.get_item(variant.id).await.expect("get").expect("exists");
        assert_eq!(repaired.slug, variant.slug);
        assert_eq!(repaired.excerpt, "Summary");
        assert!(!TranslationValidator::has_source_leakage(
            &repaired.title,
            Language::ENGLISH
        ));
        assert!(scan(&store).await.expect("rescan").is_clean());
    }

    #[tokio::test]
    async fn test_repair_plans() {
        let store = MemoryStore::new();
        store.replace_all_plans(vec![plan("A")]).await.expect("seed");
        store
            .save_plan_translation(1, Language::THAI, plan_translation("무제한"))
            .await
            .expect("save");

        let report = scan(&store).await.expect("scan");
        let summary = repair(&store, &FakeTranslator::new(), &report)
            .await
            .expect("repair");

        assert_eq!(summary.repaired, 1);
        assert!(scan(&store).await.expect("rescan").is_clean());
    }

    #[tokio::test]
    async fn test_repair_keeps_item_when_translation_still_leaks() {
        let store = MemoryStore::new();
        let (_, variant) = seed_variant(&store, "a", Language::ENGLISH, "유심", "Summary").await;

        let report = scan(&store).await.expect("scan");
        let summary = repair(&store, &FakeTranslator::echoing(), &report)
            .await
            .expect("repair");

        assert_eq!(summary.repaired, 0);
        assert_eq!(summary.failed, 1);
        assert!(summary.errors[0].contains("still contains Korean"));
        let unchanged = store.get_item(variant.id).await.expect("get").expect("exists");
        assert_eq!(unchanged.title, "유심");
    }

    #[tokio::test]
    async fn test_repair_records_gateway_failure() {
        let store = MemoryStore::new();
        seed_variant(&store, "a", Language::VIETNAMESE, "유심", "Tóm tắt").await;

        let report = scan(&store).await.expect("scan");
        let summary = repair(
            &store,
            &FakeTranslator::failing_for(&[Language::VIETNAMESE]),
            &report,
        )
        .await
        .expect("repair");

        assert_eq!(summary.failed, 1);
        assert!(summary.errors[0].contains("503"));
    }
}
