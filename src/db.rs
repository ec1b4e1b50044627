use crate::content::{
    ContentId, ContentItem, NewContentItem, NewPlan, PlanDescription, PlanId, PlanTranslation,
};
use crate::i18n::Language;
use crate::retry::{with_retry, RetryConfig};
use crate::store::{validate_plan, ContentStore, ContentUpdate, StoreError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

const TIP_COLUMNS: &str = "id, slug, language, title, body, excerpt, thumbnail, category, \
     seo_title, seo_description, is_published, view_count, created_at, updated_at, original_id";

const SLUG_CONSTRAINT: &str = "tips_language_slug_key";
const VARIANT_CONSTRAINT: &str = "tips_original_language_idx";

#[derive(Debug, FromRow)]
struct TipRow {
    id: i64,
    slug: String,
    language: String,
    title: String,
    body: String,
    excerpt: String,
    thumbnail: Option<String>,
    category: Option<String>,
    seo_title: Option<String>,
    seo_description: Option<String>,
    is_published: bool,
    view_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    original_id: Option<i64>,
}

impl TryFrom<TipRow> for ContentItem {
    type Error = StoreError;

    fn try_from(row: TipRow) -> Result<Self, Self::Error> {
        let language = Language::from_code(&row.language).map_err(|e| {
            StoreError::Invalid(format!("tip {} has bad language: {}", row.id, e))
        })?;

        Ok(ContentItem {
            id: row.id,
            slug: row.slug,
            language,
            title: row.title,
            body: row.body,
            excerpt: row.excerpt,
            thumbnail: row.thumbnail,
            category: row.category,
            seo_title: row.seo_title,
            seo_description: row.seo_description,
            is_published: row.is_published,
            view_count: row.view_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
            original_id: row.original_id,
        })
    }
}

#[derive(Debug, FromRow)]
struct PlanRow {
    id: i64,
    name: String,
    carrier: String,
    description: String,
    features: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct PlanTranslationRow {
    plan_id: i64,
    language: String,
    description: Option<String>,
    features: Option<String>,
}

fn to_items(rows: Vec<TipRow>) -> Result<Vec<ContentItem>, StoreError> {
    rows.into_iter().map(ContentItem::try_from).collect()
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn to_usize(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

/// Map constraint violations on `tips` to integrity errors.
fn map_insert_error(error: sqlx::Error, item: &NewContentItem) -> StoreError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.is_unique_violation() {
            match db_error.constraint() {
                Some(SLUG_CONSTRAINT) => {
                    return StoreError::SlugCollision {
                        language: item.language,
                        slug: item.slug.clone(),
                    }
                }
                Some(VARIANT_CONSTRAINT) => {
                    if let Some(original_id) = item.original_id {
                        return StoreError::DuplicateVariant {
                            original_id,
                            language: item.language,
                        };
                    }
                }
                _ => {}
            }
        }
        if db_error.is_foreign_key_violation() {
            if let Some(original_id) = item.original_id {
                return StoreError::MissingOriginal(original_id);
            }
        }
    }
    StoreError::Database(error)
}

/// PostgreSQL-backed content store.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL and create tables
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = with_retry(&RetryConfig::database(), "PostgreSQL connect", || {
            PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
        })
        .await
        .context("Failed to connect to PostgreSQL")?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Create tables and indexes (idempotent)
    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tips (
                id BIGSERIAL PRIMARY KEY,
                slug TEXT NOT NULL,
                language TEXT NOT NULL DEFAULT 'ko',
                title TEXT NOT NULL,
                body TEXT NOT NULL DEFAULT '',
                excerpt TEXT NOT NULL DEFAULT '',
                thumbnail TEXT,
                category TEXT,
                seo_title TEXT,
                seo_description TEXT,
                is_published BOOLEAN NOT NULL DEFAULT TRUE,
                view_count BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                original_id BIGINT REFERENCES tips(id),
                CONSTRAINT tips_language_slug_key UNIQUE (language, slug)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create tips table")?;

        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS tips_original_language_idx
                ON tips (original_id, language) WHERE original_id IS NOT NULL
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create variant index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS plans (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                carrier TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                features TEXT NOT NULL DEFAULT '',
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create plans table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS plan_translations (
                plan_id BIGINT NOT NULL REFERENCES plans(id) ON DELETE CASCADE,
                language TEXT NOT NULL,
                description TEXT,
                features TEXT,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (plan_id, language)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create plan_translations table")?;

        info!("✓ Database schema ready");
        Ok(())
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn attach_translations(
        &self,
        rows: Vec<PlanRow>,
    ) -> Result<Vec<PlanDescription>, StoreError> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

        let translation_rows: Vec<PlanTranslationRow> = sqlx::query_as(
            "SELECT plan_id, language, description, features
             FROM plan_translations
             WHERE plan_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_plan: HashMap<i64, BTreeMap<String, PlanTranslation>> = HashMap::new();
        for row in translation_rows {
            by_plan.entry(row.plan_id).or_default().insert(
                row.language,
                PlanTranslation {
                    description: row.description,
                    features: row.features,
                },
            );
        }

        Ok(rows
            .into_iter()
            .map(|row| PlanDescription {
                translations: by_plan.remove(&row.id).unwrap_or_default(),
                id: row.id,
                name: row.name,
                carrier: row.carrier,
                description: row.description,
                features: row.features,
                is_active: row.is_active,
                created_at: row.created_at,
            })
            .collect())
    }

    async fn replace_plans_inner(
        tx: &mut Transaction<'_, Postgres>,
        plans: &[NewPlan],
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM plans").execute(&mut **tx).await?;

        for plan in plans {
            sqlx::query(
                "INSERT INTO plans (name, carrier, description, features, is_active)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&plan.name)
            .bind(&plan.carrier)
            .bind(&plan.description)
            .bind(&plan.features)
            .bind(plan.is_active)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl ContentStore for Database {
    async fn count_originals(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tips WHERE original_id IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(to_usize(count))
    }

    async fn list_originals(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<ContentItem>, StoreError> {
        let rows: Vec<TipRow> = sqlx::query_as(&format!(
            "SELECT {} FROM tips
             WHERE original_id IS NULL
             ORDER BY created_at DESC, id DESC
             OFFSET $1 LIMIT $2",
            TIP_COLUMNS
        ))
        .bind(to_i64(skip))
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;

        to_items(rows)
    }

    async fn get_item(&self, id: ContentId) -> Result<Option<ContentItem>, StoreError> {
        let row: Option<TipRow> =
            sqlx::query_as(&format!("SELECT {} FROM tips WHERE id = $1", TIP_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(ContentItem::try_from).transpose()
    }

    async fn list_variants(&self, original_id: ContentId) -> Result<Vec<ContentItem>, StoreError> {
        let rows: Vec<TipRow> = sqlx::query_as(&format!(
            "SELECT {} FROM tips WHERE original_id = $1",
            TIP_COLUMNS
        ))
        .bind(original_id)
        .fetch_all(&self.pool)
        .await?;

        let mut items = to_items(rows)?;
        items.sort_by_key(|v| v.language.order());
        Ok(items)
    }

    async fn list_translated_items(&self) -> Result<Vec<ContentItem>, StoreError> {
        let rows: Vec<TipRow> = sqlx::query_as(&format!(
            "SELECT {} FROM tips WHERE language <> $1 ORDER BY id",
            TIP_COLUMNS
        ))
        .bind(Language::canonical().code())
        .fetch_all(&self.pool)
        .await?;

        to_items(rows)
    }

    async fn list_published(&self, language: Language) -> Result<Vec<ContentItem>, StoreError> {
        let rows: Vec<TipRow> = sqlx::query_as(&format!(
            "SELECT {} FROM tips WHERE language = $1 AND is_published ORDER BY id",
            TIP_COLUMNS
        ))
        .bind(language.code())
        .fetch_all(&self.pool)
        .await?;

        to_items(rows)
    }

    async fn find_by_slug(
        &self,
        language: Language,
        slug: &str,
    ) -> Result<Option<ContentItem>, StoreError> {
        let row: Option<TipRow> = sqlx::query_as(&format!(
            "SELECT {} FROM tips WHERE language = $1 AND slug = $2",
            TIP_COLUMNS
        ))
        .bind(language.code())
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ContentItem::try_from).transpose()
    }

    async fn insert_item(&self, item: NewContentItem) -> Result<ContentItem, StoreError> {
        if let Some(original_id) = item.original_id {
            let is_original: Option<bool> =
                sqlx::query_scalar("SELECT original_id IS NULL FROM tips WHERE id = $1")
                    .bind(original_id)
                    .fetch_optional(&self.pool)
                    .await?;
            if is_original != Some(true) {
                return Err(StoreError::MissingOriginal(original_id));
            }
        }

        let row: TipRow = sqlx::query_as(&format!(
            "INSERT INTO tips
                (slug, language, title, body, excerpt, thumbnail, category,
                 seo_title, seo_description, is_published, original_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {}",
            TIP_COLUMNS
        ))
        .bind(&item.slug)
        .bind(item.language.code())
        .bind(&item.title)
        .bind(&item.body)
        .bind(&item.excerpt)
        .bind(&item.thumbnail)
        .bind(&item.category)
        .bind(&item.seo_title)
        .bind(&item.seo_description)
        .bind(item.is_published)
        .bind(item.original_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &item))?;

        debug!("Inserted tip {} ({}, {})", row.id, row.language, row.slug);
        ContentItem::try_from(row)
    }

    async fn update_item(
        &self,
        id: ContentId,
        update: ContentUpdate,
    ) -> Result<ContentItem, StoreError> {
        let set_thumbnail = update.thumbnail.is_some();
        let row: Option<TipRow> = sqlx::query_as(&format!(
            "UPDATE tips SET
                title = COALESCE($2, title),
                excerpt = COALESCE($3, excerpt),
                body = COALESCE($4, body),
                thumbnail = CASE WHEN $5 THEN $6 ELSE thumbnail END,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            TIP_COLUMNS
        ))
        .bind(id)
        .bind(update.title)
        .bind(update.excerpt)
        .bind(update.body)
        .bind(set_thumbnail)
        .bind(update.thumbnail.flatten())
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(StoreError::NotFound { kind: "item", id })
            .and_then(ContentItem::try_from)
    }

    async fn count_active_plans(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plans WHERE is_active")
            .fetch_one(&self.pool)
            .await?;
        Ok(to_usize(count))
    }

    async fn list_active_plans(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<PlanDescription>, StoreError> {
        let rows: Vec<PlanRow> = sqlx::query_as(
            "SELECT id, name, carrier, description, features, is_active, created_at
             FROM plans
             WHERE is_active
             ORDER BY id
             OFFSET $1 LIMIT $2",
        )
        .bind(to_i64(skip))
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;

        self.attach_translations(rows).await
    }

    async fn get_plan(&self, id: PlanId) -> Result<Option<PlanDescription>, StoreError> {
        let row: Option<PlanRow> = sqlx::query_as(
            "SELECT id, name, carrier, description, features, is_active, created_at
             FROM plans WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_translations(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn save_plan_translation(
        &self,
        plan_id: PlanId,
        language: Language,
        translation: PlanTranslation,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO plan_translations (plan_id, language, description, features)
             SELECT $1, $2, $3, $4 WHERE EXISTS (SELECT 1 FROM plans WHERE id = $1)
             ON CONFLICT (plan_id, language) DO UPDATE SET
                description = EXCLUDED.description,
                features = EXCLUDED.features,
                updated_at = NOW()",
        )
        .bind(plan_id)
        .bind(language.code())
        .bind(translation.description)
        .bind(translation.features)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                kind: "plan",
                id: plan_id,
            });
        }
        Ok(())
    }

    async fn reset_plan_translations(&self) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "DELETE FROM plan_translations
             WHERE plan_id IN (SELECT id FROM plans WHERE is_active)",
        )
        .execute(&mut *tx)
        .await;

        match result {
            Ok(done) => {
                tx.commit().await?;
                info!("Cleared {} plan translations", done.rows_affected());
                Ok(to_usize(i64::try_from(done.rows_affected()).unwrap_or(i64::MAX)))
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e.into())
            }
        }
    }

    async fn replace_all_plans(&self, plans: Vec<NewPlan>) -> Result<usize, StoreError> {
        for plan in &plans {
            validate_plan(plan)?;
        }

        let mut tx = self.pool.begin().await?;

        match Self::replace_plans_inner(&mut tx, &plans).await {
            Ok(()) => {
                tx.commit().await?;
                info!("✓ Replaced plan table with {} plans", plans.len());
                Ok(plans.len())
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }
}
