//! Application lifecycle and the HTTP batch-trigger API.
//!
//! # Routes
//!
//! - `GET  /health`                            - liveness plus translation metrics
//! - `POST /api/translate-plans`               - one batch of plan translations
//! - `POST /api/translate-tips`                - one batch of tip translations
//! - `POST /api/admin/reset-plan-translations` - clear every plan translation
//! - `GET  /api/quality`                       - Korean-leakage scan
//! - `POST /api/quality/repair`                - scan, then re-translate flagged records
//! - `POST /api/assets/unify`                  - copy original thumbnails onto variants
//! - `GET  /api/links/:language`               - broken internal links per published tip
//! - `POST /api/related`                       - link related tips into one tip
//! - `PUT  /api/admin/plans`                   - replace the whole plan catalogue
//!
//! Every `/api/*` route requires an `X-API-Key` header matching `API_KEY`.

use crate::config::Config;
use crate::consistency::{self, AssetReport, BrokenLinks, RelatedLinking};
use crate::content::NewPlan;
use crate::db::Database;
use crate::i18n::{Language, TranslationMetrics};
use crate::orchestrator::{BatchProgress, Orchestrator};
use crate::quality::{self, QualityReport, RepairSummary};
use crate::security;
use crate::store::{ContentStore, StoreError};
use crate::translation::{OpenAiTranslator, Translator};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Everything a request handler or scheduled job needs, built once at
/// startup and shared by reference.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ContentStore>,
    translator: Arc<dyn Translator>,
    orchestrator: Arc<Orchestrator>,
    api_key: Option<Arc<str>>,
    batch_size: usize,
    database: Option<Database>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ContentStore>,
        translator: Arc<dyn Translator>,
        languages: Vec<Language>,
        api_key: Option<String>,
        batch_size: usize,
    ) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&store),
            Arc::clone(&translator),
            languages,
        ));

        Self {
            store,
            translator,
            orchestrator,
            api_key: api_key.map(Arc::from),
            batch_size: batch_size.max(1),
            database: None,
        }
    }

    /// Connect to the database, prepare the schema and build the gateway.
    pub async fn initialize(config: &Config) -> Result<Self> {
        let database = Database::new(&config.database_url)
            .await
            .context("Failed to initialize database")?;
        info!("✓ Database connected");

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;
        let translator = Arc::new(OpenAiTranslator::from_config(client, config));

        if config.api_key.is_none() {
            if config.is_production() {
                error!("API_KEY not set in production: /api/* endpoints are disabled");
            } else {
                warn!("API_KEY not set: /api/* endpoints are disabled");
            }
        }

        let mut state = Self::new(
            Arc::new(database.clone()),
            translator,
            config.target_languages.clone(),
            config.api_key.clone(),
            config.batch_size,
        );
        state.database = Some(database);
        Ok(state)
    }

    /// Release pooled connections.
    pub async fn shutdown(&self) {
        if let Some(database) = &self.database {
            database.close().await;
            info!("Database connections closed");
        }
    }

    pub fn store(&self) -> &dyn ContentStore {
        self.store.as_ref()
    }

    pub fn translator(&self) -> &dyn Translator {
        self.translator.as_ref()
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/translate-plans", post(translate_plans_handler))
        .route("/translate-tips", post(translate_tips_handler))
        .route(
            "/admin/reset-plan-translations",
            post(reset_plan_translations_handler),
        )
        .route("/quality", get(quality_handler))
        .route("/quality/repair", post(quality_repair_handler))
        .route("/assets/unify", post(unify_assets_handler))
        .route("/links/:language", get(links_handler))
        .route("/related", post(related_handler))
        .route("/admin/plans", put(replace_plans_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ==================== Errors ====================

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        let status = match &error {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
            StoreError::DuplicateVariant { .. }
            | StoreError::SlugCollision { .. }
            | StoreError::MissingOriginal(_) => StatusCode::CONFLICT,
            StoreError::Database(_) => {
                error!("Store error while handling request: {}", error);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return ApiError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "API key not configured".to_string(),
        }
        .into_response();
    };

    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if !security::api_key_matches(Some(expected), presented) {
        warn!("Rejected {} {}: bad API key", request.method(), request.uri());
        return ApiError {
            status: StatusCode::UNAUTHORIZED,
            message: "Invalid or missing API key".to_string(),
        }
        .into_response();
    }

    next.run(request).await
}

// ==================== Batch endpoints ====================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub skip: usize,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub translated: usize,
    pub batch: usize,
    pub processed: usize,
    pub total_plans: usize,
    pub remaining: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub has_more: bool,
    pub next_skip: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub message: String,
    pub stats: BatchStats,
    pub pagination: Pagination,
    pub errors: Vec<String>,
}

impl BatchResponse {
    fn from_progress(noun: &str, progress: BatchProgress) -> Self {
        let message = if progress.total == 0 {
            format!("No {} to translate", noun)
        } else if progress.has_more {
            format!(
                "Processed {}/{} {}; more remaining",
                progress.processed, progress.total, noun
            )
        } else {
            format!("All {} {} processed", progress.total, noun)
        };

        Self {
            message,
            stats: BatchStats {
                translated: progress.translated,
                batch: progress.batch,
                processed: progress.processed,
                total_plans: progress.total,
                remaining: progress.remaining,
                failed: progress.failed,
            },
            pagination: Pagination {
                has_more: progress.has_more,
                next_skip: progress.next_skip,
            },
            errors: progress.errors,
        }
    }
}

impl AppState {
    fn batch_size_for(&self, request: &BatchRequest) -> usize {
        request
            .batch_size
            .filter(|n| *n > 0)
            .unwrap_or(self.batch_size)
    }
}

/// GET /health - liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "simplan-pipeline",
        "version": env!("CARGO_PKG_VERSION"),
        "metrics": TranslationMetrics::global().report(),
    }))
}

/// POST /api/translate-plans
async fn translate_plans_handler(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let batch_size = state.batch_size_for(&request);
    let progress = state
        .orchestrator
        .translate_plans_batch(request.skip, batch_size)
        .await?;
    Ok(Json(BatchResponse::from_progress("plans", progress)))
}

/// POST /api/translate-tips
async fn translate_tips_handler(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let batch_size = state.batch_size_for(&request);
    let progress = state
        .orchestrator
        .run_batch(request.skip, batch_size)
        .await?;
    Ok(Json(BatchResponse::from_progress("tips", progress)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetResponse {
    pub message: String,
    pub cleared: usize,
}

/// POST /api/admin/reset-plan-translations
async fn reset_plan_translations_handler(
    State(state): State<AppState>,
) -> Result<Json<ResetResponse>, ApiError> {
    let cleared = state.store.reset_plan_translations().await?;
    warn!("Plan translations reset: {} cleared", cleared);
    Ok(Json(ResetResponse {
        message: "All plan translations cleared".to_string(),
        cleared,
    }))
}

/// GET /api/quality
async fn quality_handler(State(state): State<AppState>) -> Result<Json<QualityReport>, ApiError> {
    Ok(Json(quality::scan(state.store()).await?))
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairResponse {
    pub flags_found: usize,
    pub repair: RepairSummary,
}

/// POST /api/quality/repair
async fn quality_repair_handler(
    State(state): State<AppState>,
) -> Result<Json<RepairResponse>, ApiError> {
    let report = quality::scan(state.store()).await?;
    let repair = quality::repair(state.store(), state.translator(), &report).await?;
    Ok(Json(RepairResponse {
        flags_found: report.flags.len(),
        repair,
    }))
}

/// POST /api/assets/unify
async fn unify_assets_handler(
    State(state): State<AppState>,
) -> Result<Json<AssetReport>, ApiError> {
    Ok(Json(consistency::unify_thumbnails(state.store()).await?))
}

// ==================== Consistency endpoints ====================

/// GET /api/links/:language
async fn links_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Vec<BrokenLinks>>, ApiError> {
    let language =
        Language::from_code(&code).map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Json(
        consistency::check_all_links(state.store(), language).await?,
    ))
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelatedRequest {
    pub slug: String,
    pub language: Language,
    pub keywords: Vec<String>,
}

/// POST /api/related
async fn related_handler(
    State(state): State<AppState>,
    Json(request): Json<RelatedRequest>,
) -> Result<Json<RelatedLinking>, ApiError> {
    let item = state
        .store
        .find_by_slug(request.language, &request.slug)
        .await?
        .ok_or_else(|| {
            ApiError::not_found(format!(
                "no tip '{}' in {}",
                request.slug, request.language
            ))
        })?;

    let linking = consistency::link_related_content(state.store(), &item, &request.keywords).await?;
    info!(
        "Related content for '{}': {} related, {} inline link(s)",
        item.slug,
        linking.related.len(),
        linking.inline_links
    );
    Ok(Json(linking))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacePlansResponse {
    pub message: String,
    pub inserted: usize,
}

/// PUT /api/admin/plans
async fn replace_plans_handler(
    State(state): State<AppState>,
    Json(plans): Json<Vec<NewPlan>>,
) -> Result<Json<ReplacePlansResponse>, ApiError> {
    let inserted = state.store.replace_all_plans(plans).await?;
    warn!("Plan catalogue replaced: {} plan(s)", inserted);
    Ok(Json(ReplacePlansResponse {
        message: "Plan catalogue replaced".to_string(),
        inserted,
    }))
}
