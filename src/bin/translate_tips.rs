//! One-shot tip translation: creates every missing language variant, then
//! brings variant thumbnails back in line with their originals.
//!
//! Usage:
//!   cargo run --bin translate-tips
//!   cargo run --bin translate-tips -- --skip-assets   # translations only
//!
//! Uses the same environment as the server (OPENAI_API_KEY, DATABASE_URL,
//! TARGET_LANGUAGES, TRANSLATION_DELAY_MS, ...).

use anyhow::{Context, Result};
use simplan_pipeline::{app::AppState, config::Config, consistency};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translate_tips=info".parse()?)
                .add_directive("simplan_pipeline=info".parse()?),
        )
        .init();

    let skip_assets = std::env::args().any(|arg| arg == "--skip-assets");

    let config = Config::from_env().context("Failed to load configuration")?;
    let state = AppState::initialize(&config).await?;

    info!(
        "Translating tips into: {}",
        state
            .orchestrator()
            .languages()
            .iter()
            .map(|l| l.code())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let result = run(&state, skip_assets).await;
    state.shutdown().await;
    result
}

async fn run(state: &AppState, skip_assets: bool) -> Result<()> {
    let summary = state
        .orchestrator()
        .run_all()
        .await
        .context("Tip translation run failed")?;

    info!(
        "✓ {} original(s): {} variant(s) created, {} already complete",
        summary.originals, summary.variants_created, summary.already_complete
    );
    for (id, failure) in &summary.failures {
        warn!("  tip {} ({}): {}", id, failure.language, failure.error);
    }
    for (id, error) in &summary.item_errors {
        warn!("  tip {} skipped: {}", id, error);
    }

    if !skip_assets {
        let assets = consistency::unify_thumbnails(state.store())
            .await
            .context("Thumbnail unification failed")?;
        info!(
            "✓ {} group(s) checked, {} thumbnail(s) updated",
            assets.groups_checked,
            assets.changes.len()
        );
    }

    if summary.failure_count() > 0 {
        anyhow::bail!("{} translation(s) failed", summary.failure_count());
    }
    Ok(())
}
