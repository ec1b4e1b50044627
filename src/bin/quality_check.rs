//! Translation quality and link audit against the live database.
//!
//! Usage:
//!   cargo run --bin quality-check                 # report Korean leakage
//!   cargo run --bin quality-check -- --fix        # re-translate flagged fields
//!   cargo run --bin quality-check -- --links en   # also audit internal links of en pages
//!
//! Exits non-zero when problems remain after the run.

use anyhow::{Context, Result};
use simplan_pipeline::{
    app::AppState,
    config::Config,
    consistency,
    i18n::Language,
    quality::{self, QualityReport},
};
use tracing::{info, warn};

struct Options {
    fix: bool,
    links: Option<Language>,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self> {
        let mut options = Options {
            fix: false,
            links: None,
        };
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--fix" => options.fix = true,
                "--links" => {
                    let code = iter.next().context("--links needs a language code")?;
                    options.links = Some(Language::from_code(code)?);
                }
                other => anyhow::bail!("Unknown argument: {}", other),
            }
        }
        Ok(options)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quality_check=info".parse()?)
                .add_directive("simplan_pipeline=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = Options::parse(&args)?;

    let config = Config::from_env().context("Failed to load configuration")?;
    let state = AppState::initialize(&config).await?;

    let result = run(&state, &options).await;
    state.shutdown().await;

    if !result? {
        anyhow::bail!("Quality check found unresolved problems");
    }
    Ok(())
}

/// Returns `true` when nothing is left to fix.
async fn run(state: &AppState, options: &Options) -> Result<bool> {
    let mut report = quality::scan(state.store()).await?;
    print_report(&report);

    if options.fix && !report.is_clean() {
        let repair = quality::repair(state.store(), state.translator(), &report).await?;
        info!(
            "Repair: {} record(s) fixed, {} failed",
            repair.repaired, repair.failed
        );
        for error in &repair.errors {
            warn!("  {}", error);
        }

        report = quality::scan(state.store()).await?;
        info!("After repair:");
        print_report(&report);
    }

    let mut clean = report.is_clean();

    if let Some(language) = options.links {
        let failing = consistency::check_all_links(state.store(), language).await?;
        if failing.is_empty() {
            info!("✓ All internal links on {} pages resolve", language);
        } else {
            clean = false;
            warn!("{} {} page(s) with broken links:", failing.len(), language);
            for item in &failing {
                warn!("  {} (id {}): {}", item.slug, item.item_id, item.broken.join(", "));
            }
        }
    }

    Ok(clean)
}

fn print_report(report: &QualityReport) {
    info!(
        "Checked {} tip variant(s) and {} plan(s)",
        report.tips_checked, report.plans_checked
    );
    if report.is_clean() {
        info!("✓ No Korean text found in translated fields");
        return;
    }

    warn!(
        "{} tip(s) and {} plan(s) contain Korean text:",
        report.flagged_tips, report.flagged_plans
    );
    for flag in &report.flags {
        warn!(
            "  {:?} {} [{}] {:?}",
            flag.kind, flag.id, flag.language, flag.field
        );
    }
}
