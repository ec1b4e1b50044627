//! Drives a batch endpoint of a running pipeline server until every item is
//! processed.
//!
//! Usage:
//!   cargo run --bin batch-driver                 # plans
//!   cargo run --bin batch-driver -- tips         # tips
//!   cargo run --bin batch-driver -- plans 40     # start at skip=40
//!
//! Required environment variables:
//! - API_KEY
//!
//! Optional:
//! - PIPELINE_URL (defaults to http://localhost:8080)
//! - BATCH_SIZE (defaults to the server's batch size)
//! - BATCH_DELAY_MS (defaults to 2000)

use anyhow::{Context, Result};
use simplan_pipeline::app::{BatchRequest, BatchResponse, API_KEY_HEADER};
use reqwest::StatusCode;
use simplan_pipeline::retry::{with_retry_if, RetryConfig};
use std::time::Duration;
use tracing::{info, warn};

struct DriverConfig {
    base_url: String,
    api_key: String,
    batch_size: Option<usize>,
    delay: Duration,
}

impl DriverConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: std::env::var("PIPELINE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            api_key: std::env::var("API_KEY").context("API_KEY not set")?,
            batch_size: std::env::var("BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0),
            delay: Duration::from_millis(
                std::env::var("BATCH_DELAY_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2000),
            ),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Plans,
    Tips,
}

impl Target {
    fn parse(arg: Option<&str>) -> Result<Self> {
        match arg {
            None | Some("plans") => Ok(Target::Plans),
            Some("tips") => Ok(Target::Tips),
            Some(other) => anyhow::bail!("Unknown target '{}'. Use 'plans' or 'tips'", other),
        }
    }

    fn path(self) -> &'static str {
        match self {
            Target::Plans => "/api/translate-plans",
            Target::Tips => "/api/translate-tips",
        }
    }
}

/// Failure of a single batch request.
#[derive(Debug, thiserror::Error)]
enum TriggerError {
    #[error("Failed to reach pipeline server")]
    Transport(#[source] reqwest::Error),
    #[error("Pipeline server returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Failed to parse batch response")]
    Decode(#[source] reqwest::Error),
}

impl TriggerError {
    /// Client errors other than 429 fail the same way on every attempt.
    fn is_retryable(&self) -> bool {
        match self {
            TriggerError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            TriggerError::Transport(_) | TriggerError::Decode(_) => true,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct DriveSummary {
    batches: usize,
    translated: usize,
    failed: usize,
    errors: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("batch_driver=info".parse()?)
                .add_directive("simplan_pipeline=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let target = Target::parse(args.first().map(String::as_str))?;
    let start_skip: usize = match args.get(1) {
        Some(skip) => skip.parse().context("Start skip must be a number")?,
        None => 0,
    };

    let config = DriverConfig::from_env()?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(600))
        .build()
        .context("Failed to create HTTP client")?;

    info!(
        "Driving {}{} from skip={}",
        config.base_url,
        target.path(),
        start_skip
    );

    let summary = drive(&client, &config, target, start_skip).await?;

    info!(
        "✓ Done: {} batch(es), {} translated, {} failed",
        summary.batches, summary.translated, summary.failed
    );
    for error in &summary.errors {
        warn!("  {}", error);
    }

    Ok(())
}

/// Post batches until the server reports nothing left.
async fn drive(
    client: &reqwest::Client,
    config: &DriverConfig,
    target: Target,
    start_skip: usize,
) -> Result<DriveSummary> {
    let url = format!("{}{}", config.base_url.trim_end_matches('/'), target.path());
    let mut summary = DriveSummary::default();
    let mut skip = start_skip;

    loop {
        let request = BatchRequest {
            skip,
            batch_size: config.batch_size,
        };

        let response = with_retry_if(
            &RetryConfig::batch_trigger(),
            "Batch request",
            || post_batch(client, &url, &config.api_key, &request),
            TriggerError::is_retryable,
        )
        .await?;

        summary.batches += 1;
        summary.translated += response.stats.translated;
        summary.failed += response.stats.failed;
        summary.errors.extend(response.errors);

        info!(
            "Batch {}: {} ({}/{} processed, {} translated, {} failed)",
            summary.batches,
            response.message,
            response.stats.processed,
            response.stats.total_plans,
            response.stats.translated,
            response.stats.failed
        );

        if !response.pagination.has_more {
            break;
        }
        if response.pagination.next_skip <= skip {
            anyhow::bail!(
                "Server did not advance past skip={} (next_skip={})",
                skip,
                response.pagination.next_skip
            );
        }
        skip = response.pagination.next_skip;

        tokio::time::sleep(config.delay).await;
    }

    Ok(summary)
}

async fn post_batch(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    request: &BatchRequest,
) -> Result<BatchResponse, TriggerError> {
    let response = client
        .post(url)
        .header(API_KEY_HEADER, api_key)
        .json(request)
        .send()
        .await
        .map_err(TriggerError::Transport)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TriggerError::Status { status, body });
    }

    response
        .json::<BatchResponse>()
        .await
        .map_err(TriggerError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> DriverConfig {
        DriverConfig {
            base_url,
            api_key: "secret".to_string(),
            batch_size: Some(5),
            delay: Duration::ZERO,
        }
    }

    fn batch_body(processed: usize, total: usize, translated: usize) -> serde_json::Value {
        json!({
            "message": "ok",
            "stats": {
                "translated": translated,
                "batch": 5,
                "processed": processed,
                "total_plans": total,
                "remaining": total.saturating_sub(processed),
                "failed": 0
            },
            "pagination": { "has_more": processed < total, "next_skip": processed },
            "errors": []
        })
    }

    #[test]
    fn test_target_parse() {
        assert_eq!(Target::parse(None).expect("default"), Target::Plans);
        assert_eq!(Target::parse(Some("tips")).expect("tips"), Target::Tips);
        assert!(Target::parse(Some("users")).is_err());
    }

    #[tokio::test]
    async fn test_drive_follows_pagination() {
        let server = MockServer::start().await;

        for (skip, processed, translated) in [(0, 5, 5), (5, 10, 4), (10, 12, 2)] {
            Mock::given(method("POST"))
                .and(path("/api/translate-plans"))
                .and(header("X-API-Key", "secret"))
                .and(body_json(json!({ "skip": skip, "batch_size": 5 })))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(batch_body(processed, 12, translated)),
                )
                .expect(1)
                .mount(&server)
                .await;
        }

        let summary = drive(
            &reqwest::Client::new(),
            &config(server.uri()),
            Target::Plans,
            0,
        )
        .await
        .expect("drive");

        assert_eq!(summary.batches, 3);
        assert_eq!(summary.translated, 11);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn test_drive_starts_at_given_skip() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/translate-tips"))
            .and(body_json(json!({ "skip": 10, "batch_size": 5 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(batch_body(12, 12, 2)))
            .expect(1)
            .mount(&server)
            .await;

        let summary = drive(
            &reqwest::Client::new(),
            &config(server.uri()),
            Target::Tips,
            10,
        )
        .await
        .expect("drive");

        assert_eq!(summary.batches, 1);
        assert_eq!(summary.translated, 2);
    }

    #[tokio::test]
    async fn test_drive_stops_when_server_does_not_advance() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/translate-plans"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "stuck",
                "stats": {
                    "translated": 0, "batch": 5, "processed": 0,
                    "total_plans": 12, "remaining": 12, "failed": 0
                },
                "pagination": { "has_more": true, "next_skip": 0 },
                "errors": []
            })))
            .mount(&server)
            .await;

        let result = drive(
            &reqwest::Client::new(),
            &config(server.uri()),
            Target::Plans,
            0,
        )
        .await;

        assert!(result.is_err());
    }

    #[test]
    fn test_only_transient_statuses_are_retried() {
        let status = |code: u16| TriggerError::Status {
            status: StatusCode::from_u16(code).expect("status"),
            body: String::new(),
        };
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!status(404).is_retryable());
    }

    #[tokio::test]
    async fn test_drive_fails_fast_on_rejected_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/translate-plans"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .expect(1)
            .mount(&server)
            .await;

        let error = drive(
            &reqwest::Client::new(),
            &config(server.uri()),
            Target::Plans,
            0,
        )
        .await
        .expect_err("unauthorized");

        assert!(error.to_string().contains("401"));
    }
}
