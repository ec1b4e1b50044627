//! Translation metrics and observability module.
//!
//! Counts gateway calls, failures and variant writes so `/health` can show
//! how the pipeline has been doing since the process started.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Translation counters.
#[derive(Debug, Default)]
pub struct TranslationMetrics {
    /// Calls made to the translation service (including retries)
    api_calls: AtomicUsize,

    /// Calls that returned an error
    api_failures: AtomicUsize,

    /// Translations written to the store
    translations_saved: AtomicUsize,

    /// Groups skipped because every language already existed
    groups_complete: AtomicUsize,
}

/// Global metrics instance (initialized lazily)
static METRICS: OnceLock<TranslationMetrics> = OnceLock::new();

impl TranslationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the global translation metrics instance.
    pub fn global() -> &'static TranslationMetrics {
        METRICS.get_or_init(TranslationMetrics::new)
    }

    pub fn record_api_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_api_failure(&self) {
        self.api_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_translation_saved(&self) {
        self.translations_saved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_group_complete(&self) {
        self.groups_complete.fetch_add(1, Ordering::Relaxed);
    }

    pub fn api_calls(&self) -> usize {
        self.api_calls.load(Ordering::Relaxed)
    }

    pub fn api_failures(&self) -> usize {
        self.api_failures.load(Ordering::Relaxed)
    }

    pub fn translations_saved(&self) -> usize {
        self.translations_saved.load(Ordering::Relaxed)
    }

    pub fn groups_complete(&self) -> usize {
        self.groups_complete.load(Ordering::Relaxed)
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let calls = self.api_calls();
        let failures = self.api_failures();
        let api_success_rate = if calls > 0 {
            (calls.saturating_sub(failures) as f64 / calls as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            api_calls: calls,
            api_failures: failures,
            api_success_rate,
            translations_saved: self.translations_saved(),
            groups_complete: self.groups_complete(),
        }
    }
}

/// Metrics report containing current translation statistics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    /// Number of API calls made
    pub api_calls: usize,

    /// Number of API failures
    pub api_failures: usize,

    /// API success rate as a percentage (0-100)
    pub api_success_rate: f64,

    /// Number of translations persisted
    pub translations_saved: usize,

    /// Number of groups found already complete
    pub groups_complete: usize,
}
