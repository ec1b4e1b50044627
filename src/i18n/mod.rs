//! Internationalization (i18n) module for multi-language support.
//!
//! # Architecture
//!
//! - `registry`: Single source of truth for the twelve supported languages
//! - `language`: Type-safe `Language` handle validated against the registry
//! - `script`: Unicode-block script detection
//! - `strings`: Localized strings for generated content sections
//! - `validator`: Translation quality validation
//! - `metrics`: Translation observability counters
//!
//! # Example
//!
//! ```rust,ignore
//! use simplan_pipeline::i18n::Language;
//!
//! let canonical = Language::canonical(); // Korean
//! let vietnamese = Language::from_code("vi")?;
//! let targets = Language::targets(); // eleven languages, declared order
//! ```

mod language;
mod metrics;
mod registry;
pub mod script;
mod strings;
mod validator;

pub use language::{parse_language_list, Language};
pub use metrics::{MetricsReport, TranslationMetrics};
pub use registry::{LanguageConfig, LanguageRegistry};
pub use script::Script;
pub use strings::LanguageStrings;
pub use validator::{TranslationValidator, ValidationReport};
