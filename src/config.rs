use crate::i18n::{parse_language_list, Language};
use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,

    // OpenAI
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_api_url: String,
    pub translation_max_tokens: u32,

    // Translation pipeline
    pub target_languages: Vec<Language>,
    pub translation_delay_ms: u64,
    pub batch_size: usize,

    // Scheduler (HH:MM, Korea time)
    pub schedule_times: Vec<String>,

    // Server
    pub api_key: Option<String>,
    pub database_url: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let target_languages = match std::env::var("TARGET_LANGUAGES") {
            Ok(list) if !list.trim().is_empty() => {
                parse_language_list(&list).context("Invalid TARGET_LANGUAGES")?
            }
            _ => Language::targets(),
        };

        let schedule_times = std::env::var("SCHEDULE_TIMES")
            .unwrap_or_else(|_| "03:00".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            // OpenAI
            openai_api_key: std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?,
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            openai_api_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),
            translation_max_tokens: std::env::var("TRANSLATION_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),

            // Translation pipeline
            target_languages,
            translation_delay_ms: std::env::var("TRANSLATION_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            batch_size: std::env::var("BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(10),

            schedule_times,

            // Server
            api_key: std::env::var("API_KEY").ok().filter(|k| !k.is_empty()),
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL not set")?,
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
