//! Translation Gateway: the single entry point to the external translation
//! service.

use crate::config::Config;
use crate::i18n::{Language, TranslationMetrics, TranslationValidator};
use crate::retry::CallPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Error)]
pub enum TranslationError {
    #[error("translation API error ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("failed to reach translation API: {0}")]
    Network(String),

    #[error("translation response contained no choices")]
    EmptyResponse,

    #[error("failed to parse translation response: {0}")]
    Decode(String),
}

impl TranslationError {
    /// 429 and 5xx are retried, other 4xx fail immediately.
    /// Network and decoding failures are treated as transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::Http { status, .. } => *status == 429 || *status >= 500,
            TranslationError::Network(_)
            | TranslationError::EmptyResponse
            | TranslationError::Decode(_) => true,
        }
    }
}

/// Translates one piece of text from `source` into `target`.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, TranslationError>;
}

/// OpenAI Chat Completion request for translation
#[derive(Debug, Serialize)]
struct TranslationRequest {
    model: String,
    messages: Vec<Message>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
}

/// Check if a model is a reasoning model that doesn't support temperature
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Build the system prompt for translation
fn build_translation_system_prompt(source_language: &str, target_language: &str) -> String {
    format!(
        r#"You are a professional translator for a website that compares mobile SIM card plans in Korea. Translate the given text from {} to {}.

## Translation Rules

### DO NOT translate:
- HTML tags and attributes (keep every tag, href, src and class exactly as given)
- URLs and links
- Carrier and brand names (e.g., SKT, KT, LG U+)
- Plan names, prices, data amounts and other numbers
- Units (GB, MB, Mbps, KRW)

### DO translate:
- All visible text, including headings, list items and table cells
- Descriptive text and explanations

### Formatting:
- Preserve the HTML structure and nesting
- Preserve line breaks and emojis
- Do not add commentary, notes or quotation marks around the result

### Output:
- Return ONLY the translated text
- No Korean characters may remain in the output"#,
        source_language, target_language
    )
}

/// Build the user prompt for translation
fn build_translation_user_prompt(text: &str, source_language: &str, target_language: &str) -> String {
    format!(
        "Please translate the following text from {} to {}:\n\n{}",
        source_language, target_language, text
    )
}

/// Translator backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiTranslator {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    policy: CallPolicy,
}

impl OpenAiTranslator {
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        policy: CallPolicy,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4000,
            policy,
        }
    }

    pub fn from_config(client: reqwest::Client, config: &Config) -> Self {
        let policy = CallPolicy::translation(Duration::from_millis(config.translation_delay_ms));
        Self::new(
            client,
            &config.openai_api_url,
            &config.openai_api_key,
            &config.openai_model,
            policy,
        )
        .with_max_tokens(config.translation_max_tokens)
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn build_request(&self, text: &str, source: Language, target: Language) -> TranslationRequest {
        // Reasoning models need higher token limits and don't support temperature
        let is_reasoning = is_reasoning_model(&self.model);
        let max_completion_tokens = if is_reasoning {
            16000
        } else {
            self.max_tokens
        };

        TranslationRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: build_translation_system_prompt(source.name(), target.name()),
                },
                Message {
                    role: "user".to_string(),
                    content: build_translation_user_prompt(text, source.name(), target.name()),
                },
            ],
            max_completion_tokens,
            temperature: if is_reasoning { None } else { Some(0.3) },
            reasoning_effort: if is_reasoning {
                Some("low".to_string())
            } else {
                None
            },
        }
    }

    /// One HTTP round trip, no retries.
    async fn request_once(&self, request: &TranslationRequest) -> Result<String, TranslationError> {
        let metrics = TranslationMetrics::global();
        metrics.record_api_call();

        let result = self.send(request).await;
        if result.is_err() {
            metrics.record_api_failure();
        }
        result
    }

    async fn send(&self, request: &TranslationRequest) -> Result<String, TranslationError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| TranslationError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(TranslationError::Http { status, body });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::Decode(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or(TranslationError::EmptyResponse)
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, TranslationError> {
        if text.trim().is_empty() || target == source || target.is_canonical() {
            return Ok(text.to_string());
        }

        let request = self.build_request(text, source, target);
        let translated = self
            .policy
            .run(
                &format!("Translation to {}", target.name()),
                || self.request_once(&request),
                TranslationError::is_retryable,
            )
            .await?;

        let validation = TranslationValidator::validate(text, &translated, target);
        if validation.has_warnings() {
            warn!(
                "Translation validation warnings for {} ({}): {:?}",
                target.name(),
                target.code(),
                validation.warnings
            );
        }
        if validation.has_errors() {
            warn!(
                "Translation validation errors for {} ({}): {:?}",
                target.name(),
                target.code(),
                validation.errors
            );
        }

        debug!(
            "Translated {} chars to {} ({} chars)",
            text.chars().count(),
            target.code(),
            translated.chars().count()
        );
        Ok(translated)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_string_contains, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    // ==================== Prompt Tests ====================

    #[test]
    fn test_build_translation_system_prompt() {
        let prompt = build_translation_system_prompt("Korean", "Vietnamese");

        assert!(prompt.contains("from Korean to Vietnamese"));
        assert!(prompt.contains("DO NOT translate"));
        assert!(prompt.contains("HTML tags"));
        assert!(prompt.contains("URLs"));
        assert!(prompt.contains("SKT"));
        assert!(prompt.contains("No Korean characters"));
    }

    #[test]
    fn test_build_translation_user_prompt() {
        let text = "<p>유심 구매 방법</p>";
        let prompt = build_translation_user_prompt(text, "Korean", "Thai");

        assert!(prompt.contains("translate"));
        assert!(prompt.contains("Thai"));
        assert!(prompt.contains(text));
    }

    // ==================== Error Classification Tests ====================

    #[test]
    fn test_is_retryable_server_errors() {
        for status in [500, 502, 503] {
            let error = TranslationError::Http {
                status,
                body: String::new(),
            };
            assert!(error.is_retryable(), "{} should be retryable", status);
        }
    }

    #[test]
    fn test_is_retryable_rate_limit() {
        let error = TranslationError::Http {
            status: 429,
            body: "Rate limit exceeded".to_string(),
        };
        assert!(error.is_retryable());
    }

    #[test]
    fn test_is_not_retryable_client_errors() {
        for status in [400, 401, 403, 404] {
            let error = TranslationError::Http {
                status,
                body: String::new(),
            };
            assert!(!error.is_retryable(), "{} should not be retryable", status);
        }
    }

    #[test]
    fn test_is_retryable_transport_errors() {
        assert!(TranslationError::Network("connection refused".to_string()).is_retryable());
        assert!(TranslationError::Decode("invalid JSON".to_string()).is_retryable());
        assert!(TranslationError::EmptyResponse.is_retryable());
    }

    // ==================== Request Structure Tests ====================

    #[test]
    fn test_translation_request_serialization() {
        let translator = OpenAiTranslator::new(
            reqwest::Client::new(),
            "http://localhost",
            "key",
            "gpt-4o-mini",
            CallPolicy::immediate(),
        );
        let request = translator.build_request("안녕", Language::KOREAN, Language::ENGLISH);

        let json = serde_json::to_string(&request).expect("Should serialize");
        assert!(json.contains("gpt-4o-mini"));
        assert!(json.contains("0.3"));
        assert!(json.contains("max_completion_tokens"));
        assert!(json.contains("4000"));
        assert!(json.contains("system"));
        assert!(json.contains("user"));
        assert!(!json.contains("reasoning_effort"));
    }

    #[test]
    fn test_translation_request_serialization_reasoning_model() {
        let translator = OpenAiTranslator::new(
            reqwest::Client::new(),
            "http://localhost",
            "key",
            "gpt-5-mini",
            CallPolicy::immediate(),
        );
        let request = translator.build_request("안녕", Language::KOREAN, Language::ENGLISH);

        let json = serde_json::to_string(&request).expect("Should serialize");
        assert!(json.contains("16000"));
        assert!(json.contains("reasoning_effort"));
        assert!(!json.contains("temperature"));
    }

    #[test]
    fn test_is_reasoning_model() {
        assert!(is_reasoning_model("gpt-5-mini"));
        assert!(is_reasoning_model("o1-preview"));
        assert!(is_reasoning_model("o3"));
        assert!(is_reasoning_model("o4-mini"));
        assert!(!is_reasoning_model("gpt-4o-mini"));
        assert!(!is_reasoning_model("gpt-4-turbo"));
    }

    // ==================== Integration Tests with Wiremock ====================

    fn create_translator(server: &MockServer, policy: CallPolicy) -> OpenAiTranslator {
        OpenAiTranslator::new(
            reqwest::Client::new(),
            format!("{}/v1/chat/completions", server.uri()),
            "test-openai-key",
            "gpt-4o-mini",
            policy,
        )
    }

    fn fast_retries() -> CallPolicy {
        CallPolicy::new(
            crate::retry::RetryConfig::new(3, Duration::from_millis(10)).linear(),
            Duration::ZERO,
        )
    }

    fn create_openai_response(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [
                {
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": content
                    },
                    "finish_reason": "stop"
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_translate_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-openai-key"))
            .and(body_string_contains("Vietnamese"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(create_openai_response("Hướng dẫn mua SIM")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let translator = create_translator(&mock_server, CallPolicy::immediate());
        let result = translator
            .translate("유심 구매 가이드", Language::KOREAN, Language::VIETNAMESE)
            .await
            .expect("Should succeed");

        assert_eq!(result, "Hướng dẫn mua SIM");
    }

    #[tokio::test]
    async fn test_translate_empty_text_skips_api_call() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let translator = create_translator(&mock_server, CallPolicy::immediate());
        let result = translator
            .translate("   ", Language::KOREAN, Language::ENGLISH)
            .await
            .expect("Should succeed");

        assert_eq!(result, "   ");
    }

    #[tokio::test]
    async fn test_translate_to_canonical_skips_api_call() {
        // Unroutable URL: any request would fail
        let translator = OpenAiTranslator::new(
            reqwest::Client::new(),
            "http://invalid-url-should-not-be-called.test",
            "key",
            "gpt-4o-mini",
            CallPolicy::immediate(),
        );

        let result = translator
            .translate("유심", Language::KOREAN, Language::KOREAN)
            .await
            .expect("Should succeed");
        assert_eq!(result, "유심");
    }

    #[tokio::test]
    async fn test_translate_empty_choices() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&mock_server)
            .await;

        let translator = create_translator(&mock_server, CallPolicy::immediate());
        let result = translator
            .translate("유심", Language::KOREAN, Language::ENGLISH)
            .await;

        assert!(matches!(result, Err(TranslationError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_translate_retries_on_500_error() {
        let mock_server = MockServer::start().await;

        // First two requests fail with 500, third succeeds
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_string(r#"{"error": {"message": "Internal Server Error"}}"#),
            )
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(create_openai_response("SIM guide")),
            )
            .mount(&mock_server)
            .await;

        let translator = create_translator(&mock_server, fast_retries());
        let result = translator
            .translate("유심 가이드", Language::KOREAN, Language::ENGLISH)
            .await;

        assert_eq!(result.expect("Should succeed after retries"), "SIM guide");
    }

    #[tokio::test]
    async fn test_translate_retries_on_429() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Rate limit"))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(create_openai_response("SIM guide")),
            )
            .mount(&mock_server)
            .await;

        let translator = create_translator(&mock_server, fast_retries());
        let result = translator
            .translate("유심 가이드", Language::KOREAN, Language::ENGLISH)
            .await;
        assert!(result.is_ok(), "Should succeed after 429 retry: {:?}", result);
    }

    #[tokio::test]
    async fn test_translate_no_retry_on_400_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"error": {"message": "Bad request"}}"#),
            )
            .expect(1) // Should only be called once - no retries
            .mount(&mock_server)
            .await;

        let translator = create_translator(&mock_server, CallPolicy::translation(Duration::ZERO));

        let start = std::time::Instant::now();
        let result = translator
            .translate("유심", Language::KOREAN, Language::ENGLISH)
            .await;
        let elapsed = start.elapsed();

        match result {
            Err(TranslationError::Http { status, .. }) => assert_eq!(status, 400),
            other => panic!("Expected HTTP 400 error, got {:?}", other),
        }
        assert!(
            elapsed < Duration::from_secs(1),
            "400 error should fail immediately without retries, took {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_translate_no_retry_on_401_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_string(r#"{"error": {"message": "Invalid API key"}}"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let translator = create_translator(&mock_server, fast_retries());
        let result = translator
            .translate("유심", Language::KOREAN, Language::ENGLISH)
            .await;
        assert!(result.is_err(), "401 error should fail immediately");
    }

    #[tokio::test]
    async fn test_translate_exhausts_retries_on_persistent_500() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_string(r#"{"error": {"message": "Persistent failure"}}"#),
            )
            .expect(3) // translation preset has 3 attempts
            .mount(&mock_server)
            .await;

        let translator = create_translator(&mock_server, CallPolicy::translation(Duration::ZERO));

        let start = std::time::Instant::now();
        let result = translator
            .translate("유심", Language::KOREAN, Language::ENGLISH)
            .await;
        let elapsed = start.elapsed();

        let err = result.expect_err("Should fail after exhausting retries");
        assert!(err.to_string().contains("500"), "Error should mention 500: {}", err);

        // Linear backoff: 1s + 2s
        assert!(
            elapsed >= Duration::from_secs(3),
            "Should have spent time retrying, got {:?}",
            elapsed
        );
    }
}
