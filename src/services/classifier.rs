//! Blog category classification
//!
//! A `CategoryClassifier` maps a blog's title and body onto the fixed
//! [`BlogCategory`] vocabulary. The production implementation asks an
//! OpenAI-compatible `responses` endpoint; any failure is reported as an
//! error and the caller decides the fallback.

use crate::config::ClassifierConfig;
use crate::models::BlogCategory;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Classifier is not configured")]
    Disabled,

    #[error("Classifier request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Classifier returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Classifier response has no text output")]
    EmptyResponse,

    #[error("Classifier answered with an unknown category: {0}")]
    UnknownCategory(String),
}

#[async_trait]
pub trait CategoryClassifier: Send + Sync {
    async fn classify(&self, title: &str, content: &str) -> Result<BlogCategory, ClassifierError>;
}

/// Build the classifier described by configuration
pub fn from_config(
    config: &ClassifierConfig,
) -> Result<Arc<dyn CategoryClassifier>, ClassifierError> {
    match config.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(Arc::new(OpenAiClassifier::new(
            config.endpoint.clone(),
            key.to_string(),
            config.model.clone(),
            Duration::from_secs(config.timeout_seconds),
        )?)),
        _ => Ok(Arc::new(DisabledClassifier)),
    }
}

/// Prompt sent to the model
pub fn build_prompt(title: &str, content: &str) -> String {
    let vocabulary: Vec<&str> = BlogCategory::ALL.iter().map(|c| c.as_str()).collect();
    format!(
        "Classify this blog into ONE category only:\n{}.\n\n\
         Blog:\n{}\n{}\n\n\
         Return only category name.",
        vocabulary.join(", "),
        title,
        content
    )
}

/// Classifier backed by an OpenAI-style `responses` API
pub struct OpenAiClassifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: String,
}

#[derive(Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

impl OpenAiClassifier {
    pub fn new(
        endpoint: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("inkpress/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl CategoryClassifier for OpenAiClassifier {
    async fn classify(&self, title: &str, content: &str) -> Result<BlogCategory, ClassifierError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ResponsesRequest {
                model: &self.model,
                input: build_prompt(title, content),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let reply: ResponsesReply = response.json().await?;
        let text = reply
            .output
            .first()
            .and_then(|item| item.content.first())
            .and_then(|part| part.text.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ClassifierError::EmptyResponse)?;

        text.parse()
            .map_err(|_| ClassifierError::UnknownCategory(text.to_string()))
    }
}

/// Used when no API key is configured; every call fails
pub struct DisabledClassifier;

#[async_trait]
impl CategoryClassifier for DisabledClassifier {
    async fn classify(
        &self,
        _title: &str,
        _content: &str,
    ) -> Result<BlogCategory, ClassifierError> {
        Err(ClassifierError::Disabled)
    }
}
