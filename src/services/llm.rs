//! 语言模型服务
//!
//! 答案生成、意图分类、实体抽取和查询改写共用同一个文本生成接口。
//! 模型通过显示名称选择，由 [`ModelRegistry`] 按配置构建。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::config::LlmConfig;
use crate::error::{AppError, Result};

/// Gemini 显示名称
pub const GEMINI_FLASH: &str = "Gemini Flash";
/// Mistral 显示名称
pub const MISTRAL_7B: &str = "Mistral-7B";
/// Zephyr 显示名称
pub const ZEPHYR_7B: &str = "Zephyr-7B";

const MISTRAL_REPO: &str = "mistralai/Mistral-7B-Instruct-v0.2";
const ZEPHYR_REPO: &str = "HuggingFaceH4/zephyr-7b-beta";

/// 文本生成能力
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// 按名称提供语言模型
pub trait ModelProvider: Send + Sync {
    fn model(&self, name: &str) -> Result<Arc<dyn LanguageModel>>;
    fn available_models(&self) -> Vec<String>;
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    let timeout = if timeout_secs == 0 { 60 } else { timeout_secs };
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()?)
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

/// Google Gemini 客户端（temperature 固定为 0）
pub struct GeminiModel {
    client: reqwest::Client,
    base_url: String,
    model_name: String,
    api_key: String,
}

impl GeminiModel {
    pub fn new(base_url: &str, model_name: &str, api_key: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model_name: model_name.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!("Gemini request to {} ({} chars)", self.model_name, prompt.len());

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model_name
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "contents": [{"role": "user", "parts": [{"text": prompt}]}],
                "generationConfig": {"temperature": 0.0}
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Model(format!(
                "Gemini request failed ({}): {}",
                status, error_text
            )));
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AppError::Model(format!("Gemini response malformed: {}", e)))?;

        let candidate = body
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Model("Gemini returned no candidates".to_string()))?;

        Ok(candidate
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// Hugging Face 推理路由的 chat-completions 客户端
pub struct HuggingFaceChatModel {
    client: reqwest::Client,
    base_url: String,
    repo_id: String,
    token: String,
    max_new_tokens: u32,
}

impl HuggingFaceChatModel {
    pub fn new(
        base_url: &str,
        repo_id: &str,
        token: &str,
        max_new_tokens: u32,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            repo_id: repo_id.to_string(),
            token: token.to_string(),
            max_new_tokens,
        })
    }
}

#[async_trait]
impl LanguageModel for HuggingFaceChatModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!("Hugging Face request to {} ({} chars)", self.repo_id, prompt.len());

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.token)
            .json(&json!({
                "model": self.repo_id,
                "messages": [{"role": "user", "content": prompt}],
                "max_tokens": self.max_new_tokens
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Model(format!(
                "{} request failed ({}): {}",
                self.repo_id, status, error_text
            )));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Model(format!("{} response malformed: {}", self.repo_id, e)))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AppError::Model(format!("{} returned no choices", self.repo_id)))
    }
}

/// 模型注册表
///
/// 缺少凭据的后端不会注册；请求未注册的名称返回 `AppError::Model`。
#[derive(Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<dyn LanguageModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置构建注册表
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut registry = Self::new();

        if let Some(key) = config.google_api_key.as_deref().filter(|k| !k.is_empty()) {
            registry.register(
                GEMINI_FLASH,
                Arc::new(GeminiModel::new(
                    &config.gemini_base_url,
                    &config.gemini_model,
                    key,
                    config.request_timeout,
                )?),
            );
        }

        if let Some(token) = config.huggingface_token.as_deref().filter(|t| !t.is_empty()) {
            for (name, repo) in [(MISTRAL_7B, MISTRAL_REPO), (ZEPHYR_7B, ZEPHYR_REPO)] {
                registry.register(
                    name,
                    Arc::new(HuggingFaceChatModel::new(
                        &config.huggingface_base_url,
                        repo,
                        token,
                        config.max_new_tokens,
                        config.request_timeout,
                    )?),
                );
            }
        }

        Ok(registry)
    }

    pub fn register(&mut self, name: &str, model: Arc<dyn LanguageModel>) {
        self.models.insert(name.to_string(), model);
    }
}

impl ModelProvider for ModelRegistry {
    fn model(&self, name: &str) -> Result<Arc<dyn LanguageModel>> {
        self.models.get(name).cloned().ok_or_else(|| {
            AppError::Model(format!(
                "model '{}' is not available (configured: {})",
                name,
                self.available_models().join(", ")
            ))
        })
    }

    fn available_models(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }
}
