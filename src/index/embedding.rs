//! 嵌入模型服务

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::config::EmbeddingConfig;
use crate::error::{AppError, Result};

#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;
    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
    fn dimension(&self) -> usize;
    /// 模型标识，写入语料文件用于加载时校验
    fn name(&self) -> &str;
}

/// 词袋哈希嵌入，离线可用
///
/// 文本转小写后按非字母数字切分，每个词经 FNV-1a 哈希落到一个维度上计数，
/// 最后做 L2 归一化。
pub struct HashingEmbeddingModel {
    dimension: usize,
    name: String,
}

impl HashingEmbeddingModel {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            name: format!("hashing-{}", dimension),
        }
    }

    fn fnv1a(token: &str) -> u64 {
        token.bytes().fold(0xcbf29ce484222325u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x100000001b3)
        })
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let slot = (Self::fnv1a(token) % self.dimension as u64) as usize;
            vector[slot] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut vector {
                *val /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingModel for HashingEmbeddingModel {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Ollama Embedding 模型客户端
pub struct OllamaEmbeddingModel {
    client: reqwest::Client,
    model_name: String,
    base_url: String,
    dimension: usize,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbeddingModel {
    pub fn new(base_url: &str, model_name: &str, dimension: usize, timeout_secs: u64) -> Result<Self> {
        let timeout = if timeout_secs == 0 { 60 } else { timeout_secs };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            client,
            model_name: model_name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            dimension,
        })
    }

    async fn embed(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&serde_json::json!({
                "model": self.model_name,
                "input": texts,
                "truncate": true
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Embedding(format!(
                "Ollama embedding failed: {}",
                error_text
            )));
        }

        let embed_response: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Ollama response malformed: {}", e)))?;

        if let Some(bad) = embed_response
            .embeddings
            .iter()
            .find(|v| v.len() != self.dimension)
        {
            return Err(AppError::Embedding(format!(
                "{} returned {} dimensions, expected {}",
                self.model_name,
                bad.len(),
                self.dimension
            )));
        }
        Ok(embed_response.embeddings)
    }
}

#[async_trait]
impl EmbeddingModel for OllamaEmbeddingModel {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(vec![text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Embedding("Ollama returned no embedding".to_string()))
    }

    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let batch_size = 32;
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(batch_size) {
            let embeddings = self.embed(chunk.to_vec()).await?;
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

pub fn create_embedding_model(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingModel>> {
    match config.backend.as_str() {
        "ollama" => Ok(Arc::new(OllamaEmbeddingModel::new(
            &config.ollama_url,
            &config.model_name,
            config.dimension,
            config.ollama_timeout,
        )?)),
        "hashing" => Ok(Arc::new(HashingEmbeddingModel::new(config.dimension))),
        other => Err(AppError::Config(format!(
            "unknown embedding backend: {}",
            other
        ))),
    }
}
