//! 片段语料索引
//!
//! 旅程记录序列化为句子后嵌入并建立索引。语料以 JSON 文件持久化，
//! 加载时校验嵌入模型与维度，避免用不同模型的向量检索。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, Result};
use crate::index::embedding::EmbeddingModel;
use crate::index::vector::SnippetVectorIndex;
use crate::models::JourneyRecord;

/// 按文本检索最相近的片段
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnippetSearch: Send + Sync {
    /// 返回至多 `k` 条片段，按相似度降序
    async fn search(&self, text: &str, k: usize) -> Result<Vec<String>>;
}

/// 持久化格式
#[derive(Debug, Serialize, Deserialize)]
pub struct SnippetCorpus {
    pub model: String,
    pub dimension: usize,
    pub snippets: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
}

pub struct SnippetIndex {
    embedder: Arc<dyn EmbeddingModel>,
    index: SnippetVectorIndex,
}

impl SnippetIndex {
    /// 由现成的片段构建索引
    pub async fn from_snippets(snippets: &[String], embedder: Arc<dyn EmbeddingModel>) -> Result<Self> {
        let index = SnippetVectorIndex::new(embedder.dimension());
        let texts: Vec<&str> = snippets.iter().map(String::as_str).collect();
        let vectors = embedder.encode_batch(&texts).await?;

        if vectors.len() != snippets.len() {
            return Err(AppError::Embedding(format!(
                "embedded {} of {} snippets",
                vectors.len(),
                snippets.len()
            )));
        }

        for (text, vector) in snippets.iter().zip(vectors.iter()) {
            index.add(text, vector)?;
        }

        Ok(Self { embedder, index })
    }

    /// 由旅程记录构建索引
    pub async fn build(records: &[JourneyRecord], embedder: Arc<dyn EmbeddingModel>) -> Result<Self> {
        let snippets: Vec<String> = records.iter().map(JourneyRecord::to_snippet).collect();
        let index = Self::from_snippets(&snippets, embedder).await?;
        info!(
            "Built snippet index with {} entries ({} dimensions)",
            index.len(),
            index.index.dimension()
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn to_corpus(&self) -> SnippetCorpus {
        let (snippets, vectors): (Vec<String>, Vec<Vec<f32>>) =
            self.index.entries().into_iter().unzip();
        SnippetCorpus {
            model: self.embedder.name().to_string(),
            dimension: self.index.dimension(),
            snippets,
            vectors,
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&self.to_corpus())?;
        std::fs::write(path, json)?;
        info!("Saved snippet corpus to {}", path.display());
        Ok(())
    }

    /// 加载语料文件；模型或维度与当前嵌入模型不一致时报错
    pub fn load(path: impl AsRef<Path>, embedder: Arc<dyn EmbeddingModel>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::VectorIndex(format!("cannot read corpus {}: {}", path.display(), e))
        })?;
        let corpus: SnippetCorpus = serde_json::from_str(&content)?;

        if corpus.dimension != embedder.dimension() || corpus.model != embedder.name() {
            return Err(AppError::VectorIndex(format!(
                "corpus was built with {} ({} dimensions), current model is {} ({} dimensions)",
                corpus.model,
                corpus.dimension,
                embedder.name(),
                embedder.dimension()
            )));
        }
        if corpus.vectors.len() != corpus.snippets.len() {
            return Err(AppError::VectorIndex(format!(
                "corpus has {} snippets but {} vectors",
                corpus.snippets.len(),
                corpus.vectors.len()
            )));
        }

        let index = SnippetVectorIndex::new(corpus.dimension);
        for (text, vector) in corpus.snippets.iter().zip(corpus.vectors.iter()) {
            index.add(text, vector)?;
        }
        info!("Loaded {} snippets from {}", index.len(), path.display());

        Ok(Self { embedder, index })
    }
}

#[async_trait]
impl SnippetSearch for SnippetIndex {
    async fn search(&self, text: &str, k: usize) -> Result<Vec<String>> {
        let query = self.embedder.encode(text).await?;
        Ok(self
            .index
            .search(&query, k)?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }
}
