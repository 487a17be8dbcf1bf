//! 嵌入模型对比
//!
//! 同一个问题在多个片段索引上各取最相近的一条，便于比较不同嵌入模型的检索效果。

use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use crate::index::snippet::SnippetSearch;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonEntry {
    pub model: String,
    pub top_snippet: Option<String>,
}

pub struct EmbeddingComparison {
    candidates: Vec<(String, Arc<dyn SnippetSearch>)>,
}

impl EmbeddingComparison {
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }

    pub fn with_candidate(mut self, model: &str, index: Arc<dyn SnippetSearch>) -> Self {
        self.candidates.push((model.to_string(), index));
        self
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn models(&self) -> Vec<String> {
        self.candidates.iter().map(|(model, _)| model.clone()).collect()
    }

    pub async fn compare(&self, question: &str) -> Result<Vec<ComparisonEntry>> {
        let mut entries = Vec::with_capacity(self.candidates.len());
        for (model, index) in &self.candidates {
            let top_snippet = index.search(question, 1).await?.into_iter().next();
            entries.push(ComparisonEntry {
                model: model.clone(),
                top_snippet,
            });
        }
        Ok(entries)
    }
}

impl Default for EmbeddingComparison {
    fn default() -> Self {
        Self::new()
    }
}
