//! 向量索引服务

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSnippet {
    /// 插入序号
    pub id: u64,
    pub score: f32,
    pub text: String,
}

/// 内存向量索引（精确余弦相似度）
///
/// 分数相同的条目按插入顺序返回。
pub struct SnippetVectorIndex {
    entries: DashMap<u64, (String, Vec<f32>)>,
    next_id: AtomicU64,
    dimension: usize,
}

impl SnippetVectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            entries: DashMap::new(),
            next_id: AtomicU64::new(0),
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(AppError::VectorIndex(format!(
                "vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimension
            )));
        }
        Ok(())
    }

    pub fn add(&self, text: &str, vector: &[f32]) -> Result<u64> {
        self.check_dimension(vector)?;

        let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst);
        self.entries.insert(id, (text.to_string(), vector.to_vec()));
        Ok(id)
    }

    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredSnippet>> {
        self.check_dimension(query)?;

        let mut results: Vec<ScoredSnippet> = self
            .entries
            .iter()
            .map(|entry| {
                let (id, (text, vector)) = entry.pair();
                ScoredSnippet {
                    id: *id,
                    score: Self::cosine_similarity(query, vector),
                    text: text.clone(),
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        results.truncate(limit);

        Ok(results)
    }

    /// 按插入顺序导出全部条目
    pub fn entries(&self) -> Vec<(String, Vec<f32>)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.into_iter().map(|(_, entry)| entry).collect()
    }
}
