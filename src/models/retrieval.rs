use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::models::record::Record;

/// 向量索引不可用时返回的占位片段
pub const VECTOR_UNAVAILABLE_PLACEHOLDER: &str = "Error: Database not loaded.";

/// 检索模式，每个请求选择一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// 仅图查询
    Baseline,
    /// 仅向量检索
    Embeddings,
    /// 两路并行
    #[default]
    Hybrid,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Baseline => "baseline",
            RetrievalMode::Embeddings => "embeddings",
            RetrievalMode::Hybrid => "hybrid",
        }
    }

    pub fn uses_graph(&self) -> bool {
        matches!(self, RetrievalMode::Baseline | RetrievalMode::Hybrid)
    }

    pub fn uses_vector(&self) -> bool {
        matches!(self, RetrievalMode::Embeddings | RetrievalMode::Hybrid)
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "baseline" => Ok(RetrievalMode::Baseline),
            "embeddings" => Ok(RetrievalMode::Embeddings),
            "hybrid" => Ok(RetrievalMode::Hybrid),
            other => Err(AppError::Validation(format!(
                "unknown retrieval mode: {}",
                other
            ))),
        }
    }
}

/// 图检索分支的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum GraphOutcome {
    /// 没有匹配的查询模板，未访问图数据库
    NoQuery,
    /// 查询成功（可能为空）
    Rows(Vec<Record>),
    /// 查询失败，已降级为无结果
    Failed(String),
}

impl GraphOutcome {
    /// 提供给合成阶段的结构化结果，失败与未路由均视为空
    pub fn rows(&self) -> Vec<Record> {
        match self {
            GraphOutcome::Rows(rows) => rows.clone(),
            GraphOutcome::NoQuery | GraphOutcome::Failed(_) => Vec::new(),
        }
    }
}

/// 向量检索分支的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum VectorOutcome {
    /// 检索成功（可能为空）
    Snippets(Vec<String>),
    /// 索引或嵌入模型不可用
    Unavailable(String),
}

impl VectorOutcome {
    /// 提供给合成阶段的片段，不可用时返回单条占位说明
    pub fn snippets(&self) -> Vec<String> {
        match self {
            VectorOutcome::Snippets(snippets) => snippets.clone(),
            VectorOutcome::Unavailable(_) => vec![VECTOR_UNAVAILABLE_PLACEHOLDER.to_string()],
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, VectorOutcome::Unavailable(_))
    }
}

/// 两路检索的汇总
///
/// `None` 表示该分支未被当前模式激活（跳过），`Some(vec![])` 表示激活但无结果。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub structured_rows: Option<Vec<Record>>,
    pub unstructured_snippets: Option<Vec<String>>,
}

impl RetrievalResult {
    pub fn from_outcomes(graph: Option<&GraphOutcome>, vector: Option<&VectorOutcome>) -> Self {
        Self {
            structured_rows: graph.map(GraphOutcome::rows),
            unstructured_snippets: vector.map(VectorOutcome::snippets),
        }
    }
}
