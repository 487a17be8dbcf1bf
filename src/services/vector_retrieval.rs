//! 向量检索分支
//!
//! 先改写问题，再检索片段语料。索引未加载或检索失败时返回不可用状态，
//! 由合成阶段呈现占位说明。

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::DEFAULT_TOP_K;
use crate::index::snippet::SnippetSearch;
use crate::models::VectorOutcome;
use crate::services::rewriter::QueryRewriter;
use crate::services::workflow::{Stage, StageTiming};

/// 向量分支的产出：改写后的问题、检索结果与两个阶段的耗时
#[derive(Debug, Clone, PartialEq)]
pub struct VectorBranch {
    pub rewritten_query: String,
    pub outcome: VectorOutcome,
    pub timings: [StageTiming; 2],
}

pub struct VectorRetrieval {
    rewriter: Arc<dyn QueryRewriter>,
    index: Option<Arc<dyn SnippetSearch>>,
    top_k: usize,
}

impl VectorRetrieval {
    pub fn new(rewriter: Arc<dyn QueryRewriter>, index: Option<Arc<dyn SnippetSearch>>) -> Self {
        Self {
            rewriter,
            index,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// 只做改写
    pub async fn rewrite(&self, question: &str) -> String {
        self.rewriter.rewrite(question).await
    }

    /// 检索已改写的问题
    pub async fn search(&self, rewritten: &str) -> VectorOutcome {
        let Some(index) = &self.index else {
            warn!("Snippet index is not loaded");
            return VectorOutcome::Unavailable("snippet index is not loaded".to_string());
        };

        match index.search(rewritten, self.top_k).await {
            Ok(snippets) => {
                debug!("Vector search returned {} snippets", snippets.len());
                VectorOutcome::Snippets(snippets)
            }
            Err(e) => {
                warn!("Vector search failed: {}", e);
                VectorOutcome::Unavailable(e.to_string())
            }
        }
    }

    /// 改写并检索
    pub async fn retrieve(&self, question: &str) -> VectorBranch {
        let t = Utc::now();
        let rewritten_query = self.rewrite(question).await;
        let rewritten = StageTiming::new(Stage::Rewrite, t);

        let t = Utc::now();
        let outcome = self.search(&rewritten_query).await;
        let searched = StageTiming::new(Stage::VectorSearch, t);

        VectorBranch {
            rewritten_query,
            outcome,
            timings: [rewritten, searched],
        }
    }
}
