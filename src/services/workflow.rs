//! 问答流程图
//!
//! 流程是一个固定的有向无环图：分类 → 抽取 → 按模式分叉为图分支与向量分支 →
//! 在合成阶段汇合。合成阶段必须等待所有被激活的前驱完成。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::RetrievalMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classify,
    Extract,
    /// 模板路由
    GraphGen,
    GraphExec,
    /// 查询改写
    Rewrite,
    VectorSearch,
    Synthesize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Classify => "classify",
            Stage::Extract => "extract",
            Stage::GraphGen => "graph_gen",
            Stage::GraphExec => "graph_exec",
            Stage::Rewrite => "rewrite",
            Stage::VectorSearch => "vector_search",
            Stage::Synthesize => "synthesize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 某一检索模式下激活的阶段与边
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowPlan {
    mode: RetrievalMode,
    edges: Vec<(Stage, Stage)>,
}

impl WorkflowPlan {
    pub fn for_mode(mode: RetrievalMode) -> Self {
        let mut edges = vec![(Stage::Classify, Stage::Extract)];

        if mode.uses_graph() {
            edges.extend([
                (Stage::Extract, Stage::GraphGen),
                (Stage::GraphGen, Stage::GraphExec),
                (Stage::GraphExec, Stage::Synthesize),
            ]);
        }
        if mode.uses_vector() {
            edges.extend([
                (Stage::Extract, Stage::Rewrite),
                (Stage::Rewrite, Stage::VectorSearch),
                (Stage::VectorSearch, Stage::Synthesize),
            ]);
        }

        Self { mode, edges }
    }

    pub fn mode(&self) -> RetrievalMode {
        self.mode
    }

    pub fn edges(&self) -> &[(Stage, Stage)] {
        &self.edges
    }

    pub fn successors(&self, stage: Stage) -> Vec<Stage> {
        self.edges
            .iter()
            .filter(|(from, _)| *from == stage)
            .map(|(_, to)| *to)
            .collect()
    }

    pub fn predecessors(&self, stage: Stage) -> Vec<Stage> {
        self.edges
            .iter()
            .filter(|(_, to)| *to == stage)
            .map(|(from, _)| *from)
            .collect()
    }

    pub fn contains(&self, stage: Stage) -> bool {
        stage == Stage::Classify || self.edges.iter().any(|(_, to)| *to == stage)
    }

    /// 拓扑序的激活阶段
    pub fn stages(&self) -> Vec<Stage> {
        [
            Stage::Classify,
            Stage::Extract,
            Stage::GraphGen,
            Stage::GraphExec,
            Stage::Rewrite,
            Stage::VectorSearch,
            Stage::Synthesize,
        ]
        .into_iter()
        .filter(|stage| self.contains(*stage))
        .collect()
    }
}

/// 单个阶段的执行时间
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StageTiming {
    pub fn new(stage: Stage, started_at: DateTime<Utc>) -> Self {
        Self {
            stage,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
