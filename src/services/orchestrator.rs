//! 融合编排器
//!
//! 每个请求执行一次：分类 → 抽取 → 按模式激活图分支 / 向量分支 → 合成。
//! 混合模式下两条分支并发执行，合成阶段在两者都完成后才开始。
//! 分类与抽取失败直接返回错误；检索分支失败降级；合成失败作为最终答案返回。

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ExtractedEntities, GraphOutcome, Intent, RetrievalMode, RetrievalResult, RoutingDecision,
    VECTOR_UNAVAILABLE_PLACEHOLDER, VectorOutcome,
};
use crate::observability::AppMetrics;
use crate::services::graph_retrieval::GraphRetrieval;
use crate::services::llm::ModelProvider;
use crate::services::nlu::{EntityExtractor, IntentClassifier};
use crate::services::router::TemplateRouter;
use crate::services::vector_retrieval::VectorRetrieval;
use crate::services::workflow::{Stage, StageTiming, WorkflowPlan};

/// 合成失败时答案的前缀
pub const SYNTHESIS_ERROR_PREFIX: &str = "Error during synthesis:";

/// 一次问答的完整中间状态
#[derive(Debug, Clone, Serialize)]
pub struct AnswerTrace {
    pub request_id: String,
    pub question: String,
    pub mode: RetrievalMode,
    pub model: String,
    pub intent: Intent,
    pub entities: ExtractedEntities,
    /// 图分支未激活时为 `None`
    pub routing: Option<RoutingDecision>,
    pub graph_outcome: Option<GraphOutcome>,
    pub rewritten_query: Option<String>,
    pub vector_outcome: Option<VectorOutcome>,
    pub retrieval: RetrievalResult,
    pub stages: Vec<StageTiming>,
    pub prompt: String,
    pub answer: String,
    pub synthesis_failed: bool,
}

impl AnswerTrace {
    pub fn stage(&self, stage: Stage) -> Option<&StageTiming> {
        self.stages.iter().find(|timing| timing.stage == stage)
    }
}

struct GraphBranch {
    routing: RoutingDecision,
    outcome: GraphOutcome,
    timings: [StageTiming; 2],
}

pub struct Orchestrator {
    classifier: Arc<dyn IntentClassifier>,
    extractor: Arc<dyn EntityExtractor>,
    router: TemplateRouter,
    graph: GraphRetrieval,
    vector: VectorRetrieval,
    models: Arc<dyn ModelProvider>,
    metrics: Option<Arc<AppMetrics>>,
}

impl Orchestrator {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        extractor: Arc<dyn EntityExtractor>,
        router: TemplateRouter,
        graph: GraphRetrieval,
        vector: VectorRetrieval,
        models: Arc<dyn ModelProvider>,
    ) -> Self {
        Self {
            classifier,
            extractor,
            router,
            graph,
            vector,
            models,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<AppMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn router(&self) -> &TemplateRouter {
        &self.router
    }

    pub fn models(&self) -> &Arc<dyn ModelProvider> {
        &self.models
    }

    /// 回答一个问题
    pub async fn answer(&self, question: &str, mode: RetrievalMode, model: &str) -> Result<AnswerTrace> {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("ask", request_id = %request_id, mode = %mode);

        let started = Instant::now();
        let result = self
            .run(request_id, question, mode, model)
            .instrument(span)
            .await;

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(_) => metrics.record_ask(mode, started.elapsed().as_millis() as u64),
                Err(_) => metrics.record_ask_error(),
            }
        }
        result
    }

    async fn run(
        &self,
        request_id: String,
        question: &str,
        mode: RetrievalMode,
        model: &str,
    ) -> Result<AnswerTrace> {
        let plan = WorkflowPlan::for_mode(mode);
        let mut stages = Vec::with_capacity(plan.stages().len());

        let t = Utc::now();
        let intent = self.classifier.classify(question).await?;
        stages.push(StageTiming::new(Stage::Classify, t));
        info!("Classified intent: {}", intent);

        let t = Utc::now();
        let entities = self.extractor.extract(question).await?;
        stages.push(StageTiming::new(Stage::Extract, t));
        info!("Extracted entities: {}", serde_json::to_string(&entities)?);

        let graph_branch = async {
            if !plan.contains(Stage::GraphGen) {
                return None;
            }
            let t = Utc::now();
            let routing = self.router.route(intent, &entities);
            let generated = StageTiming::new(Stage::GraphGen, t);

            let t = Utc::now();
            let outcome = self.graph.retrieve(&routing).await;
            let executed = StageTiming::new(Stage::GraphExec, t);

            Some(GraphBranch {
                routing,
                outcome,
                timings: [generated, executed],
            })
        };

        let vector_branch = async {
            if !plan.contains(Stage::Rewrite) {
                return None;
            }
            Some(self.vector.retrieve(question).await)
        };

        // 汇合点：两条分支都返回后才进入合成
        let (graph, vector) = tokio::join!(graph_branch, vector_branch);

        let (routing, graph_outcome) = match graph {
            Some(branch) => {
                stages.extend(branch.timings);
                (Some(branch.routing), Some(branch.outcome))
            }
            None => (None, None),
        };
        let (rewritten_query, vector_outcome) = match vector {
            Some(branch) => {
                stages.extend(branch.timings);
                (Some(branch.rewritten_query), Some(branch.outcome))
            }
            None => (None, None),
        };

        if let Some(metrics) = &self.metrics {
            if let Some(outcome) = &graph_outcome {
                metrics.record_graph_outcome(outcome);
            }
            if let Some(outcome) = &vector_outcome {
                metrics.record_vector_outcome(outcome);
            }
        }

        let retrieval = RetrievalResult::from_outcomes(graph_outcome.as_ref(), vector_outcome.as_ref());
        let prompt = build_synthesis_prompt(
            mode,
            question,
            graph_outcome.as_ref(),
            vector_outcome.as_ref(),
        );

        let t = Utc::now();
        let (answer, synthesis_failed) = match self.synthesize(&prompt, model).await {
            Ok(answer) => (answer, false),
            Err(e) => {
                warn!("Synthesis with {} failed: {}", model, e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_synthesis_failure();
                }
                (format!("{} {}", SYNTHESIS_ERROR_PREFIX, e), true)
            }
        };
        stages.push(StageTiming::new(Stage::Synthesize, t));
        info!("Answer ready ({} chars)", answer.len());

        Ok(AnswerTrace {
            request_id,
            question: question.to_string(),
            mode,
            model: model.to_string(),
            intent,
            entities,
            routing,
            graph_outcome,
            rewritten_query,
            vector_outcome,
            retrieval,
            stages,
            prompt,
            answer,
            synthesis_failed,
        })
    }

    async fn synthesize(&self, prompt: &str, model: &str) -> Result<String> {
        let model = self.models.model(model)?;
        let reply = model.generate(prompt).await?;
        Ok(reply.trim().to_string())
    }
}

fn structured_section(mode: RetrievalMode, outcome: Option<&GraphOutcome>) -> String {
    match outcome {
        None => format!("Skipped (Mode: {} Only)", mode_label(mode)),
        Some(GraphOutcome::NoQuery) => {
            "No data found (no query template matched the question).".to_string()
        }
        Some(GraphOutcome::Failed(_)) => "No data found.".to_string(),
        Some(GraphOutcome::Rows(rows)) if rows.is_empty() => "No data found.".to_string(),
        Some(GraphOutcome::Rows(rows)) => rows
            .iter()
            .map(|row| serde_json::to_string(row).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn unstructured_section(mode: RetrievalMode, outcome: Option<&VectorOutcome>) -> String {
    match outcome {
        None => format!("Skipped (Mode: {} Only)", mode_label(mode)),
        Some(VectorOutcome::Unavailable(_)) => {
            format!("Unavailable ({})", VECTOR_UNAVAILABLE_PLACEHOLDER)
        }
        Some(VectorOutcome::Snippets(snippets)) if snippets.is_empty() => {
            "No data found.".to_string()
        }
        Some(VectorOutcome::Snippets(snippets)) => snippets.join("\n\n"),
    }
}

fn mode_label(mode: RetrievalMode) -> &'static str {
    match mode {
        RetrievalMode::Baseline => "Baseline",
        RetrievalMode::Embeddings => "Embeddings",
        RetrievalMode::Hybrid => "Hybrid",
    }
}

/// 构建合成提示词
///
/// 未激活的分支写入 "Skipped (...)"，激活但无结果写入 "No data found"，
/// 向量索引不可用写入 "Unavailable (...)"。
pub fn build_synthesis_prompt(
    mode: RetrievalMode,
    question: &str,
    graph: Option<&GraphOutcome>,
    vector: Option<&VectorOutcome>,
) -> String {
    format!(
        "You are an advanced Airline Operations Assistant.\n\
         Answer the user's question based on the active retrieval methods.\n\n\
         MODE: {}\n\n\
         1. STRUCTURED DATABASE (Facts, numbers, flight IDs):\n{}\n\n\
         2. UNSTRUCTURED TEXT (Reviews, feedback, descriptions):\n{}\n\n\
         ### USER QUESTION\n{}\n\n\
         ### INSTRUCTIONS\n\
         - Use ONLY the provided data.\n\
         - Return answer in a user friendly manner.\n\
         - If a source says \"Skipped\", do not hallucinate data for it.\n\
         - If a source says \"Unavailable\", say that it could not be consulted.\n\
         - Prioritize Structured Data for stats/delays, and Text for sentiment.\n",
        mode.as_str().to_uppercase(),
        structured_section(mode, graph),
        unstructured_section(mode, vector),
        question,
    )
}
