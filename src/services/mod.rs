//! 服务模块

pub mod comparison;
pub mod graph_retrieval;
pub mod llm;
pub mod nlu;
pub mod orchestrator;
pub mod rewriter;
pub mod router;
pub mod vector_retrieval;
pub mod workflow;

pub use comparison::{ComparisonEntry, EmbeddingComparison};
pub use graph_retrieval::GraphRetrieval;
pub use llm::{LanguageModel, ModelProvider, ModelRegistry};
pub use nlu::{EntityExtractor, IntentClassifier, LlmEntityExtractor, LlmIntentClassifier, StaticNlu};
pub use orchestrator::{AnswerTrace, Orchestrator, build_synthesis_prompt};
pub use rewriter::{KeywordQueryRewriter, LlmQueryRewriter, QueryRewriter};
pub use router::TemplateRouter;
pub use vector_retrieval::VectorRetrieval;
pub use workflow::{Stage, StageTiming, WorkflowPlan};
