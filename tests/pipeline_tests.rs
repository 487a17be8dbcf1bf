// Integration tests for the answering pipeline
//
// Tests cover:
// - Mode-dependent branch activation and skip markers
// - Hybrid join barrier under delayed branches
// - Degradation of graph and vector branches
// - Terminal synthesis failures
// - Snippet corpus serialization and retrieval

use aerograph::error::{AppError, Result};
use aerograph::index::{EmbeddingModel, HashingEmbeddingModel, SnippetIndex, SnippetSearch};
use aerograph::models::record::{FieldValue, record};
use aerograph::models::{
    ExtractedEntities, FlightNumber, GraphOutcome, Intent, JourneyRecord, QueryParams, Record,
    RetrievalMode, TemplateId, VECTOR_UNAVAILABLE_PLACEHOLDER, VectorOutcome,
};
use aerograph::observability::AppMetrics;
use aerograph::services::{
    AnswerTrace, GraphRetrieval, KeywordQueryRewriter, LanguageModel, ModelRegistry, Orchestrator,
    Stage, StaticNlu, TemplateRouter, VectorRetrieval,
};
use aerograph::storage::GraphStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const MODEL: &str = "Stub Model";

// ============ Stub capabilities ============

#[derive(Default)]
struct StubGraphStore {
    rows: Vec<Record>,
    fail: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, QueryParams)>>,
}

#[async_trait]
impl GraphStore for StubGraphStore {
    async fn execute(&self, query: &str, params: &QueryParams) -> Result<Vec<Record>> {
        self.calls.lock().push((query.to_string(), params.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AppError::Connection("neo4j unreachable".to_string()));
        }
        Ok(self.rows.clone())
    }
}

#[derive(Default)]
struct StubSnippetSearch {
    snippets: Vec<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

#[async_trait]
impl SnippetSearch for StubSnippetSearch {
    async fn search(&self, _text: &str, k: usize) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.snippets.iter().take(k).cloned().collect())
    }
}

struct StubModel {
    reply: std::result::Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl StubModel {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        self.reply.clone().map_err(AppError::Model)
    }
}

fn nlu() -> Arc<StaticNlu> {
    Arc::new(
        StaticNlu::new()
            .with_rule(
                "from iax to lax",
                Intent::FlightSearch,
                ExtractedEntities {
                    origin: Some("IAX".into()),
                    destination: Some("LAX".into()),
                    ..Default::default()
                },
            )
            .with_rule(
                "flight 1878",
                Intent::FlightSearch,
                ExtractedEntities {
                    flight_number: Some(FlightNumber::Code("1878".into())),
                    ..Default::default()
                },
            )
            .with_rule(
                "flights leaving iax",
                Intent::FlightSearch,
                ExtractedEntities {
                    origin: Some("IAX".into()),
                    ..Default::default()
                },
            )
            .with_rule(
                "food",
                Intent::SatisfactionAnalysis,
                ExtractedEntities::default(),
            ),
    )
}

fn two_rows() -> Vec<Record> {
    vec![
        record([
            ("f.flight_number", FieldValue::from(1878i64)),
            ("Origin", "IAX".into()),
            ("Destination", "LAX".into()),
        ]),
        record([
            ("f.flight_number", FieldValue::from(2201i64)),
            ("Origin", "IAX".into()),
            ("Destination", "LAX".into()),
        ]),
    ]
}

fn orchestrator(
    store: Arc<StubGraphStore>,
    index: Option<Arc<dyn SnippetSearch>>,
    model: Arc<StubModel>,
) -> Orchestrator {
    let nlu = nlu();
    let mut registry = ModelRegistry::new();
    registry.register(MODEL, model);

    Orchestrator::new(
        nlu.clone(),
        nlu,
        TemplateRouter::default(),
        GraphRetrieval::new(store),
        VectorRetrieval::new(Arc::new(KeywordQueryRewriter::new()), index),
        Arc::new(registry),
    )
}

fn snippets(texts: &[&str]) -> Arc<StubSnippetSearch> {
    Arc::new(StubSnippetSearch {
        snippets: texts.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    })
}

async fn ask(orchestrator: &Orchestrator, question: &str, mode: RetrievalMode) -> AnswerTrace {
    orchestrator.answer(question, mode, MODEL).await.unwrap()
}

// ============ Mode-dependent activation ============

#[tokio::test]
async fn test_baseline_scenario_prompt_contains_rows_and_skip_marker() {
    let store = Arc::new(StubGraphStore {
        rows: two_rows(),
        ..Default::default()
    });
    let index = snippets(&["unused"]);
    let model = StubModel::replying("Two flights: 1878 and 2201.\n");
    let orchestrator = orchestrator(store.clone(), Some(index.clone()), model.clone());

    let trace = ask(&orchestrator, "Find flights from IAX to LAX", RetrievalMode::Baseline).await;

    assert_eq!(trace.answer, "Two flights: 1878 and 2201.");
    assert_eq!(trace.intent, Intent::FlightSearch);
    assert_eq!(
        trace.routing.as_ref().and_then(|r| r.template()),
        Some(TemplateId::RouteFlights)
    );
    assert_eq!(trace.retrieval.structured_rows.as_ref().map(Vec::len), Some(2));
    assert_eq!(trace.retrieval.unstructured_snippets, None);

    assert!(trace.prompt.contains("\"f.flight_number\":1878"));
    assert!(trace.prompt.contains("\"f.flight_number\":2201"));
    assert!(trace.prompt.contains("Skipped (Mode: Baseline Only)"));
    assert_eq!(model.prompts.lock().as_slice(), [trace.prompt.clone()]);

    assert_eq!(index.calls.load(Ordering::SeqCst), 0);
    let calls = store.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.get("origin"), Some(&json!("IAX")));
    assert_eq!(calls[0].1.get("destination"), Some(&json!("LAX")));
}

#[tokio::test]
async fn test_embeddings_mode_never_calls_graph() {
    let store = Arc::new(StubGraphStore {
        rows: two_rows(),
        ..Default::default()
    });
    let index = snippets(&["Passenger A liked the food."]);
    let orchestrator = orchestrator(store.clone(), Some(index.clone()), StubModel::replying("ok"));

    let trace = ask(&orchestrator, "Find flights from IAX to LAX", RetrievalMode::Embeddings).await;

    assert!(store.calls.lock().is_empty());
    assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    assert!(trace.routing.is_none());
    assert!(trace.graph_outcome.is_none());
    assert!(trace.prompt.contains("Skipped (Mode: Embeddings Only)"));
    assert!(trace.prompt.contains("Passenger A liked the food."));
    assert!(trace.stage(Stage::GraphExec).is_none());
}

#[tokio::test]
async fn test_hybrid_waits_for_both_delayed_branches() {
    let store = Arc::new(StubGraphStore {
        rows: two_rows(),
        delay: Some(Duration::from_millis(120)),
        ..Default::default()
    });
    let index = Arc::new(StubSnippetSearch {
        snippets: vec!["snippet".to_string()],
        delay: Some(Duration::from_millis(60)),
        ..Default::default()
    });
    let orchestrator = orchestrator(store.clone(), Some(index.clone()), StubModel::replying("ok"));

    let trace = ask(&orchestrator, "Find flights from IAX to LAX", RetrievalMode::Hybrid).await;

    assert_eq!(store.calls.lock().len(), 1);
    assert_eq!(index.calls.load(Ordering::SeqCst), 1);

    let extract = trace.stage(Stage::Extract).unwrap();
    let graph = trace.stage(Stage::GraphExec).unwrap();
    let vector = trace.stage(Stage::VectorSearch).unwrap();
    let synthesize = trace.stage(Stage::Synthesize).unwrap();

    // 分支在抽取之后开始
    assert!(trace.stage(Stage::GraphGen).unwrap().started_at >= extract.finished_at);
    assert!(trace.stage(Stage::Rewrite).unwrap().started_at >= extract.finished_at);
    // 合成在两条分支都结束之后开始
    assert!(synthesize.started_at >= graph.finished_at);
    assert!(synthesize.started_at >= vector.finished_at);
    // 两条分支并发
    assert!(vector.started_at < graph.finished_at);

    assert!(trace.prompt.contains("\"f.flight_number\":1878"));
    assert!(trace.prompt.contains("snippet"));
    assert!(!trace.prompt.contains("Skipped ("));
}

// ============ Degradation ============

#[tokio::test]
async fn test_graph_failure_degrades_without_affecting_vector_branch() {
    let store = Arc::new(StubGraphStore {
        fail: true,
        ..Default::default()
    });
    let index = snippets(&["The flight was on time."]);
    let orchestrator = orchestrator(store, Some(index), StubModel::replying("answer"));

    let trace = ask(&orchestrator, "Find flights from IAX to LAX", RetrievalMode::Hybrid).await;

    assert!(matches!(trace.graph_outcome, Some(GraphOutcome::Failed(_))));
    assert_eq!(trace.retrieval.structured_rows, Some(vec![]));
    assert_eq!(
        trace.retrieval.unstructured_snippets,
        Some(vec!["The flight was on time.".to_string()])
    );
    assert!(trace.prompt.contains("No data found."));
    assert_eq!(trace.answer, "answer");
}

#[tokio::test]
async fn test_empty_results_are_framed_as_no_data_found() {
    let store = Arc::new(StubGraphStore::default());
    let index = snippets(&[]);
    let orchestrator = orchestrator(store.clone(), Some(index.clone()), StubModel::replying("none"));

    let trace = ask(&orchestrator, "Find flights from IAX to LAX", RetrievalMode::Hybrid).await;

    assert_eq!(store.calls.lock().len(), 1);
    assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    assert_eq!(trace.graph_outcome, Some(GraphOutcome::Rows(vec![])));
    assert_eq!(trace.vector_outcome, Some(VectorOutcome::Snippets(vec![])));
    assert_eq!(trace.retrieval.structured_rows, Some(vec![]));
    assert_eq!(trace.retrieval.unstructured_snippets, Some(vec![]));

    assert_eq!(trace.prompt.matches("No data found.").count(), 2);
    assert!(!trace.prompt.contains("Skipped ("));
    assert!(!trace.prompt.contains("Unavailable ("));
    assert!(!trace.prompt.contains("no query template"));
}

#[tokio::test]
async fn test_missing_index_yields_placeholder_snippet() {
    let store = Arc::new(StubGraphStore::default());
    let orchestrator = orchestrator(store, None, StubModel::replying("answer"));

    let trace = ask(&orchestrator, "How was the food?", RetrievalMode::Embeddings).await;

    assert!(matches!(trace.vector_outcome, Some(VectorOutcome::Unavailable(_))));
    assert_eq!(
        trace.retrieval.unstructured_snippets,
        Some(vec![VECTOR_UNAVAILABLE_PLACEHOLDER.to_string()])
    );
    assert!(trace.prompt.contains("Unavailable (Error: Database not loaded.)"));
}

#[tokio::test]
async fn test_no_template_match_still_answers_from_vector_branch() {
    let store = Arc::new(StubGraphStore {
        rows: two_rows(),
        ..Default::default()
    });
    let index = snippets(&["The flight was significantly delayed by 45 minutes."]);
    let orchestrator = orchestrator(store.clone(), Some(index), StubModel::replying("answer"));

    let trace = ask(&orchestrator, "Show flights leaving IAX", RetrievalMode::Hybrid).await;

    assert_eq!(trace.graph_outcome, Some(GraphOutcome::NoQuery));
    assert!(store.calls.lock().is_empty());
    assert!(trace.prompt.contains("No data found (no query template matched the question)."));
    assert!(trace.prompt.contains("significantly delayed by 45 minutes"));
    assert_eq!(trace.answer, "answer");
}

#[tokio::test]
async fn test_flight_number_is_bound_as_integer() {
    let store = Arc::new(StubGraphStore::default());
    let orchestrator = orchestrator(store.clone(), None, StubModel::replying("answer"));

    let trace = ask(&orchestrator, "Details for flight 1878", RetrievalMode::Baseline).await;

    assert_eq!(trace.entities.flight_number, Some(FlightNumber::Number(1878)));
    assert_eq!(
        trace.routing.as_ref().and_then(|r| r.template()),
        Some(TemplateId::FlightDetails)
    );
    assert_eq!(store.calls.lock()[0].1.get("flight_number"), Some(&json!(1878)));
}

// ============ Terminal failures ============

#[tokio::test]
async fn test_synthesis_failure_is_the_final_answer() {
    let store = Arc::new(StubGraphStore {
        rows: two_rows(),
        ..Default::default()
    });
    let orchestrator = orchestrator(store, None, StubModel::failing("quota exceeded"));

    let trace = ask(&orchestrator, "Find flights from IAX to LAX", RetrievalMode::Baseline).await;

    assert!(trace.synthesis_failed);
    assert!(trace.answer.starts_with("Error during synthesis:"));
    assert!(trace.answer.contains("quota exceeded"));
}

#[tokio::test]
async fn test_unknown_model_selector_is_a_synthesis_failure() {
    let orchestrator = orchestrator(
        Arc::new(StubGraphStore::default()),
        None,
        StubModel::replying("unused"),
    );

    let trace = orchestrator
        .answer("Find flights from IAX to LAX", RetrievalMode::Baseline, "Unknown-13B")
        .await
        .unwrap();

    assert!(trace.synthesis_failed);
    assert!(trace.answer.starts_with("Error during synthesis:"));
}

#[tokio::test]
async fn test_classification_failure_propagates() {
    let store = Arc::new(StubGraphStore::default());
    let index = snippets(&["unused"]);
    let model = StubModel::replying("unused");
    let orchestrator = orchestrator(store.clone(), Some(index.clone()), model.clone());

    let result = orchestrator
        .answer("What is the weather on Mars?", RetrievalMode::Hybrid, MODEL)
        .await;

    assert!(matches!(result, Err(AppError::Classification(_))));
    assert!(store.calls.lock().is_empty());
    assert_eq!(index.calls.load(Ordering::SeqCst), 0);
    assert!(model.prompts.lock().is_empty());
}

// ============ Metrics ============

#[tokio::test]
async fn test_metrics_follow_outcomes() {
    let metrics = Arc::new(AppMetrics::default());
    let store = Arc::new(StubGraphStore {
        fail: true,
        ..Default::default()
    });
    let orchestrator =
        orchestrator(store, None, StubModel::failing("down")).with_metrics(metrics.clone());

    ask(&orchestrator, "Find flights from IAX to LAX", RetrievalMode::Hybrid).await;
    let _ = orchestrator
        .answer("unclassifiable", RetrievalMode::Hybrid, MODEL)
        .await;

    let output = metrics.gather();
    assert!(output.contains("aerograph_asks_total{mode=\"hybrid\"} 1"));
    assert!(output.contains("aerograph_ask_errors_total 1"));
    assert!(output.contains("aerograph_graph_failures_total 1"));
    assert!(output.contains("aerograph_vector_unavailable_total 1"));
    assert!(output.contains("aerograph_synthesis_failures_total 1"));
}

// ============ Snippet corpus ============

fn journey(passenger_id: &str, food_score: i64, delay_minutes: i64) -> JourneyRecord {
    JourneyRecord {
        passenger_id: passenger_id.into(),
        generation: "Gen X".into(),
        loyalty: "Silver".into(),
        passenger_class: "Business".into(),
        flight_number: "2201".into(),
        fleet: "A320-200".into(),
        origin: "IAX".into(),
        destination: "LAX".into(),
        miles: 1745,
        legs: None,
        food_score,
        delay_minutes,
    }
}

#[tokio::test]
async fn test_seeded_corpus_retrieves_excellent_food_snippet() {
    let embedder: Arc<dyn EmbeddingModel> = Arc::new(HashingEmbeddingModel::new(384));
    let records = vec![journey("QX1", 2, 50), journey("QX2", 9, 0), journey("QX3", 5, 12)];
    let index: Arc<dyn SnippetSearch> = Arc::new(SnippetIndex::build(&records, embedder).await.unwrap());

    let orchestrator = orchestrator(
        Arc::new(StubGraphStore::default()),
        Some(index),
        StubModel::replying("QX2 enjoyed the food."),
    );

    let trace = ask(&orchestrator, "Which passengers said the food was delicious?", RetrievalMode::Embeddings).await;

    assert_eq!(
        trace.rewritten_query.as_deref(),
        Some("The food was delicious and excellent")
    );
    let top = &trace.retrieval.unstructured_snippets.as_ref().unwrap()[0];
    assert!(top.contains("delicious and excellent (rated 9/10)"));
    assert!(top.contains("The flight was on time."));
}
