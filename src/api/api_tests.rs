#[cfg(test)]
mod ask_handler_tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::api::{app_state::AppState, create_router};
    use crate::index::snippet::MockSnippetSearch;
    use crate::models::record::{FieldValue, record};
    use crate::models::{ExtractedEntities, Intent};
    use crate::observability::ObservabilityState;
    use crate::services::llm::MockLanguageModel;
    use crate::services::{
        EmbeddingComparison, GraphRetrieval, KeywordQueryRewriter, ModelRegistry, Orchestrator,
        StaticNlu, TemplateRouter, VectorRetrieval,
    };
    use crate::storage::graph::MockGraphStore;

    const MODEL: &str = "Stub Model";

    fn app() -> Router {
        create_router(app_state())
    }

    fn app_state() -> AppState {
        let nlu = Arc::new(StaticNlu::new().with_rule(
            "from iax to lax",
            Intent::FlightSearch,
            ExtractedEntities {
                origin: Some("IAX".into()),
                destination: Some("LAX".into()),
                ..Default::default()
            },
        ));

        let mut store = MockGraphStore::new();
        store.expect_execute().returning(|_, _| {
            Ok(vec![record([
                ("f.flight_number", FieldValue::from(1878i64)),
                ("Origin", "IAX".into()),
            ])])
        });

        let mut model = MockLanguageModel::new();
        model
            .expect_generate()
            .returning(|_| Ok("  Flight 1878 flies IAX to LAX.  ".to_string()));
        let mut registry = ModelRegistry::new();
        registry.register(MODEL, Arc::new(model));

        let orchestrator = Orchestrator::new(
            nlu.clone(),
            nlu,
            TemplateRouter::default(),
            GraphRetrieval::new(Arc::new(store)),
            VectorRetrieval::new(Arc::new(KeywordQueryRewriter::new()), None),
            Arc::new(registry),
        );

        let observability = Arc::new(ObservabilityState::new("test".into()));
        AppState::new(orchestrator, MODEL, observability)
    }

    async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_ask_baseline_returns_answer_and_trace() {
        let (status, body) = post(
            app(),
            "/api/v1/ask",
            json!({"question": "Find flights from IAX to LAX", "mode": "baseline"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Flight 1878 flies IAX to LAX.");
        assert_eq!(body["trace"]["mode"], "baseline");
        assert_eq!(body["trace"]["intent"], "flight_search");
        assert_eq!(body["trace"]["routing"]["template"], "route_flights");
        assert!(body["trace"]["vector_outcome"].is_null());
        assert!(
            body["trace"]["prompt"]
                .as_str()
                .unwrap()
                .contains("Skipped (Mode: Baseline Only)")
        );
    }

    #[tokio::test]
    async fn test_ask_defaults_to_hybrid() {
        let (status, body) = post(
            app(),
            "/api/v1/ask",
            json!({"question": "Find flights from IAX to LAX"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["trace"]["mode"], "hybrid");
        assert_eq!(body["trace"]["model"], MODEL);
        assert_eq!(body["trace"]["vector_outcome"]["status"], "unavailable");
    }

    #[tokio::test]
    async fn test_ask_rejects_empty_question() {
        let (status, body) = post(app(), "/api/v1/ask", json!({"question": "   "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_ask_rejects_unknown_mode() {
        let (status, _) = post(
            app(),
            "/api/v1/ask",
            json!({"question": "Find flights from IAX to LAX", "mode": "graph_only"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ask_classification_failure_is_unprocessable() {
        let (status, body) = post(
            app(),
            "/api/v1/ask",
            json!({"question": "What is the meaning of life?"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "CLASSIFICATION_FAILED");
    }

    #[tokio::test]
    async fn test_route_endpoint_is_pure() {
        let (status, body) = post(
            app(),
            "/api/v1/route",
            json!({
                "intent": "flight_search",
                "entities": {"origin": "IAX", "destination": "LAX", "flight_number": "1878"}
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["decision"]["decision"], "matched");
        assert_eq!(body["decision"]["template"], "route_flights");
        assert_eq!(body["entities"]["flight_number"], 1878);
    }

    #[tokio::test]
    async fn test_route_endpoint_no_match() {
        let (status, body) = post(
            app(),
            "/api/v1/route",
            json!({"intent": "passenger_profiling", "entities": {}}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["decision"]["decision"], "no_match");
    }

    #[tokio::test]
    async fn test_route_endpoint_unknown_intent() {
        let (status, _) = post(
            app(),
            "/api/v1/route",
            json!({"intent": "book_hotel", "entities": {}}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_models_endpoint() {
        let response = app()
            .oneshot(Request::builder().uri("/api/v1/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["models"], json!([MODEL]));
        assert_eq!(body["default_model"], MODEL);
    }

    #[tokio::test]
    async fn test_observability_routes_are_mounted() {
        let response = app()
            .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    fn corpus_returning(snippet: &'static str) -> Arc<MockSnippetSearch> {
        let mut index = MockSnippetSearch::new();
        index
            .expect_search()
            .withf(|text, k| text == "Was the food bad?" && *k == 1)
            .times(1)
            .returning(move |_, _| Ok(vec![snippet.to_string()]));
        Arc::new(index)
    }

    #[tokio::test]
    async fn test_compare_returns_top_snippet_per_corpus() {
        let comparison = EmbeddingComparison::new()
            .with_candidate("MiniLM", corpus_returning("The food was terrible and poor (rated 2/10)."))
            .with_candidate("MPNet", corpus_returning("The food was average (rated 5/10)."));
        let app = create_router(app_state().with_comparison(comparison));

        let (status, body) = post(app, "/api/v1/compare", json!({"question": " Was the food bad? "})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["question"], "Was the food bad?");
        assert_eq!(body["entries"][0]["model"], "MiniLM");
        assert_eq!(
            body["entries"][0]["top_snippet"],
            "The food was terrible and poor (rated 2/10)."
        );
        assert_eq!(body["entries"][1]["model"], "MPNet");
        assert_eq!(body["entries"][1]["top_snippet"], "The food was average (rated 5/10).");
    }

    #[tokio::test]
    async fn test_compare_without_corpora_and_empty_question() {
        let (status, body) = post(app(), "/api/v1/compare", json!({"question": "Was the food bad?"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entries"], json!([]));

        let (status, _) = post(app(), "/api/v1/compare", json!({"question": ""})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
