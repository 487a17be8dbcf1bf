//! 可观测性模块
//!
//! 提供 Prometheus 文本格式指标、结构化日志和健康检查。

use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::config::LoggingConfig;
use crate::error::{AppError, Result};
use crate::models::{GraphOutcome, RetrievalMode, VectorOutcome};

// ===== Metrics =====

/// 应用指标
#[derive(Default)]
pub struct AppMetrics {
    pub http_requests_total: AtomicU64,
    pub http_request_duration_sum: AtomicU64,
    pub active_connections: AtomicI64,
    pub asks_baseline_total: AtomicU64,
    pub asks_embeddings_total: AtomicU64,
    pub asks_hybrid_total: AtomicU64,
    pub ask_latency_sum: AtomicU64,
    pub ask_errors_total: AtomicU64,
    pub graph_no_template_total: AtomicU64,
    pub graph_failures_total: AtomicU64,
    pub vector_unavailable_total: AtomicU64,
    pub synthesis_failures_total: AtomicU64,
}

impl AppMetrics {
    /// 记录 HTTP 请求
    pub fn record_http_request(&self, duration_ms: u64) {
        self.http_requests_total.fetch_add(1, Ordering::SeqCst);
        self.http_request_duration_sum
            .fetch_add(duration_ms, Ordering::SeqCst);
    }

    /// 记录活跃连接
    pub fn record_connection(&self, delta: i64) {
        self.active_connections.fetch_add(delta, Ordering::SeqCst);
    }

    /// 记录一次完成的问答
    pub fn record_ask(&self, mode: RetrievalMode, duration_ms: u64) {
        let counter = match mode {
            RetrievalMode::Baseline => &self.asks_baseline_total,
            RetrievalMode::Embeddings => &self.asks_embeddings_total,
            RetrievalMode::Hybrid => &self.asks_hybrid_total,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.ask_latency_sum.fetch_add(duration_ms, Ordering::SeqCst);
    }

    /// 记录问答失败（分类 / 抽取等）
    pub fn record_ask_error(&self) {
        self.ask_errors_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_graph_outcome(&self, outcome: &GraphOutcome) {
        match outcome {
            GraphOutcome::NoQuery => self.graph_no_template_total.fetch_add(1, Ordering::SeqCst),
            GraphOutcome::Failed(_) => self.graph_failures_total.fetch_add(1, Ordering::SeqCst),
            GraphOutcome::Rows(_) => return,
        };
    }

    pub fn record_vector_outcome(&self, outcome: &VectorOutcome) {
        if outcome.is_unavailable() {
            self.vector_unavailable_total.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn record_synthesis_failure(&self) {
        self.synthesis_failures_total.fetch_add(1, Ordering::SeqCst);
    }

    /// 生成 Prometheus 格式指标
    pub fn gather(&self) -> String {
        let asks = [
            ("baseline", self.asks_baseline_total.load(Ordering::SeqCst)),
            ("embeddings", self.asks_embeddings_total.load(Ordering::SeqCst)),
            ("hybrid", self.asks_hybrid_total.load(Ordering::SeqCst)),
        ];
        let asks_count: u64 = asks.iter().map(|(_, n)| n).sum();
        let asks_by_mode = asks
            .iter()
            .map(|(mode, n)| format!("aerograph_asks_total{{mode=\"{}\"}} {}", mode, n))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"# HELP http_requests_total Total HTTP requests
# TYPE http_requests_total counter
http_requests_total {}
# HELP http_request_duration_seconds HTTP request duration in seconds
# TYPE http_request_duration_seconds histogram
http_request_duration_seconds_sum {}
http_request_duration_seconds_count {}
# HELP active_connections Active HTTP connections
# TYPE active_connections gauge
active_connections {}
# HELP aerograph_asks_total Answered questions by retrieval mode
# TYPE aerograph_asks_total counter
{}
# HELP aerograph_ask_latency_seconds End-to-end answer latency in seconds
# TYPE aerograph_ask_latency_seconds histogram
aerograph_ask_latency_seconds_sum {}
aerograph_ask_latency_seconds_count {}
# HELP aerograph_ask_errors_total Questions that failed before synthesis
# TYPE aerograph_ask_errors_total counter
aerograph_ask_errors_total {}
# HELP aerograph_graph_no_template_total Graph branches with no matching template
# TYPE aerograph_graph_no_template_total counter
aerograph_graph_no_template_total {}
# HELP aerograph_graph_failures_total Graph queries that failed
# TYPE aerograph_graph_failures_total counter
aerograph_graph_failures_total {}
# HELP aerograph_vector_unavailable_total Vector searches with no usable index
# TYPE aerograph_vector_unavailable_total counter
aerograph_vector_unavailable_total {}
# HELP aerograph_synthesis_failures_total Answer generations that failed
# TYPE aerograph_synthesis_failures_total counter
aerograph_synthesis_failures_total {}
"#,
            self.http_requests_total.load(Ordering::SeqCst),
            self.http_request_duration_sum.load(Ordering::SeqCst) as f64 / 1000.0,
            self.http_requests_total.load(Ordering::SeqCst),
            self.active_connections.load(Ordering::SeqCst),
            asks_by_mode,
            self.ask_latency_sum.load(Ordering::SeqCst) as f64 / 1000.0,
            asks_count,
            self.ask_errors_total.load(Ordering::SeqCst),
            self.graph_no_template_total.load(Ordering::SeqCst),
            self.graph_failures_total.load(Ordering::SeqCst),
            self.vector_unavailable_total.load(Ordering::SeqCst),
            self.synthesis_failures_total.load(Ordering::SeqCst),
        )
    }
}

// ===== Health Check =====

/// 健康检查状态
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: f64,
    pub checks: Vec<HealthCheck>,
}

/// 单个健康检查项
#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    pub message: Option<String>,
    pub latency_ms: Option<u64>,
}

/// 健康检查结果
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    pub name: String,
    pub healthy: bool,
    pub message: String,
    pub latency_ms: u64,
}

/// 可观测性状态
#[derive(Clone)]
pub struct ObservabilityState {
    pub metrics: Arc<AppMetrics>,
    pub health_checks: Arc<Mutex<Vec<HealthCheckResult>>>,
    pub start_time: DateTime<Utc>,
    pub version: String,
}

impl ObservabilityState {
    pub fn new(version: String) -> Self {
        Self::with_metrics(version, Arc::new(AppMetrics::default()))
    }

    pub fn with_metrics(version: String, metrics: Arc<AppMetrics>) -> Self {
        Self {
            metrics,
            health_checks: Arc::new(Mutex::new(Vec::new())),
            start_time: Utc::now(),
            version,
        }
    }

    /// 添加健康检查结果，同名项覆盖
    pub async fn add_health_check(&self, result: HealthCheckResult) {
        let mut checks = self.health_checks.lock().await;
        checks.retain(|c| c.name != result.name);
        checks.push(result);
    }

    /// 获取应用正常运行时间
    pub fn uptime_seconds(&self) -> f64 {
        (Utc::now() - self.start_time).num_seconds() as f64
    }
}

fn status_label(healthy: bool) -> String {
    (if healthy { "healthy" } else { "unhealthy" }).to_string()
}

/// 获取完整健康状态
pub async fn health_check(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    let checks = state.health_checks.lock().await;
    let all_healthy = checks.iter().all(|c| c.healthy);

    let health_status = HealthStatus {
        status: status_label(all_healthy),
        timestamp: Utc::now().to_rfc3339(),
        version: state.version.clone(),
        uptime_seconds: state.uptime_seconds(),
        checks: checks
            .iter()
            .map(|c| HealthCheck {
                name: c.name.clone(),
                status: status_label(c.healthy),
                message: Some(c.message.clone()),
                latency_ms: Some(c.latency_ms),
            })
            .collect(),
    };

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_status))
}

/// 简单存活检查
pub async fn liveness() -> impl IntoResponse {
    "OK"
}

/// 就绪检查
pub async fn readiness(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    let checks = state.health_checks.lock().await;
    if checks.iter().all(|c| c.healthy) {
        (StatusCode::OK, "Ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Not Ready")
    }
}

/// Prometheus 指标端点
pub async fn metrics(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    (StatusCode::OK, state.metrics.gather())
}

/// 版本信息端点
pub async fn version(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "version": state.version,
        "uptime_seconds": state.uptime_seconds(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// 创建可观测性路由
pub fn create_observability_router(state: Arc<ObservabilityState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/metrics", get(metrics))
        .route("/version", get(version))
        .with_state(state)
}

/// 记录请求指标的中间件
pub async fn track_requests(
    State(state): State<Arc<ObservabilityState>>,
    req: Request,
    next: Next,
) -> Response {
    let start = std::time::Instant::now();
    state.metrics.record_connection(1);

    let response = next.run(req).await;

    state
        .metrics
        .record_http_request(start.elapsed().as_millis() as u64);
    state.metrics.record_connection(-1);

    response
}

// ===== Structured Logging =====

/// 初始化日志
///
/// `RUST_LOG` 优先于配置中的级别。配置了 `log_dir` 时按天滚动写入文件，
/// 否则写到标准输出。返回的 guard 必须持有到进程结束。
pub fn init_tracing(config: &LoggingConfig) -> Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| AppError::Config(format!("invalid log level '{}': {}", config.level, e)))?;

    let (writer, guard) = match &config.log_dir {
        Some(dir) => {
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "aerograph.log"))
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.structured {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(writer))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(writer),
            )
            .try_init()
    };
    installed.map_err(|e| AppError::Config(format!("failed to install tracing subscriber: {}", e)))?;

    Ok(guard)
}
