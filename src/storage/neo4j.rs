//! Neo4j 存储层
//!
//! 使用 Neo4j HTTP 事务接口执行 Cypher 查询。每次 `execute` 都是一个独立的
//! 自动提交事务，连接在请求结束时释放，查询失败也不例外。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::config::GraphConfig;
use crate::error::{AppError, Result};
use crate::models::record::record_from_row;
use crate::models::{QueryParams, Record};
use crate::storage::graph::GraphStore;

#[derive(Serialize)]
struct Statement<'a> {
    statement: &'a str,
    parameters: &'a QueryParams,
}

#[derive(Serialize)]
struct CommitRequest<'a> {
    statements: Vec<Statement<'a>>,
}

#[derive(Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<Neo4jError>,
}

#[derive(Deserialize)]
struct StatementResult {
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<RowData>,
}

#[derive(Deserialize)]
struct RowData {
    row: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct Neo4jError {
    code: String,
    message: String,
}

/// Neo4j HTTP 客户端
#[derive(Clone)]
pub struct Neo4jHttpStore {
    /// 配置
    config: GraphConfig,
    /// HTTP 客户端
    http_client: reqwest::Client,
}

impl Neo4jHttpStore {
    /// 创建新的存储客户端
    pub fn new(config: &GraphConfig) -> Result<Self> {
        let timeout = if config.request_timeout == 0 {
            30
        } else {
            config.request_timeout
        };
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            config: GraphConfig {
                url: config.url.trim_end_matches('/').to_string(),
                ..config.clone()
            },
            http_client,
        })
    }

    /// 事务提交地址
    fn commit_url(&self) -> String {
        format!("{}/db/{}/tx/commit", self.config.url, self.config.database)
    }

    /// 测试连接
    pub async fn verify_connectivity(&self) -> Result<()> {
        let response = self
            .http_client
            .get(format!("{}/", self.config.url))
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(|e| AppError::Connection(format!("连接 Neo4j 失败: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Connection(format!(
                "无法连接到 Neo4j: HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for Neo4jHttpStore {
    async fn execute(&self, query: &str, params: &QueryParams) -> Result<Vec<Record>> {
        debug!("Executing Cypher against {}: {}", self.config.database, query);

        let payload = CommitRequest {
            statements: vec![Statement {
                statement: query,
                parameters: params,
            }],
        };

        let response = self
            .http_client
            .post(self.commit_url())
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Connection(format!("Cypher 请求失败: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Graph(format!("HTTP {}: {}", status, error_text)));
        }

        let body: CommitResponse = response
            .json()
            .await
            .map_err(|e| AppError::Graph(format!("解析响应失败: {}", e)))?;

        if let Some(error) = body.errors.first() {
            return Err(AppError::Graph(format!("{}: {}", error.code, error.message)));
        }

        let Some(result) = body.results.into_iter().next() else {
            return Ok(Vec::new());
        };

        Ok(result
            .data
            .into_iter()
            .map(|data| record_from_row(&result.columns, data.row))
            .collect())
    }
}
