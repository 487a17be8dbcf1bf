//! 问答 DTO
//!
//! 定义问答、路由与模型列表的请求和响应数据结构。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ExtractedEntities, Intent, RoutingDecision};
use crate::services::AnswerTrace;

/// 问答请求
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AskRequest {
    /// 用户问题
    pub question: String,
    /// 检索模式: baseline / embeddings / hybrid，默认 hybrid
    pub mode: Option<String>,
    /// 答案生成模型，默认使用配置中的模型
    pub model: Option<String>,
}

/// 问答响应
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub trace: AnswerTrace,
}

/// 路由请求
#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub intent: String,
    #[serde(default)]
    pub entities: Value,
}

/// 路由响应
#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub intent: Intent,
    pub entities: ExtractedEntities,
    pub decision: RoutingDecision,
}

/// 模型列表响应
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub default_model: String,
}
