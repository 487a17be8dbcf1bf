//! 嵌入模型对比 DTO

use serde::{Deserialize, Serialize};

use crate::services::ComparisonEntry;

/// 对比请求
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CompareRequest {
    pub question: String,
}

/// 对比响应，每个对比语料一条
#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub question: String,
    pub entries: Vec<ComparisonEntry>,
}
