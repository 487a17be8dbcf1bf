//! 意图分类与实体抽取
//!
//! 两者都由语言模型以 JSON 形式作答。模型回复允许包裹在 Markdown 代码块中，
//! 无法解析时分别返回 `AppError::Classification` / `AppError::Extraction`。

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::{ExtractedEntities, Intent};
use crate::services::llm::LanguageModel;

/// 意图分类器
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, question: &str) -> Result<Intent>;
}

/// 实体抽取器
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, question: &str) -> Result<ExtractedEntities>;
}

/// 从模型回复中取出 JSON 对象
pub fn parse_json_reply(reply: &str) -> std::result::Result<Value, String> {
    let trimmed = reply.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    if let Ok(value) = serde_json::from_str(unfenced) {
        return Ok(value);
    }

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str(&unfenced[start..=end]).map_err(|e| e.to_string())
        }
        _ => Err(format!("no JSON object in reply: {}", unfenced)),
    }
}

/// 基于语言模型的意图分类器
pub struct LlmIntentClassifier {
    model: Arc<dyn LanguageModel>,
}

impl LlmIntentClassifier {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    fn prompt(question: &str) -> String {
        let intents = Intent::ALL
            .iter()
            .enumerate()
            .map(|(i, intent)| format!("{}. {}: {}", i + 1, intent.as_str(), intent.description()))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are an operational assistant for an Airline Company.\n\
             Classify the user query into strictly one of these intents:\n\n\
             {}\n\n\
             Reply with JSON only, in the form {{\"intent\": \"<intent>\"}}.\n\n\
             User query: {}",
            intents, question
        )
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, question: &str) -> Result<Intent> {
        let reply = self
            .model
            .generate(&Self::prompt(question))
            .await
            .map_err(|e| AppError::Classification(e.to_string()))?;
        debug!("Classifier reply: {}", reply.trim());

        match parse_json_reply(&reply) {
            Ok(Value::String(label)) => label.parse(),
            Ok(value) => value
                .get("intent")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    AppError::Classification(format!("reply has no intent field: {}", value))
                })?
                .parse(),
            // 部分模型直接回复标签本身
            Err(_) => reply.parse(),
        }
    }
}

/// 基于语言模型的实体抽取器
pub struct LlmEntityExtractor {
    model: Arc<dyn LanguageModel>,
}

impl LlmEntityExtractor {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    fn prompt(question: &str) -> String {
        format!(
            "Extract entities from the airline query to map to the database schema.\n\
             - Convert city names to airport codes (e.g., \"Chicago\" -> \"ORD\").\n\
             - Extract numerical values for min/max filters.\n\
             - If an entity is missing, return null.\n\n\
             Reply with a single JSON object using these keys:\n\
             origin (origin airport code, e.g. ORD), destination (destination airport code, e.g. LAX),\n\
             station_code (airport code for station-specific queries), flight_number (flight id),\n\
             fleet_desc (aircraft model number only, e.g. 737), record_locator (passenger PNR),\n\
             feedback_id, level (loyalty level, e.g. Gold), p_class (passenger class, e.g. Economy),\n\
             gen (generation, e.g. Millennials), min_delay (minutes), max_score (food score),\n\
             min_miles, max_miles, min_legs.\n\n\
             User query: {}",
            question
        )
    }
}

#[async_trait]
impl EntityExtractor for LlmEntityExtractor {
    async fn extract(&self, question: &str) -> Result<ExtractedEntities> {
        let reply = self
            .model
            .generate(&Self::prompt(question))
            .await
            .map_err(|e| AppError::Extraction(e.to_string()))?;
        debug!("Extractor reply: {}", reply.trim());

        let raw = parse_json_reply(&reply).map_err(AppError::Extraction)?;
        ExtractedEntities::from_raw(raw)
    }
}

/// 规则表驱动的分类与抽取，按问题子串匹配（不区分大小写）
///
/// 用于离线运行与测试，不访问任何模型。
#[derive(Default)]
pub struct StaticNlu {
    rules: Vec<(String, Intent, ExtractedEntities)>,
}

impl StaticNlu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, fragment: &str, intent: Intent, entities: ExtractedEntities) -> Self {
        self.rules
            .push((fragment.to_lowercase(), intent, entities.normalize()));
        self
    }

    fn lookup(&self, question: &str) -> Option<&(String, Intent, ExtractedEntities)> {
        let question = question.to_lowercase();
        self.rules
            .iter()
            .find(|(fragment, _, _)| question.contains(fragment.as_str()))
    }
}

#[async_trait]
impl IntentClassifier for StaticNlu {
    async fn classify(&self, question: &str) -> Result<Intent> {
        self.lookup(question)
            .map(|(_, intent, _)| *intent)
            .ok_or_else(|| AppError::Classification(format!("no rule matches: {}", question)))
    }
}

#[async_trait]
impl EntityExtractor for StaticNlu {
    async fn extract(&self, question: &str) -> Result<ExtractedEntities> {
        Ok(self
            .lookup(question)
            .map(|(_, _, entities)| entities.clone())
            .unwrap_or_default())
    }
}
