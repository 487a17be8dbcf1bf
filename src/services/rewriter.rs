//! 查询改写
//!
//! 向量检索前把用户问题改写为与片段语料一致的措辞。改写失败永远不会中断请求，
//! 退化为原始问题。

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::services::llm::LanguageModel;

/// 规范短语：好评
pub const GOOD_FOOD_PHRASE: &str = "The food was delicious and excellent";
/// 规范短语：差评
pub const BAD_FOOD_PHRASE: &str = "The food was terrible and poor";
/// 规范短语：一般
pub const AVERAGE_FOOD_PHRASE: &str = "The food was average";
/// 规范短语：延误
pub const LATE_PHRASE: &str = "The flight was significantly delayed";
/// 规范短语：准点
pub const ON_TIME_PHRASE: &str = "The flight was on time";

/// 查询改写器
#[async_trait]
pub trait QueryRewriter: Send + Sync {
    async fn rewrite(&self, question: &str) -> String;
}

static KEYWORD_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)\b(delicious|excellent|great|good|tasty|amazing|loved?)\b", GOOD_FOOD_PHRASE),
        (r"(?i)\b(terrible|poor|bad|awful|horrible|disgusting|complain\w*)\b", BAD_FOOD_PHRASE),
        (r"(?i)\b(average|mediocre|okay|ok|so-so)\b", AVERAGE_FOOD_PHRASE),
        (r"(?i)\b(late|delay\w*|slow)\b", LATE_PHRASE),
        (r"(?i)\b(on[- ]time|punctual)\b", ON_TIME_PHRASE),
    ]
    .into_iter()
    .filter_map(|(pattern, phrase)| Regex::new(pattern).ok().map(|re| (re, phrase)))
    .collect()
});

/// 关键词规则改写，不调用模型
///
/// 命中的规范短语按规则顺序以 ". " 连接；无命中时原样返回问题。
#[derive(Debug, Default, Clone)]
pub struct KeywordQueryRewriter;

impl KeywordQueryRewriter {
    pub fn new() -> Self {
        Self
    }

    pub fn rewrite_sync(&self, question: &str) -> String {
        let phrases: Vec<&str> = KEYWORD_RULES
            .iter()
            .filter(|(re, _)| re.is_match(question))
            .map(|(_, phrase)| *phrase)
            .collect();

        if phrases.is_empty() {
            question.to_string()
        } else {
            phrases.join(". ")
        }
    }
}

#[async_trait]
impl QueryRewriter for KeywordQueryRewriter {
    async fn rewrite(&self, question: &str) -> String {
        let rewritten = self.rewrite_sync(question);
        debug!("Keyword rewrite: '{}' -> '{}'", question, rewritten);
        rewritten
    }
}

/// 基于语言模型的改写
pub struct LlmQueryRewriter {
    model: Arc<dyn LanguageModel>,
}

impl LlmQueryRewriter {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    fn prompt(question: &str) -> String {
        format!(
            "You are a query optimizer for an airline database.\n\
             Rewrite the user's input to match our specific text serialization format.\n\n\
             ### TRANSLATION RULES\n\
             * Good Food -> \"{}\"\n\
             * Bad Food  -> \"{}\"\n\
             * Average   -> \"{}\"\n\
             * Late      -> \"{}\"\n\
             * On Time   -> \"{}\"\n\n\
             User: {}\nOptimized:",
            GOOD_FOOD_PHRASE, BAD_FOOD_PHRASE, AVERAGE_FOOD_PHRASE, LATE_PHRASE, ON_TIME_PHRASE, question
        )
    }
}

#[async_trait]
impl QueryRewriter for LlmQueryRewriter {
    async fn rewrite(&self, question: &str) -> String {
        match self.model.generate(&Self::prompt(question)).await {
            Ok(reply) if !reply.trim().is_empty() => {
                let rewritten = reply.trim().to_string();
                debug!("LLM rewrite: '{}' -> '{}'", question, rewritten);
                rewritten
            }
            Ok(_) => {
                warn!("Query rewriter returned an empty reply, using original question");
                question.to_string()
            }
            Err(e) => {
                warn!("Query rewriter failed, using original question: {}", e);
                question.to_string()
            }
        }
    }
}
