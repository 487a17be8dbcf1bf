//! 核心数据模型模块
//!
//! 定义 Aerograph 的核心数据结构：意图、实体、路由决策、检索结果与旅程记录。

pub mod entities;
pub mod intent;
pub mod journey;
pub mod record;
pub mod retrieval;
pub mod routing;

pub use entities::{EntityField, ExtractedEntities, FlightNumber};
pub use intent::Intent;
pub use journey::JourneyRecord;
pub use record::{FieldValue, Record};
pub use retrieval::{
    GraphOutcome, RetrievalMode, RetrievalResult, VECTOR_UNAVAILABLE_PLACEHOLDER, VectorOutcome,
};
pub use routing::{QueryParams, RoutedQuery, RoutingDecision, TemplateId};
