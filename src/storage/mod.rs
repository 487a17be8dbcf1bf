//! 存储层模块
//!
//! 图数据库能力接口及其 Neo4j HTTP 实现。

pub mod graph;
pub mod neo4j;

pub use graph::{GraphStore, JOURNEY_EXPORT_QUERY, fetch_journeys};
pub use neo4j::Neo4jHttpStore;
