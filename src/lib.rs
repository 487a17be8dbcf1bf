//! Aerograph - 航空运营问答服务
//!
//! 将自然语言问题分类并抽取实体后，路由到参数化图查询、片段向量检索或两者，
//! 再由语言模型基于检索结果合成答案。

pub mod api;
pub mod config;
pub mod error;
pub mod index;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;
