//! DTO 模块
//!
//! 数据传输对象，用于 API 请求和响应的序列化。

pub mod ask_dto;
pub mod compare_dto;

pub use ask_dto::*;
pub use compare_dto::*;
