//! Compare Routes

use crate::api::handlers::compare_handler::compare;
use axum::{Router, routing::post};

use crate::api::app_state::AppState;

/// 创建嵌入模型对比路由器
pub fn create_compare_router() -> Router<AppState> {
    Router::new().route("/compare", post(compare))
}
