//! 图检索分支
//!
//! 执行路由选出的参数化查询。未路由时不访问数据库；查询失败降级为无结果，
//! 只记录日志，不中断请求。

use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::{GraphOutcome, RoutingDecision};
use crate::storage::graph::GraphStore;

pub struct GraphRetrieval {
    store: Arc<dyn GraphStore>,
}

impl GraphRetrieval {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub async fn retrieve(&self, decision: &RoutingDecision) -> GraphOutcome {
        let Some(routed) = decision.routed() else {
            debug!("No query template matched, skipping graph execution");
            return GraphOutcome::NoQuery;
        };

        match self.store.execute(&routed.query, &routed.params).await {
            Ok(rows) => {
                debug!("Template {} returned {} rows", routed.template, rows.len());
                GraphOutcome::Rows(rows)
            }
            Err(e) => {
                warn!("Graph query {} failed: {}", routed.template, e);
                GraphOutcome::Failed(e.to_string())
            }
        }
    }
}
