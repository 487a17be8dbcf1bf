use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::models::{JourneyRecord, QueryParams, Record};

/// 旅程导出查询，用于构建片段语料
pub const JOURNEY_EXPORT_QUERY: &str = "
MATCH (p:Passenger)-[:TOOK]->(j:Journey)-[:ON]->(f:Flight)
MATCH (f)-[:DEPARTS_FROM]->(origin:Airport)
MATCH (f)-[:ARRIVES_AT]->(dest:Airport)
RETURN
    p.record_locator AS passenger_id,
    p.loyalty_program_level AS loyalty,
    p.generation AS gen,
    j.passenger_class AS p_class,
    j.food_satisfaction_score AS food_score,
    j.arrival_delay_minutes AS delay,
    j.actual_flown_miles AS miles,
    j.number_of_legs AS legs,
    f.flight_number AS flight_num,
    f.fleet_type_description AS fleet,
    origin.station_code AS origin_code,
    dest.station_code AS dest_code";

/// 图数据库能力：执行参数化查询
///
/// 参数名必须与查询中的占位符完全一致。每次调用独立获取并释放连接。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn execute(&self, query: &str, params: &QueryParams) -> Result<Vec<Record>>;
}

/// 导出全部旅程记录
pub async fn fetch_journeys(store: &dyn GraphStore) -> Result<Vec<JourneyRecord>> {
    let rows = store
        .execute(JOURNEY_EXPORT_QUERY.trim(), &QueryParams::new())
        .await?;
    info!("Extracted {} journey records from graph", rows.len());

    rows.iter().map(JourneyRecord::from_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::{FieldValue, record};

    fn export_row(passenger_id: &str, food_score: i64) -> Record {
        record([
            ("passenger_id", FieldValue::from(passenger_id)),
            ("gen", "Boomers".into()),
            ("loyalty", "Gold".into()),
            ("p_class", "Economy".into()),
            ("flight_num", 1878i64.into()),
            ("fleet", "B737-800".into()),
            ("origin_code", "IAX".into()),
            ("dest_code", "LAX".into()),
            ("miles", 1745i64.into()),
            ("legs", 1i64.into()),
            ("food_score", food_score.into()),
            ("delay", 0i64.into()),
        ])
    }

    #[tokio::test]
    async fn test_fetch_journeys_uses_export_query() {
        let mut store = MockGraphStore::new();
        store
            .expect_execute()
            .withf(|query, params| query.contains("AS passenger_id") && params.is_empty())
            .times(1)
            .returning(|_, _| Ok(vec![export_row("P1", 9), export_row("P2", 2)]));

        let journeys = fetch_journeys(&store).await.unwrap();
        assert_eq!(journeys.len(), 2);
        assert_eq!(journeys[0].passenger_id, "P1");
        assert_eq!(journeys[1].food_score, 2);
    }

    #[tokio::test]
    async fn test_fetch_journeys_propagates_store_error() {
        let mut store = MockGraphStore::new();
        store
            .expect_execute()
            .returning(|_, _| Err(crate::error::AppError::Graph("down".into())));

        assert!(fetch_journeys(&store).await.is_err());
    }
}
