//! 查询模板路由
//!
//! 将 (意图, 实体) 确定性地映射为一个参数化图查询。每个意图有固定的模板
//! 优先级列表，列表中第一个必需字段全部存在的模板胜出；不会回落到其他意图
//! 的模板。没有模板匹配时返回 `RoutingDecision::NoMatch`。

use tracing::debug;

use crate::config::config::RoutingConfig;
use crate::models::{
    EntityField, ExtractedEntities, Intent, QueryParams, RoutedQuery, RoutingDecision, TemplateId,
};

/// 由配置提供的业务阈值参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    /// 问题航班的平均延误下限
    ProblemDelay,
    /// 差评航班的平均餐食评分上限
    LowFoodScore,
}

impl Threshold {
    pub fn param_name(&self) -> &'static str {
        match self {
            Threshold::ProblemDelay => "min_avg_delay",
            Threshold::LowFoodScore => "max_avg_score",
        }
    }

    fn value(&self, config: &RoutingConfig) -> f64 {
        match self {
            Threshold::ProblemDelay => config.problem_delay_minutes,
            Threshold::LowFoodScore => config.low_food_score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// 排序策略
#[derive(Debug, Clone, Copy)]
pub struct OrderBy {
    pub column: &'static str,
    pub direction: SortDirection,
}

/// 不可变的查询模板
#[derive(Debug)]
pub struct QueryTemplate {
    pub id: TemplateId,
    pub intent: Intent,
    /// 全部存在时模板才匹配；为空表示该意图的默认模板
    pub required: &'static [EntityField],
    pub thresholds: &'static [Threshold],
    pub order_by: Option<OrderBy>,
    pub limit: Option<u32>,
    body: &'static str,
}

impl QueryTemplate {
    pub fn matches(&self, entities: &ExtractedEntities) -> bool {
        self.required.iter().all(|field| entities.is_present(*field))
    }

    /// 生成完整查询文本（主体 + 排序 + 限制）
    pub fn render(&self) -> String {
        let mut query = self.body.trim().to_string();
        if let Some(order) = &self.order_by {
            let direction = match order.direction {
                SortDirection::Ascending => "ASC",
                SortDirection::Descending => "DESC",
            };
            query.push_str(&format!("\nORDER BY {} {}", order.column, direction));
        }
        if let Some(limit) = self.limit {
            query.push_str(&format!("\nLIMIT {}", limit));
        }
        query
    }

    fn bind(&self, entities: &ExtractedEntities, config: &RoutingConfig) -> QueryParams {
        let mut params = QueryParams::new();
        for field in self.required {
            if let Some(value) = entities.param_value(*field) {
                params.insert(field.param_name().to_string(), value);
            }
        }
        for threshold in self.thresholds {
            params.insert(
                threshold.param_name().to_string(),
                serde_json::Value::from(threshold.value(config)),
            );
        }
        params
    }
}

/// 按意图分组、组内按优先级排列的模板表
static TEMPLATES: &[QueryTemplate] = &[
    QueryTemplate {
        id: TemplateId::RouteFlights,
        intent: Intent::FlightSearch,
        required: &[EntityField::Origin, EntityField::Destination],
        thresholds: &[],
        order_by: None,
        limit: Some(10),
        body: "
MATCH (f:Flight)-[:DEPARTS_FROM]->(o:Airport {station_code: $origin})
MATCH (f)-[:ARRIVES_AT]->(d:Airport {station_code: $destination})
RETURN f.flight_number, f.fleet_type_description, o.station_code AS Origin, d.station_code AS Dest",
    },
    QueryTemplate {
        id: TemplateId::ArrivalsAtAirport,
        intent: Intent::FlightSearch,
        required: &[EntityField::Destination],
        thresholds: &[],
        order_by: None,
        limit: Some(15),
        body: "
MATCH (f:Flight)-[:ARRIVES_AT]->(a:Airport {station_code: $destination})
RETURN f.flight_number, f.fleet_type_description, a.station_code AS Destination",
    },
    QueryTemplate {
        id: TemplateId::FlightDetails,
        intent: Intent::FlightSearch,
        required: &[EntityField::FlightNumber],
        thresholds: &[],
        order_by: None,
        limit: None,
        body: "
MATCH (f:Flight {flight_number: $flight_number})
MATCH (f)-[:DEPARTS_FROM]->(o:Airport)
MATCH (f)-[:ARRIVES_AT]->(d:Airport)
RETURN f.flight_number, f.fleet_type_description, o.station_code AS Origin, d.station_code AS Dest",
    },
    QueryTemplate {
        id: TemplateId::RouteDelays,
        intent: Intent::AnalyzeDelays,
        required: &[EntityField::Origin, EntityField::Destination],
        thresholds: &[],
        order_by: Some(OrderBy {
            column: "Avg_Delay",
            direction: SortDirection::Descending,
        }),
        limit: None,
        body: "
MATCH (f:Flight)-[:DEPARTS_FROM]->(o:Airport {station_code: $origin})
MATCH (f)-[:ARRIVES_AT]->(d:Airport {station_code: $destination})
MATCH (j:Journey)-[:ON]->(f)
RETURN f.flight_number, avg(j.arrival_delay_minutes) AS Avg_Delay, max(j.arrival_delay_minutes) AS Max_Delay",
    },
    QueryTemplate {
        id: TemplateId::ProblemFlightsFromOrigin,
        intent: Intent::AnalyzeDelays,
        required: &[EntityField::Origin],
        thresholds: &[Threshold::ProblemDelay],
        order_by: Some(OrderBy {
            column: "flight_avg_delay",
            direction: SortDirection::Descending,
        }),
        limit: Some(5),
        body: "
MATCH (f:Flight)-[:DEPARTS_FROM]->(a:Airport {station_code: $origin})
MATCH (j:Journey)-[:ON]->(f)
WITH f, avg(j.arrival_delay_minutes) AS flight_avg_delay
WHERE flight_avg_delay > $min_avg_delay
RETURN f.flight_number, f.fleet_type_description, flight_avg_delay",
    },
    QueryTemplate {
        id: TemplateId::FleetDelays,
        intent: Intent::AnalyzeDelays,
        required: &[EntityField::FleetDesc],
        thresholds: &[],
        order_by: None,
        limit: Some(5),
        body: "
MATCH (j:Journey)-[:ON]->(f:Flight)
WHERE f.fleet_type_description CONTAINS $fleet_desc
RETURN f.fleet_type_description AS Fleet, avg(j.arrival_delay_minutes) AS Avg_Delay",
    },
    QueryTemplate {
        id: TemplateId::FoodScoreByClass,
        intent: Intent::SatisfactionAnalysis,
        required: &[EntityField::PassengerClass],
        thresholds: &[],
        order_by: None,
        limit: None,
        body: "
MATCH (j:Journey {passenger_class: $p_class})-[:ON]->(f:Flight)
RETURN j.passenger_class, avg(j.food_satisfaction_score) AS Avg_Food_Score, count(j) AS Total_Pax",
    },
    QueryTemplate {
        id: TemplateId::WorstFoodFlights,
        intent: Intent::SatisfactionAnalysis,
        required: &[],
        thresholds: &[Threshold::LowFoodScore],
        order_by: Some(OrderBy {
            column: "score",
            direction: SortDirection::Ascending,
        }),
        limit: Some(5),
        body: "
MATCH (j:Journey)-[:ON]->(f:Flight)
WITH f, avg(j.food_satisfaction_score) AS score
WHERE score < $max_avg_score
RETURN f.flight_number, f.fleet_type_description, score",
    },
    QueryTemplate {
        id: TemplateId::LoyaltyProfile,
        intent: Intent::PassengerProfiling,
        required: &[EntityField::LoyaltyLevel],
        thresholds: &[],
        order_by: None,
        limit: None,
        body: "
MATCH (p:Passenger {loyalty_program_level: $level})-[:TOOK]->(j:Journey)
RETURN p.loyalty_program_level, avg(j.food_satisfaction_score) AS Avg_Food_Rating, avg(j.arrival_delay_minutes) AS Avg_Delay_Exp",
    },
    QueryTemplate {
        id: TemplateId::PassengerHistory,
        intent: Intent::PassengerProfiling,
        required: &[EntityField::RecordLocator],
        thresholds: &[],
        order_by: None,
        limit: None,
        body: "
MATCH (p:Passenger {record_locator: $record_locator})-[:TOOK]->(j:Journey)-[:ON]->(f:Flight)
RETURN p.record_locator, f.flight_number, j.passenger_class, j.arrival_delay_minutes",
    },
];

/// 按优先级列出某意图的模板
pub fn templates_for(intent: Intent) -> impl Iterator<Item = &'static QueryTemplate> {
    TEMPLATES.iter().filter(move |template| template.intent == intent)
}

/// 按标识查找模板
pub fn template(id: TemplateId) -> Option<&'static QueryTemplate> {
    TEMPLATES.iter().find(|template| template.id == id)
}

/// 模板路由器：无副作用、无外部状态
#[derive(Debug, Clone, Default)]
pub struct TemplateRouter {
    config: RoutingConfig,
}

impl TemplateRouter {
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// 选择模板并绑定参数；实体须已规范化
    pub fn route(&self, intent: Intent, entities: &ExtractedEntities) -> RoutingDecision {
        match templates_for(intent).find(|template| template.matches(entities)) {
            Some(template) => {
                let params = template.bind(entities, &self.config);
                debug!(
                    "Routed intent {} to template {} with params {:?}",
                    intent, template.id, params
                );
                RoutingDecision::Matched(RoutedQuery {
                    template: template.id,
                    query: template.render(),
                    params,
                })
            }
            None => {
                debug!("No template matched intent {}", intent);
                RoutingDecision::NoMatch
            }
        }
    }
}
