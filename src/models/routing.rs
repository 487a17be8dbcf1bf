use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// 查询参数：占位符名 → 取值
pub type QueryParams = BTreeMap<String, Value>;

/// 查询模板标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateId {
    RouteFlights,
    ArrivalsAtAirport,
    FlightDetails,
    RouteDelays,
    ProblemFlightsFromOrigin,
    FleetDelays,
    FoodScoreByClass,
    WorstFoodFlights,
    LoyaltyProfile,
    PassengerHistory,
}

impl TemplateId {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateId::RouteFlights => "route_flights",
            TemplateId::ArrivalsAtAirport => "arrivals_at_airport",
            TemplateId::FlightDetails => "flight_details",
            TemplateId::RouteDelays => "route_delays",
            TemplateId::ProblemFlightsFromOrigin => "problem_flights_from_origin",
            TemplateId::FleetDelays => "fleet_delays",
            TemplateId::FoodScoreByClass => "food_score_by_class",
            TemplateId::WorstFoodFlights => "worst_food_flights",
            TemplateId::LoyaltyProfile => "loyalty_profile",
            TemplateId::PassengerHistory => "passenger_history",
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 已绑定参数的图查询
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedQuery {
    pub template: TemplateId,
    pub query: String,
    pub params: QueryParams,
}

/// 模板路由结果
///
/// `NoMatch` 是预期结果而非错误：图分支据此跳过查询。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RoutingDecision {
    Matched(RoutedQuery),
    NoMatch,
}

impl RoutingDecision {
    pub fn template(&self) -> Option<TemplateId> {
        match self {
            RoutingDecision::Matched(routed) => Some(routed.template),
            RoutingDecision::NoMatch => None,
        }
    }

    pub fn routed(&self) -> Option<&RoutedQuery> {
        match self {
            RoutingDecision::Matched(routed) => Some(routed),
            RoutingDecision::NoMatch => None,
        }
    }
}
