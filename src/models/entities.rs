//! 实体模型
//!
//! 从自然语言问题中抽取出的查询参数。所有字段默认缺失（而不是零值），
//! "缺失" 与 "未请求该过滤条件" 是同一状态。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

/// 航班号
///
/// 图数据库中的航班号是整数类型；字符串形式的纯数字航班号必须在路由前
/// 转换为整数，否则查询会静默返回零行。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlightNumber {
    Number(i64),
    Code(String),
}

impl FlightNumber {
    /// 纯数字字符串转换为整数，其余保持原样
    pub fn normalize(self) -> Self {
        if let FlightNumber::Code(code) = &self {
            if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(number) = code.parse::<i64>() {
                    return FlightNumber::Number(number);
                }
            }
        }
        self
    }

    pub fn to_param(&self) -> Value {
        match self {
            FlightNumber::Number(n) => Value::from(*n),
            FlightNumber::Code(code) => Value::from(code.clone()),
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, FlightNumber::Code(code) if code.trim().is_empty())
    }
}

/// 可作为路由条件的实体字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityField {
    Origin,
    Destination,
    StationCode,
    FlightNumber,
    FleetDesc,
    RecordLocator,
    FeedbackId,
    LoyaltyLevel,
    PassengerClass,
    Generation,
}

impl EntityField {
    /// 查询模板中对应的参数名
    pub fn param_name(&self) -> &'static str {
        match self {
            EntityField::Origin => "origin",
            EntityField::Destination => "destination",
            EntityField::StationCode => "station_code",
            EntityField::FlightNumber => "flight_number",
            EntityField::FleetDesc => "fleet_desc",
            EntityField::RecordLocator => "record_locator",
            EntityField::FeedbackId => "feedback_id",
            EntityField::LoyaltyLevel => "level",
            EntityField::PassengerClass => "p_class",
            EntityField::Generation => "generation",
        }
    }
}

/// 模板参数名与实体字段名不一致的键：(别名, 字段名)
const KEY_ALIASES: [(&str, &str); 3] = [
    ("level", "loyalty_level"),
    ("p_class", "passenger_class"),
    ("gen", "generation"),
];

/// 抽取出的实体
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedEntities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_code: Option<String>,
    #[serde(deserialize_with = "lenient_flight_number", skip_serializing_if = "Option::is_none")]
    pub flight_number: Option<FlightNumber>,
    /// 机型描述，按子串匹配
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fleet_desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_locator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loyalty_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passenger_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
    #[serde(deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub min_delay: Option<i64>,
    #[serde(deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    #[serde(deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub min_miles: Option<i64>,
    #[serde(deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub max_miles: Option<i64>,
    #[serde(deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub min_legs: Option<i64>,
}

impl ExtractedEntities {
    /// 从未定型的抽取结果构建实体，并执行一次航班号规范化
    ///
    /// 多余的键被忽略，缺失的键保持缺失。别名键并入字段名，两者都有值时以字段名为准。
    pub fn from_raw(raw: Value) -> Result<Self> {
        let entities: ExtractedEntities = match raw {
            Value::Null => ExtractedEntities::default(),
            Value::Object(map) => serde_json::from_value(Value::Object(merge_aliases(map)))
                .map_err(|e| AppError::Extraction(format!("malformed entities: {}", e)))?,
            other => {
                return Err(AppError::Extraction(format!(
                    "expected an object, got: {}",
                    other
                )));
            }
        };
        Ok(entities.normalize())
    }

    /// 航班号规范化，其余字段原样保留
    pub fn normalize(mut self) -> Self {
        self.flight_number = self.flight_number.map(FlightNumber::normalize);
        self
    }

    /// 字段是否存在（空字符串视为缺失）
    pub fn is_present(&self, field: EntityField) -> bool {
        match field {
            EntityField::FlightNumber => self
                .flight_number
                .as_ref()
                .is_some_and(|number| !number.is_blank()),
            _ => self
                .text_field(field)
                .is_some_and(|value| !value.trim().is_empty()),
        }
    }

    /// 字段作为查询参数的取值
    pub fn param_value(&self, field: EntityField) -> Option<Value> {
        if !self.is_present(field) {
            return None;
        }
        match field {
            EntityField::FlightNumber => self.flight_number.as_ref().map(FlightNumber::to_param),
            _ => self.text_field(field).map(|value| Value::from(value.to_string())),
        }
    }

    fn text_field(&self, field: EntityField) -> Option<&str> {
        let value = match field {
            EntityField::Origin => &self.origin,
            EntityField::Destination => &self.destination,
            EntityField::StationCode => &self.station_code,
            EntityField::FleetDesc => &self.fleet_desc,
            EntityField::RecordLocator => &self.record_locator,
            EntityField::FeedbackId => &self.feedback_id,
            EntityField::LoyaltyLevel => &self.loyalty_level,
            EntityField::PassengerClass => &self.passenger_class,
            EntityField::Generation => &self.generation,
            EntityField::FlightNumber => return None,
        };
        value.as_deref()
    }
}

fn merge_aliases(mut map: Map<String, Value>) -> Map<String, Value> {
    for (alias, field) in KEY_ALIASES {
        let Some(value) = map.remove(alias) else {
            continue;
        };
        let canonical_present = map.get(field).is_some_and(|v| !v.is_null());
        if !canonical_present {
            map.insert(field.to_string(), value);
        }
    }
    map
}

/// 航班号可以是整数、整值浮点数或字符串
fn lenient_flight_number<'de, D>(deserializer: D) -> std::result::Result<Option<FlightNumber>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => Ok(Some(FlightNumber::Number(i))),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| Some(FlightNumber::Number(f as i64)))
                .ok_or_else(|| serde::de::Error::custom(format!("not a flight number: {}", n))),
        },
        Some(Value::String(s)) => Ok(Some(FlightNumber::Code(s))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "not a flight number: {}",
            other
        ))),
    }
}

fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => Ok(Some(i)),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| Some(f as i64))
                .ok_or_else(|| serde::de::Error::custom(format!("not an integer: {}", n))),
        },
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("not an integer: {}", s))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "not an integer: {}",
            other
        ))),
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("not a number: {}", s))),
        Some(other) => Err(serde::de::Error::custom(format!("not a number: {}", other))),
    }
}
