//! 旅程记录与文本序列化
//!
//! 片段语料中的每一条都是一次旅程按固定模板渲染出的自然语言句子，
//! 查询改写器产出的规范短语与这里的措辞一一对应。

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::record::{FieldValue, Record};

/// 高分阈值（含）
pub const EXCELLENT_FOOD_SCORE: i64 = 8;
/// 低分阈值（含）
pub const POOR_FOOD_SCORE: i64 = 3;
/// 严重延误阈值（分钟，不含）
pub const SIGNIFICANT_DELAY_MINUTES: i64 = 30;

/// 一次旅程（Passenger -TOOK-> Journey -ON-> Flight）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyRecord {
    pub passenger_id: String,
    pub generation: String,
    pub loyalty: String,
    pub passenger_class: String,
    pub flight_number: String,
    pub fleet: String,
    pub origin: String,
    pub destination: String,
    pub miles: i64,
    pub legs: Option<i64>,
    pub food_score: i64,
    pub delay_minutes: i64,
}

impl JourneyRecord {
    /// 从旅程导出查询的一行结果构建
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            passenger_id: text(record, "passenger_id")?,
            generation: text(record, "gen")?,
            loyalty: text(record, "loyalty")?,
            passenger_class: text(record, "p_class")?,
            flight_number: text(record, "flight_num")?,
            fleet: text(record, "fleet")?,
            origin: text(record, "origin_code")?,
            destination: text(record, "dest_code")?,
            miles: required_integer(record, "miles")?,
            legs: integer(record, "legs")?,
            food_score: required_integer(record, "food_score")?,
            delay_minutes: required_integer(record, "delay")?,
        })
    }

    /// 渲染为片段语料中的一句话
    pub fn to_snippet(&self) -> String {
        let legs = match self.legs {
            Some(legs) => format!(" across {} leg(s)", legs),
            None => String::new(),
        };

        format!(
            "Passenger {} ({}, {} status) booked {} class on Flight {} (operated by {}). \
             The journey from {} to {} covered {} miles{}. \
             Feedback: The food was {} (rated {}/10). The flight {}.",
            self.passenger_id,
            self.generation,
            self.loyalty,
            self.passenger_class,
            self.flight_number,
            self.fleet,
            self.origin,
            self.destination,
            self.miles,
            legs,
            food_description(self.food_score),
            self.food_score,
            delay_description(self.delay_minutes),
        )
    }
}

/// 餐食评分的文字描述
pub fn food_description(score: i64) -> &'static str {
    if score >= EXCELLENT_FOOD_SCORE {
        "delicious and excellent"
    } else if score <= POOR_FOOD_SCORE {
        "terrible and poor"
    } else {
        "average"
    }
}

/// 到达延误的文字描述
pub fn delay_description(delay_minutes: i64) -> String {
    if delay_minutes > SIGNIFICANT_DELAY_MINUTES {
        format!("was significantly delayed by {} minutes", delay_minutes)
    } else if delay_minutes > 0 {
        format!("was slightly delayed by {} minutes", delay_minutes)
    } else {
        "was on time".to_string()
    }
}

fn text(record: &Record, column: &str) -> Result<String> {
    match record.get(column) {
        Some(FieldValue::Null) | None => Err(AppError::Serialization(format!(
            "journey record is missing column: {}",
            column
        ))),
        Some(value) => Ok(value.to_string()),
    }
}

/// 评分、延误与里程会直接写进片段，缺失时不能以 0 代替
fn required_integer(record: &Record, column: &str) -> Result<i64> {
    integer(record, column)?.ok_or_else(|| {
        AppError::Serialization(format!("journey record is missing column: {}", column))
    })
}

fn integer(record: &Record, column: &str) -> Result<Option<i64>> {
    match record.get(column) {
        None | Some(FieldValue::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f.round() as i64))
            .map(Some)
            .ok_or_else(|| {
                AppError::Serialization(format!("column {} is not numeric: {}", column, value))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::record;

    fn journey(food_score: i64, delay_minutes: i64) -> JourneyRecord {
        JourneyRecord {
            passenger_id: "ABC123".into(),
            generation: "Millennials".into(),
            loyalty: "Gold".into(),
            passenger_class: "Economy".into(),
            flight_number: "1878".into(),
            fleet: "B737-800".into(),
            origin: "IAX".into(),
            destination: "LAX".into(),
            miles: 1745,
            legs: Some(1),
            food_score,
            delay_minutes,
        }
    }

    #[test]
    fn test_snippet_for_excellent_food() {
        let snippet = journey(9, 0).to_snippet();
        assert!(snippet.contains("delicious and excellent (rated 9/10)"));
        assert_eq!(
            snippet,
            "Passenger ABC123 (Millennials, Gold status) booked Economy class on Flight 1878 \
             (operated by B737-800). The journey from IAX to LAX covered 1745 miles across \
             1 leg(s). Feedback: The food was delicious and excellent (rated 9/10). \
             The flight was on time."
        );
    }

    #[test]
    fn test_food_description_boundaries() {
        assert_eq!(food_description(8), "delicious and excellent");
        assert_eq!(food_description(7), "average");
        assert_eq!(food_description(4), "average");
        assert_eq!(food_description(3), "terrible and poor");
        assert_eq!(food_description(0), "terrible and poor");
    }

    #[test]
    fn test_delay_description_boundaries() {
        assert_eq!(delay_description(0), "was on time");
        assert_eq!(delay_description(1), "was slightly delayed by 1 minutes");
        assert_eq!(delay_description(30), "was slightly delayed by 30 minutes");
        assert_eq!(
            delay_description(31),
            "was significantly delayed by 31 minutes"
        );
    }

    #[test]
    fn test_snippet_without_legs() {
        let mut record = journey(5, 45);
        record.legs = None;
        let snippet = record.to_snippet();
        assert!(snippet.contains("covered 1745 miles. Feedback"));
        assert!(snippet.ends_with("The flight was significantly delayed by 45 minutes."));
    }

    #[test]
    fn test_from_export_record() {
        let row = record([
            ("passenger_id", FieldValue::from("XYZ789")),
            ("gen", "Gen Z".into()),
            ("loyalty", "Silver".into()),
            ("p_class", "Business".into()),
            ("flight_num", 2201i64.into()),
            ("fleet", "A320".into()),
            ("origin_code", "ORD".into()),
            ("dest_code", "LAX".into()),
            ("miles", 1744i64.into()),
            ("legs", FieldValue::Null),
            ("food_score", 2i64.into()),
            ("delay", 12i64.into()),
        ]);

        let journey = JourneyRecord::from_record(&row).unwrap();
        assert_eq!(journey.flight_number, "2201");
        assert_eq!(journey.legs, None);
        assert!(journey.to_snippet().contains("terrible and poor (rated 2/10)"));
    }

    #[test]
    fn test_from_export_record_missing_column() {
        let row = record([("passenger_id", FieldValue::from("XYZ789"))]);
        assert!(JourneyRecord::from_record(&row).is_err());
    }

    #[test]
    fn test_from_export_record_null_measurements_are_rejected() {
        let complete = record([
            ("passenger_id", FieldValue::from("XYZ789")),
            ("gen", "Gen Z".into()),
            ("loyalty", "Silver".into()),
            ("p_class", "Business".into()),
            ("flight_num", 2201i64.into()),
            ("fleet", "A320".into()),
            ("origin_code", "ORD".into()),
            ("dest_code", "LAX".into()),
            ("miles", 1744i64.into()),
            ("legs", FieldValue::Null),
            ("food_score", 2i64.into()),
            ("delay", 12i64.into()),
        ]);
        assert!(JourneyRecord::from_record(&complete).is_ok());

        for column in ["miles", "food_score", "delay"] {
            let mut row = complete.clone();
            row.insert(column.to_string(), FieldValue::Null);
            let err = JourneyRecord::from_record(&row).unwrap_err();
            assert!(matches!(err, AppError::Serialization(ref m) if m.contains(column)));

            let mut row = complete.clone();
            row.remove(column);
            assert!(matches!(
                JourneyRecord::from_record(&row),
                Err(AppError::Serialization(_))
            ));
        }
    }
}
