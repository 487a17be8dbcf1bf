use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// 运营问题意图
///
/// 每个请求分类一次，之后不可变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// 查找航班、航线或航班详情
    FlightSearch,
    /// 航班、航线或机场的延误分析
    AnalyzeDelays,
    /// 餐食满意度或客诉分析
    SatisfactionAnalysis,
    /// 旅客数据、会员等级或历史分析
    PassengerProfiling,
}

impl Intent {
    pub const ALL: [Intent; 4] = [
        Intent::FlightSearch,
        Intent::AnalyzeDelays,
        Intent::SatisfactionAnalysis,
        Intent::PassengerProfiling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::FlightSearch => "flight_search",
            Intent::AnalyzeDelays => "analyze_delays",
            Intent::SatisfactionAnalysis => "satisfaction_analysis",
            Intent::PassengerProfiling => "passenger_profiling",
        }
    }

    /// 供分类提示词使用的意图说明
    pub fn description(&self) -> &'static str {
        match self {
            Intent::FlightSearch => "Find flights, routes, or specific flight details.",
            Intent::AnalyzeDelays => "Analyze delays for flights, routes, or airports.",
            Intent::SatisfactionAnalysis => {
                "Analyze food satisfaction or customer complaints."
            }
            Intent::PassengerProfiling => {
                "Analyze passenger data, loyalty levels, or history."
            }
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_matches('"').to_lowercase();
        Intent::ALL
            .into_iter()
            .find(|intent| intent.as_str() == normalized)
            .ok_or_else(|| AppError::Classification(format!("unknown intent: {}", s)))
    }
}
