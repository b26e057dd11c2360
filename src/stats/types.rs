use serde::{Deserialize, Serialize};

pub const NO_FAVORITE_PLACEHOLDER: &str = "Not recorded yet";
pub const NO_TREND_PLACEHOLDER: &str = "No data yet";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BrewStats {
    pub total_entries: usize,
    pub weekly_count: usize,
    pub favorite_bean: String,
    pub average_rating: f64,
    pub recent_trend: String,
}

impl Default for BrewStats {
    fn default() -> Self {
        Self {
            total_entries: 0,
            weekly_count: 0,
            favorite_bean: NO_FAVORITE_PLACEHOLDER.to_string(),
            average_rating: 0.0,
            recent_trend: NO_TREND_PLACEHOLDER.to_string(),
        }
    }
}

pub fn trend_sentence(bean_type: &str) -> String {
    format!("Lately you've been enjoying {bean_type}")
}
