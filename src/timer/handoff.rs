use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ExtractionStep;

/// What a finished extraction hands to the entry form.
///
/// `water_amount` is the sum of every pour. The form later derives the
/// stored water amount from the last step instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionHandoff {
    pub date: DateTime<Utc>,
    pub bean_type: String,
    pub extraction_steps: Vec<ExtractionStep>,
    pub temperature: f64,
    pub bean_amount: f64,
    pub water_amount: f64,
    pub extraction_end_time: u64,
}
