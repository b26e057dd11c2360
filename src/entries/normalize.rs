//! Read-boundary migration from whatever shape is on disk to the current
//! `CoffeeEntry` schema.
//!
//! Records written before aroma/overall existed get the default rating.
//! Records written before bean/water amounts existed read them as 0. The
//! retired `ratio` field is ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{clamp_rating, CoffeeEntry, ExtractionStep, TasteProfile, DEFAULT_TASTE_RATING};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    pub id: String,
    pub date: DateTime<Utc>,
    pub bean_type: String,
    #[serde(default)]
    pub extraction_steps: Option<Vec<StoredStep>>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub bean_amount: Option<f64>,
    #[serde(default)]
    pub water_amount: Option<f64>,
    #[serde(default)]
    pub taste: Option<StoredTaste>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StoredStep {
    pub time: f64,
    pub grams: f64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StoredTaste {
    #[serde(default)]
    pub acidity: Option<f64>,
    #[serde(default)]
    pub sweetness: Option<f64>,
    #[serde(default)]
    pub bitterness: Option<f64>,
    #[serde(default)]
    pub aroma: Option<f64>,
    #[serde(default)]
    pub overall: Option<f64>,
}

/// Missing ratings default to 3. Present ones are rounded and clamped to
/// 1-5, so an out-of-range legacy value such as 0 reads back as 1.
fn rating(value: Option<f64>) -> u8 {
    value.map(clamp_rating).unwrap_or(DEFAULT_TASTE_RATING)
}

pub fn normalize_taste(raw: Option<StoredTaste>) -> TasteProfile {
    let raw = raw.unwrap_or_default();
    TasteProfile {
        acidity: rating(raw.acidity),
        sweetness: rating(raw.sweetness),
        bitterness: rating(raw.bitterness),
        aroma: rating(raw.aroma),
        overall: rating(raw.overall),
    }
}

pub fn normalize_entry(raw: StoredEntry) -> CoffeeEntry {
    let extraction_steps = raw
        .extraction_steps
        .unwrap_or_default()
        .into_iter()
        .map(|step| ExtractionStep {
            time: if step.time.is_finite() && step.time > 0.0 {
                step.time.floor() as u64
            } else {
                0
            },
            grams: step.grams,
        })
        .collect();

    CoffeeEntry {
        id: raw.id,
        date: raw.date,
        bean_type: raw.bean_type,
        extraction_steps,
        temperature: raw.temperature.unwrap_or(0.0),
        bean_amount: raw.bean_amount.unwrap_or(0.0),
        water_amount: raw.water_amount.unwrap_or(0.0),
        taste: normalize_taste(raw.taste),
        notes: raw.notes.unwrap_or_default(),
    }
}
