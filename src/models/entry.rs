//! Coffee entry data models.
//!
//! `CoffeeEntry` is the persisted unit. `NewCoffeeEntry` is the same record
//! before the repository assigns it an id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TASTE_RATING: u8 = 3;
pub const MIN_TASTE_RATING: u8 = 1;
pub const MAX_TASTE_RATING: u8 = 5;

/// One pour: seconds since brew start and the grams poured at that point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionStep {
    pub time: u64,
    pub grams: f64,
}

impl ExtractionStep {
    pub fn new(time: u64, grams: f64) -> Self {
        Self { time, grams }
    }

    pub fn is_valid(&self) -> bool {
        self.grams > 0.0 && self.grams.is_finite()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TasteProfile {
    pub acidity: u8,
    pub sweetness: u8,
    pub bitterness: u8,
    pub aroma: u8,
    pub overall: u8,
}

impl Default for TasteProfile {
    fn default() -> Self {
        Self {
            acidity: DEFAULT_TASTE_RATING,
            sweetness: DEFAULT_TASTE_RATING,
            bitterness: DEFAULT_TASTE_RATING,
            aroma: DEFAULT_TASTE_RATING,
            overall: DEFAULT_TASTE_RATING,
        }
    }
}

impl TasteProfile {
    /// Mean of acidity, sweetness and bitterness. Aroma and overall are not
    /// part of the headline rating.
    pub fn headline_rating(&self) -> f64 {
        (f64::from(self.acidity) + f64::from(self.sweetness) + f64::from(self.bitterness)) / 3.0
    }
}

/// Rounds and clamps a free-form numeric rating into `1..=5`.
pub fn clamp_rating(value: f64) -> u8 {
    if !value.is_finite() {
        return DEFAULT_TASTE_RATING;
    }
    value
        .round()
        .clamp(f64::from(MIN_TASTE_RATING), f64::from(MAX_TASTE_RATING)) as u8
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CoffeeEntry {
    pub id: String,
    pub date: DateTime<Utc>,
    pub bean_type: String,
    pub extraction_steps: Vec<ExtractionStep>,
    pub temperature: f64,
    pub bean_amount: f64,
    pub water_amount: f64,
    pub taste: TasteProfile,
    pub notes: String,
}

impl CoffeeEntry {
    /// Sum of every pour, which can differ from `water_amount` when the
    /// steps were typed by hand.
    pub fn total_water(&self) -> f64 {
        self.extraction_steps.iter().map(|step| step.grams).sum()
    }

    /// Each step paired with the running total poured so far.
    pub fn cumulative_steps(&self) -> Vec<(ExtractionStep, f64)> {
        let mut running = 0.0;
        self.extraction_steps
            .iter()
            .map(|step| {
                running += step.grams;
                (*step, running)
            })
            .collect()
    }

    pub fn without_id(&self) -> NewCoffeeEntry {
        NewCoffeeEntry {
            date: self.date,
            bean_type: self.bean_type.clone(),
            extraction_steps: self.extraction_steps.clone(),
            temperature: self.temperature,
            bean_amount: self.bean_amount,
            water_amount: self.water_amount,
            taste: self.taste,
            notes: self.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewCoffeeEntry {
    pub date: DateTime<Utc>,
    pub bean_type: String,
    pub extraction_steps: Vec<ExtractionStep>,
    pub temperature: f64,
    pub bean_amount: f64,
    pub water_amount: f64,
    pub taste: TasteProfile,
    pub notes: String,
}

impl NewCoffeeEntry {
    pub fn with_id(self, id: String) -> CoffeeEntry {
        CoffeeEntry {
            id,
            date: self.date,
            bean_type: self.bean_type,
            extraction_steps: self.extraction_steps,
            temperature: self.temperature,
            bean_amount: self.bean_amount,
            water_amount: self.water_amount,
            taste: self.taste,
            notes: self.notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> CoffeeEntry {
        CoffeeEntry {
            id: "a".into(),
            date: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            bean_type: "Ethiopia Guji".into(),
            extraction_steps: vec![
                ExtractionStep::new(0, 40.0),
                ExtractionStep::new(30, 100.0),
                ExtractionStep::new(75, 100.0),
            ],
            temperature: 92.0,
            bean_amount: 15.0,
            water_amount: 100.0,
            taste: TasteProfile::default(),
            notes: String::new(),
        }
    }

    #[test]
    fn cumulative_steps_track_running_total() {
        let entry = sample();
        let totals: Vec<f64> = entry.cumulative_steps().iter().map(|(_, t)| *t).collect();
        assert_eq!(totals, vec![40.0, 140.0, 240.0]);
        assert_eq!(entry.total_water(), 240.0);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let value = serde_json::to_value(sample()).expect("serialize");
        assert!(value.get("beanType").is_some());
        assert!(value.get("extractionSteps").is_some());
        assert!(value.get("waterAmount").is_some());
        assert_eq!(value["taste"]["overall"], 3);
    }

    #[test]
    fn clamp_rating_rounds_into_range() {
        assert_eq!(clamp_rating(0.0), 1);
        assert_eq!(clamp_rating(3.4), 3);
        assert_eq!(clamp_rating(4.6), 5);
        assert_eq!(clamp_rating(9.0), 5);
        assert_eq!(clamp_rating(f64::NAN), DEFAULT_TASTE_RATING);
    }

    #[test]
    fn headline_rating_ignores_aroma_and_overall() {
        let taste = TasteProfile {
            acidity: 5,
            sweetness: 4,
            bitterness: 3,
            aroma: 1,
            overall: 1,
        };
        assert_eq!(taste.headline_rating(), 4.0);
    }

    #[test]
    fn without_id_round_trips_through_with_id() {
        let entry = sample();
        let rebuilt = entry.without_id().with_id(entry.id.clone());
        assert_eq!(rebuilt, entry);
    }
}
