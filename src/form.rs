//! Entry form state and submission rules.
//!
//! The form keeps every field as the user typed it and only parses on
//! validation or submit. Each edit recomputes validity and publishes it on a
//! watch channel so a surface can enable or disable its submit action.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;

use crate::{
    models::{
        clamp_rating, CoffeeEntry, ExtractionStep, NewCoffeeEntry, TasteProfile,
        DEFAULT_TASTE_RATING,
    },
    timer::ExtractionHandoff,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TasteField {
    Acidity,
    Sweetness,
    Bitterness,
    Aroma,
    Overall,
}

impl TasteField {
    pub const ALL: [TasteField; 5] = [
        TasteField::Acidity,
        TasteField::Sweetness,
        TasteField::Bitterness,
        TasteField::Aroma,
        TasteField::Overall,
    ];
}

impl fmt::Display for TasteField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TasteField::Acidity => "acidity",
            TasteField::Sweetness => "sweetness",
            TasteField::Bitterness => "bitterness",
            TasteField::Aroma => "aroma",
            TasteField::Overall => "overall",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("bean type is required")]
    MissingBeanType,
    #[error("at least one extraction step is required")]
    NoSteps,
    #[error("step {0} needs a time of 0 or more and more than 0 g of water")]
    InvalidStep(usize),
    #[error("temperature must be a number")]
    InvalidTemperature,
    #[error("bean amount must be a number")]
    InvalidBeanAmount,
    #[error("{0} rating must be a number")]
    InvalidTaste(TasteField),
}

/// One editable step row. Time may be typed negative, which validation
/// rejects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormStep {
    pub time: i64,
    pub grams: f64,
}

impl From<ExtractionStep> for FormStep {
    fn from(step: ExtractionStep) -> Self {
        Self {
            time: i64::try_from(step.time).unwrap_or(i64::MAX),
            grams: step.grams,
        }
    }
}

/// Leading-integer parse: optional sign then digits, anything after is
/// ignored, no digits at all reads as 0.
pub fn parse_leading_int(raw: &str) -> i64 {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map_or(0, |value| sign * value)
}

/// Field rules for the entry form.
pub mod validation {
    use super::{FormError, FormStep, TasteField};

    /// A non-empty, finite number. `inf` and `NaN` are rejected.
    pub fn parse_number(raw: &str) -> Option<f64> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
    }

    pub fn validate_bean_type(bean_type: &str) -> Result<(), FormError> {
        if bean_type.trim().is_empty() {
            return Err(FormError::MissingBeanType);
        }
        Ok(())
    }

    /// At least one step; each needs `time >= 0` and `grams > 0`.
    pub fn validate_steps(steps: &[FormStep]) -> Result<(), FormError> {
        if steps.is_empty() {
            return Err(FormError::NoSteps);
        }
        match steps
            .iter()
            .position(|step| step.time < 0 || !(step.grams > 0.0))
        {
            Some(index) => Err(FormError::InvalidStep(index + 1)),
            None => Ok(()),
        }
    }

    pub fn validate_temperature(raw: &str) -> Result<f64, FormError> {
        parse_number(raw).ok_or(FormError::InvalidTemperature)
    }

    pub fn validate_bean_amount(raw: &str) -> Result<f64, FormError> {
        parse_number(raw).ok_or(FormError::InvalidBeanAmount)
    }

    /// Ratings only need to be numbers; `submit` clamps them to 1-5.
    pub fn validate_taste(field: TasteField, raw: &str) -> Result<f64, FormError> {
        parse_number(raw).ok_or(FormError::InvalidTaste(field))
    }
}

/// Whole numbers print without a fractional part.
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

pub struct EntryForm {
    date: Option<DateTime<Utc>>,
    bean_type: String,
    steps: Vec<FormStep>,
    temperature: String,
    bean_amount: String,
    taste: [String; 5],
    notes: String,
    validity: watch::Sender<bool>,
}

impl Default for EntryForm {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryForm {
    /// Blank form with one empty step and every rating at 3.
    pub fn new() -> Self {
        let default_rating = DEFAULT_TASTE_RATING.to_string();
        Self::build(
            None,
            String::new(),
            vec![FormStep {
                time: 0,
                grams: 0.0,
            }],
            String::new(),
            String::new(),
            std::array::from_fn(|_| default_rating.clone()),
            String::new(),
        )
    }

    /// Pre-filled from a finished extraction. Ratings default to 3 and
    /// notes start empty.
    pub fn from_handoff(handoff: &ExtractionHandoff) -> Self {
        let default_rating = DEFAULT_TASTE_RATING.to_string();
        Self::build(
            Some(handoff.date),
            handoff.bean_type.clone(),
            handoff.extraction_steps.iter().copied().map(FormStep::from).collect(),
            format_number(handoff.temperature),
            format_number(handoff.bean_amount),
            std::array::from_fn(|_| default_rating.clone()),
            String::new(),
        )
    }

    /// Pre-filled for editing. Submitting keeps the original date.
    pub fn from_entry(entry: &CoffeeEntry) -> Self {
        let taste = entry.taste;
        Self::build(
            Some(entry.date),
            entry.bean_type.clone(),
            entry.extraction_steps.iter().copied().map(FormStep::from).collect(),
            format_number(entry.temperature),
            format_number(entry.bean_amount),
            [
                taste.acidity.to_string(),
                taste.sweetness.to_string(),
                taste.bitterness.to_string(),
                taste.aroma.to_string(),
                taste.overall.to_string(),
            ],
            entry.notes.clone(),
        )
    }

    fn build(
        date: Option<DateTime<Utc>>,
        bean_type: String,
        steps: Vec<FormStep>,
        temperature: String,
        bean_amount: String,
        taste: [String; 5],
        notes: String,
    ) -> Self {
        let (validity, _) = watch::channel(false);
        let form = Self {
            date,
            bean_type,
            steps,
            temperature,
            bean_amount,
            taste,
            notes,
            validity,
        };
        form.validity.send_replace(form.is_valid());
        form
    }

    /// Receives the current validity and every later change to it.
    pub fn subscribe_validity(&self) -> watch::Receiver<bool> {
        self.validity.subscribe()
    }

    fn notify(&self) {
        let valid = self.is_valid();
        self.validity.send_if_modified(|current| {
            if *current == valid {
                false
            } else {
                *current = valid;
                true
            }
        });
    }

    pub fn steps(&self) -> &[FormStep] {
        &self.steps
    }

    pub fn bean_type(&self) -> &str {
        &self.bean_type
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn taste(&self, field: TasteField) -> &str {
        &self.taste[Self::taste_index(field)]
    }

    fn taste_index(field: TasteField) -> usize {
        match field {
            TasteField::Acidity => 0,
            TasteField::Sweetness => 1,
            TasteField::Bitterness => 2,
            TasteField::Aroma => 3,
            TasteField::Overall => 4,
        }
    }

    pub fn set_bean_type(&mut self, value: impl Into<String>) {
        self.bean_type = value.into();
        self.notify();
    }

    pub fn set_temperature(&mut self, value: impl Into<String>) {
        self.temperature = value.into();
        self.notify();
    }

    pub fn set_bean_amount(&mut self, value: impl Into<String>) {
        self.bean_amount = value.into();
        self.notify();
    }

    pub fn set_taste(&mut self, field: TasteField, value: impl Into<String>) {
        self.taste[Self::taste_index(field)] = value.into();
        self.notify();
    }

    pub fn set_notes(&mut self, value: impl Into<String>) {
        self.notes = value.into();
        self.notify();
    }

    pub fn set_date(&mut self, date: Option<DateTime<Utc>>) {
        self.date = date;
    }

    pub fn add_step(&mut self) {
        self.steps.push(FormStep {
            time: 0,
            grams: 0.0,
        });
        self.notify();
    }

    /// Removes a step. The last remaining step cannot be removed.
    pub fn remove_step(&mut self, index: usize) -> bool {
        if self.steps.len() <= 1 || index >= self.steps.len() {
            return false;
        }
        self.steps.remove(index);
        self.notify();
        true
    }

    pub fn set_step_time(&mut self, index: usize, raw: &str) {
        if let Some(step) = self.steps.get_mut(index) {
            step.time = parse_leading_int(raw);
            self.notify();
        }
    }

    pub fn set_step_grams(&mut self, index: usize, raw: &str) {
        if let Some(step) = self.steps.get_mut(index) {
            step.grams = parse_leading_int(raw) as f64;
            self.notify();
        }
    }

    /// Replaces every step at once, e.g. from parsed command-line input.
    pub fn set_steps(&mut self, steps: Vec<FormStep>) {
        self.steps = steps;
        self.notify();
    }

    /// First failing rule, checked in field order.
    pub fn validate(&self) -> Result<(), FormError> {
        validation::validate_bean_type(&self.bean_type)?;
        validation::validate_steps(&self.steps)?;
        validation::validate_temperature(&self.temperature)?;
        validation::validate_bean_amount(&self.bean_amount)?;
        for field in TasteField::ALL {
            validation::validate_taste(field, self.taste(field))?;
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    fn rating(&self, field: TasteField) -> u8 {
        validation::parse_number(self.taste(field)).map_or(DEFAULT_TASTE_RATING, clamp_rating)
    }

    /// Builds the entry to persist. `now` is used when the form carries no
    /// date of its own. Water amount is the last step's grams.
    pub fn submit(&self, now: DateTime<Utc>) -> Result<NewCoffeeEntry, FormError> {
        self.validate()?;

        let extraction_steps: Vec<ExtractionStep> = self
            .steps
            .iter()
            .map(|step| ExtractionStep::new(step.time.max(0) as u64, step.grams))
            .collect();
        let water_amount = extraction_steps.last().map_or(0.0, |step| step.grams);

        Ok(NewCoffeeEntry {
            date: self.date.unwrap_or(now),
            bean_type: self.bean_type.trim().to_string(),
            extraction_steps,
            temperature: validation::validate_temperature(&self.temperature)?,
            bean_amount: validation::validate_bean_amount(&self.bean_amount)?,
            water_amount,
            taste: TasteProfile {
                acidity: self.rating(TasteField::Acidity),
                sweetness: self.rating(TasteField::Sweetness),
                bitterness: self.rating(TasteField::Bitterness),
                aroma: self.rating(TasteField::Aroma),
                overall: self.rating(TasteField::Overall),
            },
            notes: self.notes.clone(),
        })
    }
}
