use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    clock::{Clock, SystemClock},
    handoff::ExtractionHandoff,
};
use crate::models::ExtractionStep;

/// Quick-adjust buttons offered while a pour amount is being entered.
pub const DEFAULT_POUR_INCREMENTS: [f64; 6] = [100.0, 50.0, 10.0, 5.0, 1.0, -10.0];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ExtractionPhase {
    #[default]
    Idle,
    Running,
    AwaitingLapAmount,
    Finished,
}

impl ExtractionPhase {
    /// Running or waiting on a pour amount. The clock keeps going in both.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::AwaitingLapAmount)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionLap {
    /// Milliseconds from brew start to the moment the pour began.
    pub time: u64,
    pub water_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrewField {
    BeanType,
    BeanAmount,
    Temperature,
}

impl fmt::Display for BrewField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BrewField::BeanType => "bean type",
            BrewField::BeanAmount => "bean amount",
            BrewField::Temperature => "water temperature",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("please enter a valid {0}")]
    InvalidField(BrewField),
    #[error("an extraction is already in progress")]
    AlreadyRunning,
}

/// Brew setup as typed by the user, before parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrewInputs {
    pub bean_type: String,
    pub bean_amount: String,
    pub temperature: String,
    /// Optional bloom pour recorded at time zero.
    pub steam_amount: String,
}

#[derive(Debug, Clone, PartialEq)]
struct BrewSetup {
    bean_type: String,
    bean_amount: f64,
    temperature: f64,
}

fn parse_positive(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value > 0.0)
}

impl BrewInputs {
    fn validate(&self) -> Result<BrewSetup, TimerError> {
        let bean_type = self.bean_type.trim();
        if bean_type.is_empty() {
            return Err(TimerError::InvalidField(BrewField::BeanType));
        }
        let bean_amount = parse_positive(&self.bean_amount)
            .ok_or(TimerError::InvalidField(BrewField::BeanAmount))?;
        let temperature = parse_positive(&self.temperature)
            .ok_or(TimerError::InvalidField(BrewField::Temperature))?;
        Ok(BrewSetup {
            bean_type: self.bean_type.clone(),
            bean_amount,
            temperature,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub phase: ExtractionPhase,
    pub elapsed_ms: u64,
    pub laps: Vec<ExtractionLap>,
    pub pending_amount: f64,
    pub bean_type: Option<String>,
}

impl TimerSnapshot {
    /// Whole seconds shown on the display. Truncated, never rounded.
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_ms / 1000
    }
}

impl Default for TimerSnapshot {
    fn default() -> Self {
        Self {
            phase: ExtractionPhase::Idle,
            elapsed_ms: 0,
            laps: Vec::new(),
            pending_amount: 0.0,
            bean_type: None,
        }
    }
}

/// Stopwatch and pour recorder.
///
/// Transitions are plain method calls against an injected clock; nothing in
/// here schedules work. Calls that do not apply to the current phase are
/// ignored rather than reported.
pub struct ExtractionTimer {
    clock: Arc<dyn Clock>,
    phase: ExtractionPhase,
    setup: Option<BrewSetup>,
    started_at: Option<DateTime<Utc>>,
    lap_started_at: Option<DateTime<Utc>>,
    laps: Vec<ExtractionLap>,
    pending_amount: f64,
}

impl Default for ExtractionTimer {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl ExtractionTimer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            phase: ExtractionPhase::Idle,
            setup: None,
            started_at: None,
            lap_started_at: None,
            laps: Vec::new(),
            pending_amount: 0.0,
        }
    }

    pub fn phase(&self) -> ExtractionPhase {
        self.phase
    }

    pub fn laps(&self) -> &[ExtractionLap] {
        &self.laps
    }

    pub fn pending_amount(&self) -> f64 {
        self.pending_amount
    }

    fn ms_since(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> u64 {
        (until - since).num_milliseconds().max(0) as u64
    }

    pub fn elapsed_ms(&self) -> u64 {
        match (self.phase.is_active(), self.started_at) {
            (true, Some(started_at)) => self.ms_since(started_at, self.clock.now()),
            _ => 0,
        }
    }

    fn last_lap_amount(&self) -> f64 {
        self.laps.last().map_or(0.0, |lap| lap.water_amount)
    }

    pub fn start(&mut self, inputs: &BrewInputs) -> Result<(), TimerError> {
        if self.phase.is_active() {
            return Err(TimerError::AlreadyRunning);
        }
        let setup = inputs.validate()?;

        self.laps.clear();
        if let Some(steam) = parse_positive(&inputs.steam_amount) {
            self.laps.push(ExtractionLap {
                time: 0,
                water_amount: steam,
            });
        }
        self.started_at = Some(self.clock.now());
        self.lap_started_at = None;
        self.pending_amount = 0.0;
        self.setup = Some(setup);
        self.phase = ExtractionPhase::Running;
        Ok(())
    }

    /// Marks the start of a pour. The pending amount starts from the last
    /// pour as a convenience.
    pub fn begin_lap(&mut self) {
        if self.phase != ExtractionPhase::Running {
            return;
        }
        self.lap_started_at = Some(self.clock.now());
        self.pending_amount = self.last_lap_amount();
        self.phase = ExtractionPhase::AwaitingLapAmount;
    }

    /// Adds `delta` grams to the pending pour. The total never drops below
    /// zero but may go under the previous pour.
    pub fn adjust_amount(&mut self, delta: f64) {
        if self.phase != ExtractionPhase::AwaitingLapAmount || !delta.is_finite() {
            return;
        }
        self.pending_amount = (self.pending_amount + delta).max(0.0);
    }

    pub fn reset_amount(&mut self) {
        if self.phase != ExtractionPhase::AwaitingLapAmount {
            return;
        }
        self.pending_amount = self.last_lap_amount();
    }

    pub fn can_confirm(&self) -> bool {
        self.phase == ExtractionPhase::AwaitingLapAmount && self.pending_amount > 0.0
    }

    /// Records the pending pour. Returns `false` and changes nothing when the
    /// amount is not positive.
    pub fn confirm_lap(&mut self) -> bool {
        if !self.can_confirm() {
            return false;
        }
        let (Some(started_at), Some(lap_started_at)) = (self.started_at, self.lap_started_at)
        else {
            return false;
        };
        self.laps.push(ExtractionLap {
            time: self.ms_since(started_at, lap_started_at),
            water_amount: self.pending_amount,
        });
        self.pending_amount = 0.0;
        self.lap_started_at = None;
        self.phase = ExtractionPhase::Running;
        true
    }

    pub fn cancel_lap(&mut self) {
        if self.phase != ExtractionPhase::AwaitingLapAmount {
            return;
        }
        self.pending_amount = 0.0;
        self.lap_started_at = None;
        self.phase = ExtractionPhase::Running;
    }

    /// Ends the extraction and packages it for the entry form.
    ///
    /// Only valid while `Running`. Timer data is cleared whatever the caller
    /// does with the result.
    pub fn finish(&mut self) -> Option<ExtractionHandoff> {
        if self.phase != ExtractionPhase::Running {
            return None;
        }
        let setup = self.setup.take()?;
        let elapsed_ms = self.elapsed_ms();

        let extraction_steps = self
            .laps
            .iter()
            .map(|lap| ExtractionStep {
                time: lap.time / 1000,
                grams: lap.water_amount,
            })
            .collect();
        let water_amount = self.laps.iter().map(|lap| lap.water_amount).sum();

        let handoff = ExtractionHandoff {
            date: self.clock.now(),
            bean_type: setup.bean_type,
            extraction_steps,
            temperature: setup.temperature,
            bean_amount: setup.bean_amount,
            water_amount,
            extraction_end_time: elapsed_ms / 1000,
        };

        self.laps.clear();
        self.started_at = None;
        self.lap_started_at = None;
        self.pending_amount = 0.0;
        self.phase = ExtractionPhase::Finished;
        Some(handoff)
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.phase,
            elapsed_ms: self.elapsed_ms(),
            laps: self.laps.clone(),
            pending_amount: self.pending_amount,
            bean_type: self.setup.as_ref().map(|setup| setup.bean_type.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::timer::clock::ManualClock;

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 8, 1, 6, 30, 0).unwrap())
    }

    fn inputs(steam: &str) -> BrewInputs {
        BrewInputs {
            bean_type: "Ethiopia Yirgacheffe".into(),
            bean_amount: "15".into(),
            temperature: "92".into(),
            steam_amount: steam.into(),
        }
    }

    fn running_timer(clock: &ManualClock, steam: &str) -> ExtractionTimer {
        let mut timer = ExtractionTimer::new(Arc::new(clock.clone()));
        timer.start(&inputs(steam)).expect("start");
        timer
    }

    fn pour(timer: &mut ExtractionTimer, clock: &ManualClock, at_ms_after: i64, grams: f64) {
        clock.advance_ms(at_ms_after);
        timer.begin_lap();
        timer.adjust_amount(grams - timer.pending_amount());
        clock.advance_ms(4_000);
        assert!(timer.confirm_lap());
    }

    #[test]
    fn laps_record_cumulative_time_and_sum_water() {
        let clock = clock();
        let mut timer = running_timer(&clock, "");

        pour(&mut timer, &clock, 12_000, 50.0);
        // pour() advanced 4s while the amount was entered; lap start is 47s.
        pour(&mut timer, &clock, 31_000, 30.0);

        let handoff = timer.finish().expect("handoff");
        assert_eq!(
            handoff.extraction_steps,
            vec![ExtractionStep::new(12, 50.0), ExtractionStep::new(47, 30.0)]
        );
        assert_eq!(handoff.water_amount, 80.0);
        assert_eq!(handoff.extraction_end_time, 51);
        assert_eq!(handoff.bean_type, "Ethiopia Yirgacheffe");
        assert_eq!(handoff.bean_amount, 15.0);
        assert_eq!(handoff.temperature, 92.0);
    }

    #[test]
    fn lap_times_are_floored_to_seconds() {
        let clock = clock();
        let mut timer = running_timer(&clock, "");
        clock.advance_ms(12_999);
        timer.begin_lap();
        timer.adjust_amount(40.0);
        assert!(timer.confirm_lap());
        clock.advance_ms(500);

        let handoff = timer.finish().expect("handoff");
        assert_eq!(handoff.extraction_steps[0].time, 12);
        assert_eq!(handoff.extraction_end_time, 13);
    }

    #[test]
    fn steam_amount_seeds_a_zero_time_step() {
        let clock = clock();
        let mut timer = running_timer(&clock, "40");
        assert_eq!(
            timer.laps(),
            &[ExtractionLap {
                time: 0,
                water_amount: 40.0
            }]
        );

        clock.advance_ms(1_000);
        let handoff = timer.finish().expect("handoff");
        assert_eq!(handoff.extraction_steps, vec![ExtractionStep::new(0, 40.0)]);
        assert_eq!(handoff.water_amount, 40.0);
    }

    #[test]
    fn zero_or_blank_steam_amount_is_ignored() {
        let clock = clock();
        assert!(running_timer(&clock, "0").laps().is_empty());
        assert!(running_timer(&clock, "  ").laps().is_empty());
        assert!(running_timer(&clock, "abc").laps().is_empty());
    }

    #[test]
    fn start_rejects_each_invalid_field() {
        let clock = clock();
        let mut timer = ExtractionTimer::new(Arc::new(clock));

        let mut bad = inputs("");
        bad.bean_type = "   ".into();
        assert_eq!(
            timer.start(&bad),
            Err(TimerError::InvalidField(BrewField::BeanType))
        );

        let mut bad = inputs("");
        bad.bean_amount = "-3".into();
        assert_eq!(
            timer.start(&bad),
            Err(TimerError::InvalidField(BrewField::BeanAmount))
        );

        let mut bad = inputs("");
        bad.temperature = "hot".into();
        assert_eq!(
            timer.start(&bad),
            Err(TimerError::InvalidField(BrewField::Temperature))
        );

        assert_eq!(timer.phase(), ExtractionPhase::Idle);
    }

    #[test]
    fn start_while_active_is_refused() {
        let clock = clock();
        let mut timer = running_timer(&clock, "");
        assert_eq!(timer.start(&inputs("")), Err(TimerError::AlreadyRunning));
        timer.begin_lap();
        assert_eq!(timer.start(&inputs("")), Err(TimerError::AlreadyRunning));
    }

    #[test]
    fn confirm_with_zero_amount_is_rejected() {
        let clock = clock();
        let mut timer = running_timer(&clock, "");
        timer.begin_lap();
        assert!(!timer.can_confirm());
        assert!(!timer.confirm_lap());
        assert!(timer.laps().is_empty());
        assert_eq!(timer.phase(), ExtractionPhase::AwaitingLapAmount);
    }

    #[test]
    fn idle_timer_ignores_lap_and_finish() {
        let mut timer = ExtractionTimer::new(Arc::new(clock()));
        timer.begin_lap();
        assert_eq!(timer.phase(), ExtractionPhase::Idle);
        assert!(timer.finish().is_none());
        assert_eq!(timer.snapshot(), TimerSnapshot::default());
    }

    #[test]
    fn begin_lap_prefills_from_previous_pour() {
        let clock = clock();
        let mut timer = running_timer(&clock, "");
        timer.begin_lap();
        assert_eq!(timer.pending_amount(), 0.0);
        timer.adjust_amount(60.0);
        assert!(timer.confirm_lap());

        timer.begin_lap();
        assert_eq!(timer.pending_amount(), 60.0);
        timer.adjust_amount(100.0);
        timer.reset_amount();
        assert_eq!(timer.pending_amount(), 60.0);
    }

    #[test]
    fn negative_adjustment_floors_at_zero() {
        let clock = clock();
        let mut timer = running_timer(&clock, "30");
        timer.begin_lap();
        timer.adjust_amount(-10.0);
        assert_eq!(timer.pending_amount(), 20.0);
        timer.adjust_amount(-10.0);
        timer.adjust_amount(-10.0);
        timer.adjust_amount(-10.0);
        assert_eq!(timer.pending_amount(), 0.0);
        assert!(!timer.can_confirm());
    }

    #[test]
    fn cancel_discards_pending_pour() {
        let clock = clock();
        let mut timer = running_timer(&clock, "");
        timer.begin_lap();
        timer.adjust_amount(50.0);
        timer.cancel_lap();
        assert_eq!(timer.phase(), ExtractionPhase::Running);
        assert_eq!(timer.pending_amount(), 0.0);
        assert!(timer.laps().is_empty());
    }

    #[test]
    fn finish_is_ignored_while_a_pour_is_open() {
        let clock = clock();
        let mut timer = running_timer(&clock, "");
        timer.begin_lap();
        assert!(timer.finish().is_none());
        assert_eq!(timer.phase(), ExtractionPhase::AwaitingLapAmount);
    }

    #[test]
    fn finish_clears_state_and_allows_a_new_start() {
        let clock = clock();
        let mut timer = running_timer(&clock, "40");
        clock.advance_ms(20_000);
        timer.finish().expect("handoff");

        assert_eq!(timer.phase(), ExtractionPhase::Finished);
        assert_eq!(timer.elapsed_ms(), 0);
        assert!(timer.laps().is_empty());
        assert!(timer.finish().is_none());

        timer.start(&inputs("")).expect("restart");
        assert_eq!(timer.phase(), ExtractionPhase::Running);
        assert_eq!(timer.elapsed_ms(), 0);
    }

    #[test]
    fn elapsed_keeps_running_while_awaiting_amount() {
        let clock = clock();
        let mut timer = running_timer(&clock, "");
        clock.advance_ms(2_500);
        timer.begin_lap();
        clock.advance_ms(1_000);
        let snapshot = timer.snapshot();
        assert_eq!(snapshot.elapsed_ms, 3_500);
        assert_eq!(snapshot.elapsed_secs(), 3);
    }
}
