pub mod clock;
pub mod controller;
pub mod handoff;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{TimerController, DEFAULT_TICK_INTERVAL};
pub use handoff::ExtractionHandoff;
pub use state::{
    BrewField, BrewInputs, ExtractionLap, ExtractionPhase, ExtractionTimer, TimerError,
    TimerSnapshot, DEFAULT_POUR_INCREMENTS,
};
