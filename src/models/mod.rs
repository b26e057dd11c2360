pub mod entry;

pub use entry::{
    clamp_rating, CoffeeEntry, ExtractionStep, NewCoffeeEntry, TasteProfile, DEFAULT_TASTE_RATING,
};
