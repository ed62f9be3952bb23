//! AI analysis payload handling
//!
//! The analysis provider returns untrusted JSON. This module parses it into an
//! intermediate structure where every field is optional, then validates it
//! into a [`FoodAnalysis`]. Any missing or out-of-range required field makes
//! the whole result unavailable; a partial analysis is never produced.

mod amount;
mod payload;

pub use amount::{parse_amount, to_canonical, to_grams, Amount, AmountUnit};
pub use payload::{strip_code_fences, ChronoAdvice, FoodAnalysis, Macros, NutrientInfo};
