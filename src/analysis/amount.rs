//! Amount text parsing
//!
//! The provider reports amounts as free text ("10mg", "2.5 g", "400 IU").
//! These helpers turn them into numbers in a nutrient's canonical unit.

use crate::types::{Nutrient, NutrientUnit};

/// Unit found in an amount string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountUnit {
    Grams,
    Milligrams,
    Micrograms,
    Iu,
    /// No unit given
    Unspecified,
}

/// Parsed amount
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Amount {
    pub value: f64,
    pub unit: AmountUnit,
}

// Longer suffixes first so "mg" is not read as "g"
const SUFFIXES: &[(&str, AmountUnit)] = &[
    ("micrograms", AmountUnit::Micrograms),
    ("microgram", AmountUnit::Micrograms),
    ("milligrams", AmountUnit::Milligrams),
    ("milligram", AmountUnit::Milligrams),
    ("grams", AmountUnit::Grams),
    ("gram", AmountUnit::Grams),
    ("mcg", AmountUnit::Micrograms),
    ("µg", AmountUnit::Micrograms),
    ("μg", AmountUnit::Micrograms),
    ("ug", AmountUnit::Micrograms),
    ("mg", AmountUnit::Milligrams),
    ("iu", AmountUnit::Iu),
    ("g", AmountUnit::Grams),
];

/// Parse an amount like "10mg", "10 mg", "~2.5 g", "10-20 mg" or "400 IU".
///
/// Ranges resolve to their midpoint. Returns `None` for text without a
/// non-negative number.
pub fn parse_amount(text: &str) -> Option<Amount> {
    let lower = text.trim().to_lowercase();
    let trimmed = lower
        .trim_start_matches('~')
        .trim_start_matches("about")
        .trim_start_matches("approx.")
        .trim_start_matches("approx")
        .trim();

    let (num_part, unit) = SUFFIXES
        .iter()
        .find(|(suffix, _)| trimmed.ends_with(suffix))
        .map(|(suffix, unit)| (trimmed[..trimmed.len() - suffix.len()].trim(), *unit))
        .unwrap_or((trimmed, AmountUnit::Unspecified));

    let value = parse_number_or_range(num_part)?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    Some(Amount { value, unit })
}

fn parse_number_or_range(s: &str) -> Option<f64> {
    if let Some((low, high)) = s.split_once('-') {
        let (low, high) = (low.trim(), high.trim());
        if !low.is_empty() && !high.is_empty() {
            let low = low.parse::<f64>().ok()?;
            let high = high.parse::<f64>().ok()?;
            return Some((low + high) / 2.0);
        }
    }
    s.parse::<f64>().ok()
}

/// Micrograms of vitamin D per international unit
const VITAMIN_D_MCG_PER_IU: f64 = 0.025;

/// Convert an amount to `nutrient`'s canonical unit.
///
/// Unitless amounts are taken as already canonical. IU amounts only convert
/// for vitamin D.
pub fn to_canonical(nutrient: Nutrient, amount: Amount) -> Option<f64> {
    match nutrient.unit() {
        NutrientUnit::Milligrams => match amount.unit {
            AmountUnit::Grams => Some(amount.value * 1000.0),
            AmountUnit::Milligrams | AmountUnit::Unspecified => Some(amount.value),
            AmountUnit::Micrograms => Some(amount.value / 1000.0),
            AmountUnit::Iu => None,
        },
        NutrientUnit::Iu => match amount.unit {
            AmountUnit::Iu | AmountUnit::Unspecified => Some(amount.value),
            AmountUnit::Micrograms => Some(amount.value / VITAMIN_D_MCG_PER_IU),
            AmountUnit::Milligrams => Some(amount.value * 1000.0 / VITAMIN_D_MCG_PER_IU),
            AmountUnit::Grams => Some(amount.value * 1_000_000.0 / VITAMIN_D_MCG_PER_IU),
        },
    }
}

/// Convert an amount to grams (macronutrients); unitless means grams
pub fn to_grams(amount: Amount) -> Option<f64> {
    match amount.unit {
        AmountUnit::Grams | AmountUnit::Unspecified => Some(amount.value),
        AmountUnit::Milligrams => Some(amount.value / 1000.0),
        AmountUnit::Micrograms => Some(amount.value / 1_000_000.0),
        AmountUnit::Iu => None,
    }
}
