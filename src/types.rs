//! Core types for the NutriScan engine
//!
//! This module defines the data structures the scoring engine consumes and
//! produces: tracked nutrients, nutrient profiles, circadian rules, interaction
//! entries, and scores.

use crate::error::NutriError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Neutral reference score (no adjustment)
pub const BASELINE_SCORE: f64 = 100.0;

/// Tracked nutrient identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Nutrient {
    VitaminC,
    Iron,
    Calcium,
    VitaminD,
    Magnesium,
    Zinc,
}

impl Nutrient {
    /// Number of tracked nutrients
    pub const COUNT: usize = 6;

    /// Every tracked nutrient, in profile order
    pub const ALL: [Nutrient; Nutrient::COUNT] = [
        Nutrient::VitaminC,
        Nutrient::Iron,
        Nutrient::Calcium,
        Nutrient::VitaminD,
        Nutrient::Magnesium,
        Nutrient::Zinc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Nutrient::VitaminC => "Vitamin C",
            Nutrient::Iron => "Iron",
            Nutrient::Calcium => "Calcium",
            Nutrient::VitaminD => "Vitamin D",
            Nutrient::Magnesium => "Magnesium",
            Nutrient::Zinc => "Zinc",
        }
    }

    /// Canonical unit for profile quantities
    pub fn unit(&self) -> NutrientUnit {
        match self {
            Nutrient::VitaminD => NutrientUnit::Iu,
            _ => NutrientUnit::Milligrams,
        }
    }

    fn index(&self) -> usize {
        match self {
            Nutrient::VitaminC => 0,
            Nutrient::Iron => 1,
            Nutrient::Calcium => 2,
            Nutrient::VitaminD => 3,
            Nutrient::Magnesium => 4,
            Nutrient::Zinc => 5,
        }
    }

    /// Resolve a free-text nutrient name.
    ///
    /// Matching ignores case, whitespace, underscores and hyphens, so
    /// "Vitamin C", "vitamin_c" and "VITAMINC" all resolve to `VitaminC`.
    /// Returns `None` for names the profile does not track.
    pub fn from_name(name: &str) -> Option<Nutrient> {
        let key: String = name
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "vitaminc" | "vitc" | "ascorbicacid" => Some(Nutrient::VitaminC),
            "iron" | "fe" => Some(Nutrient::Iron),
            "calcium" | "ca" => Some(Nutrient::Calcium),
            "vitamind" | "vitd" | "vitamind3" | "cholecalciferol" => Some(Nutrient::VitaminD),
            "magnesium" | "mg" => Some(Nutrient::Magnesium),
            "zinc" | "zn" => Some(Nutrient::Zinc),
            _ => None,
        }
    }
}

impl fmt::Display for Nutrient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Nutrient {
    type Err = NutriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Nutrient::from_name(s)
            .ok_or_else(|| NutriError::invalid(format!("untracked nutrient '{}'", s)))
    }
}

impl TryFrom<String> for Nutrient {
    type Error = NutriError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Nutrient> for String {
    fn from(n: Nutrient) -> Self {
        n.as_str().to_string()
    }
}

/// Canonical measurement unit of a profile quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NutrientUnit {
    Milligrams,
    /// International units (Vitamin D)
    Iu,
}

/// Quantities of each tracked nutrient in one analyzed food.
///
/// Immutable once constructed. Every constructor rejects negative or
/// non-finite quantities with [`NutriError::InvalidInput`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "ProfileQuantities", into = "ProfileQuantities")]
pub struct NutrientProfile {
    quantities: [f64; Nutrient::COUNT],
}

impl NutrientProfile {
    /// Create a profile from quantities in [`Nutrient::ALL`] order
    pub fn new(quantities: [f64; Nutrient::COUNT]) -> Result<Self, NutriError> {
        for (nutrient, quantity) in Nutrient::ALL.iter().zip(quantities.iter()) {
            check_quantity(*nutrient, *quantity)?;
        }
        Ok(Self { quantities })
    }

    /// Create a profile from `(nutrient, quantity)` pairs.
    ///
    /// Nutrients not listed are zero; repeated nutrients are summed.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, NutriError>
    where
        I: IntoIterator<Item = (Nutrient, f64)>,
    {
        let mut quantities = [0.0; Nutrient::COUNT];
        for (nutrient, quantity) in pairs {
            check_quantity(nutrient, quantity)?;
            let slot = &mut quantities[nutrient.index()];
            *slot += quantity;
            check_quantity(nutrient, *slot)?;
        }
        Ok(Self { quantities })
    }

    /// Return a copy of this profile with one quantity replaced
    pub fn with(mut self, nutrient: Nutrient, quantity: f64) -> Result<Self, NutriError> {
        check_quantity(nutrient, quantity)?;
        self.quantities[nutrient.index()] = quantity;
        Ok(self)
    }

    pub fn quantity(&self, nutrient: Nutrient) -> f64 {
        self.quantities[nutrient.index()]
    }

    /// A nutrient is present when its quantity is strictly positive
    pub fn is_present(&self, nutrient: Nutrient) -> bool {
        self.quantity(nutrient) > 0.0
    }

    /// Iterate over nutrients with a non-zero quantity
    pub fn present(&self) -> impl Iterator<Item = (Nutrient, f64)> + '_ {
        Nutrient::ALL
            .iter()
            .map(move |n| (*n, self.quantity(*n)))
            .filter(|(_, q)| *q > 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

fn check_quantity(nutrient: Nutrient, quantity: f64) -> Result<(), NutriError> {
    if !quantity.is_finite() {
        return Err(NutriError::invalid(format!(
            "{} quantity must be finite, got {}",
            nutrient, quantity
        )));
    }
    if quantity < 0.0 {
        return Err(NutriError::invalid(format!(
            "{} quantity must be non-negative, got {}",
            nutrient, quantity
        )));
    }
    Ok(())
}

/// Wire shape of a profile: one camelCase key per nutrient, missing keys are zero
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProfileQuantities {
    vitamin_c: f64,
    iron: f64,
    calcium: f64,
    vitamin_d: f64,
    magnesium: f64,
    zinc: f64,
}

impl TryFrom<ProfileQuantities> for NutrientProfile {
    type Error = NutriError;

    fn try_from(q: ProfileQuantities) -> Result<Self, Self::Error> {
        NutrientProfile::new([
            q.vitamin_c,
            q.iron,
            q.calcium,
            q.vitamin_d,
            q.magnesium,
            q.zinc,
        ])
    }
}

impl From<NutrientProfile> for ProfileQuantities {
    fn from(p: NutrientProfile) -> Self {
        Self {
            vitamin_c: p.quantity(Nutrient::VitaminC),
            iron: p.quantity(Nutrient::Iron),
            calcium: p.quantity(Nutrient::Calcium),
            vitamin_d: p.quantity(Nutrient::VitaminD),
            magnesium: p.quantity(Nutrient::Magnesium),
            zinc: p.quantity(Nutrient::Zinc),
        }
    }
}

/// Circadian absorption rule for one nutrient.
///
/// Inside `[window_start, window_end]` (inclusive, hour granularity) the
/// nutrient is absorbed with `efficiency_factor`; outside, the engine applies
/// its fixed out-of-window penalty. Windows never cross midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircadianRule {
    pub nutrient: Nutrient,
    /// Hour of day (0-23)
    pub window_start: u32,
    /// Hour of day (0-23), never before `window_start`
    pub window_end: u32,
    /// Multiplier inside the window, e.g. 1.2 for a 20% boost
    pub efficiency_factor: f64,
    pub reason: String,
}

impl CircadianRule {
    pub fn new(
        nutrient: Nutrient,
        window_start: u32,
        window_end: u32,
        efficiency_factor: f64,
        reason: impl Into<String>,
    ) -> Result<Self, NutriError> {
        let rule = Self {
            nutrient,
            window_start,
            window_end,
            efficiency_factor,
            reason: reason.into(),
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Check the window and factor invariants
    pub fn validate(&self) -> Result<(), NutriError> {
        if self.window_start > 23 || self.window_end > 23 {
            return Err(NutriError::invalid(format!(
                "{} rule window {}-{} has an hour outside 0-23",
                self.nutrient, self.window_start, self.window_end
            )));
        }
        if self.window_start > self.window_end {
            return Err(NutriError::invalid(format!(
                "{} rule window {}-{} crosses midnight",
                self.nutrient, self.window_start, self.window_end
            )));
        }
        if !self.efficiency_factor.is_finite() || self.efficiency_factor <= 0.0 {
            return Err(NutriError::invalid(format!(
                "{} rule efficiency factor must be positive, got {}",
                self.nutrient, self.efficiency_factor
            )));
        }
        Ok(())
    }

    pub fn contains_hour(&self, hour: u32) -> bool {
        (self.window_start..=self.window_end).contains(&hour)
    }
}

/// Pairwise interaction classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    /// Enhances absorption
    Synergy,
    /// Inhibits absorption
    Antagonism,
    Neutral,
}

impl InteractionType {
    /// Normalize a free-text label.
    ///
    /// Case-insensitive exact match against "Synergy" and "Antagonism";
    /// anything else is `Neutral`.
    pub fn from_label(label: &str) -> InteractionType {
        let label = label.trim();
        if label.eq_ignore_ascii_case("synergy") {
            InteractionType::Synergy
        } else if label.eq_ignore_ascii_case("antagonism") {
            InteractionType::Antagonism
        } else {
            InteractionType::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::Synergy => "synergy",
            InteractionType::Antagonism => "antagonism",
            InteractionType::Neutral => "neutral",
        }
    }
}

/// Catalog entry describing how two nutrients affect each other
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEntry {
    pub nutrient_a: Nutrient,
    pub nutrient_b: Nutrient,
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
    /// Multiplier, e.g. 1.5 for a 50% boost
    pub magnitude: f64,
    #[serde(default)]
    pub description: String,
}

impl InteractionEntry {
    pub fn validate(&self) -> Result<(), NutriError> {
        if !self.magnitude.is_finite() || self.magnitude <= 0.0 {
            return Err(NutriError::invalid(format!(
                "{}/{} interaction magnitude must be positive, got {}",
                self.nutrient_a, self.nutrient_b, self.magnitude
            )));
        }
        Ok(())
    }

    pub fn involves(&self, nutrient: Nutrient) -> bool {
        self.nutrient_a == nutrient || self.nutrient_b == nutrient
    }
}

/// Relative bioavailability; 100 is the neutral baseline, unbounded above
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(f64);

impl Score {
    pub const BASELINE: Score = Score(BASELINE_SCORE);

    pub(crate) fn from_multiplier(multiplier: f64) -> Self {
        Score(BASELINE_SCORE * multiplier)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

impl From<Score> for f64 {
    fn from(s: Score) -> Self {
        s.0
    }
}

/// How one relevant rule contributed to a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub nutrient: Nutrient,
    pub in_window: bool,
    /// Factor multiplied into the score
    pub factor: f64,
    pub reason: String,
}

/// Score with the per-rule evaluation that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Resolved hour of day (0-23)
    pub hour: u32,
    pub outcomes: Vec<RuleOutcome>,
    /// Rules skipped because their nutrient is absent from the profile
    pub skipped_rules: usize,
    pub score: Score,
}
