//! Circadian rule sets
//!
//! A rule set is read-only reference data: loaded once (built-in defaults or a
//! JSON file) and shared across evaluations.

use crate::error::NutriError;
use crate::types::{CircadianRule, Nutrient};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use tracing::debug;

/// Validated, immutable collection of circadian rules
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<CircadianRule>,
}

impl RuleSet {
    /// Create a rule set, validating every rule
    pub fn new(rules: Vec<CircadianRule>) -> Result<Self, NutriError> {
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self { rules })
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Parse a JSON array of rules.
    ///
    /// Rules naming a nutrient the profile does not track are skipped.
    /// A malformed window or factor on a tracked nutrient is an error.
    pub fn from_json(json: &str) -> Result<Self, NutriError> {
        let raw: Vec<RawRule> = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: Vec<RawRule>) -> Result<Self, NutriError> {
        let mut rules = Vec::with_capacity(raw.len());

        for r in raw {
            let Some(nutrient) = Nutrient::from_name(&r.nutrient) else {
                debug!(nutrient = %r.nutrient, "skipping rule for untracked nutrient");
                continue;
            };
            rules.push(CircadianRule {
                nutrient,
                window_start: r.window_start,
                window_end: r.window_end,
                efficiency_factor: r.efficiency_factor,
                reason: r.reason,
            });
        }

        Self::new(rules)
    }

    pub fn to_json(&self) -> Result<String, NutriError> {
        Ok(serde_json::to_string_pretty(&self.rules)?)
    }

    pub fn rules(&self) -> &[CircadianRule] {
        &self.rules
    }

    /// True when at least one rule targets `nutrient`
    pub fn covers(&self, nutrient: Nutrient) -> bool {
        self.rules.iter().any(|r| r.nutrient == nutrient)
    }
}

impl Default for RuleSet {
    /// Built-in chrono-nutrition rules
    fn default() -> Self {
        let rule = |nutrient, start, end, factor, reason: &str| CircadianRule {
            nutrient,
            window_start: start,
            window_end: end,
            efficiency_factor: factor,
            reason: reason.to_string(),
        };

        Self {
            rules: vec![
                rule(
                    Nutrient::VitaminC,
                    6,
                    10,
                    1.2,
                    "Morning intake supports iron uptake and daytime antioxidant demand",
                ),
                rule(
                    Nutrient::Iron,
                    6,
                    10,
                    1.3,
                    "Hepcidin is lowest in the morning, so non-heme iron absorbs best early",
                ),
                rule(
                    Nutrient::Calcium,
                    18,
                    21,
                    1.15,
                    "Evening calcium matches overnight bone remodeling",
                ),
                rule(
                    Nutrient::VitaminD,
                    11,
                    14,
                    1.2,
                    "Fat-soluble; absorbs best with the largest midday meal",
                ),
                rule(
                    Nutrient::Magnesium,
                    19,
                    22,
                    1.1,
                    "Evening magnesium supports muscle relaxation and sleep",
                ),
                rule(
                    Nutrient::Zinc,
                    18,
                    22,
                    1.1,
                    "Taken away from morning iron to avoid competing for transport",
                ),
            ],
        }
    }
}

impl Deref for RuleSet {
    type Target = [CircadianRule];

    fn deref(&self) -> &Self::Target {
        &self.rules
    }
}

impl<'de> Deserialize<'de> for RuleSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Vec::<RawRule>::deserialize(deserializer)?;
        RuleSet::from_raw(raw).map_err(serde::de::Error::custom)
    }
}

/// Rule as it appears in rule files; nutrient names are free text
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRule {
    nutrient: String,
    window_start: u32,
    window_end: u32,
    efficiency_factor: f64,
    #[serde(default)]
    reason: String,
}
