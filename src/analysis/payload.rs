//! Provider payload parsing and validation

use crate::error::NutriError;
use crate::interactions::InteractionObservation;
use crate::types::{Nutrient, NutrientProfile};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::amount::{parse_amount, to_canonical, to_grams};

/// Validated food analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodAnalysis {
    pub food_name: String,
    pub estimated_calories: u32,
    pub nutrients: Vec<NutrientInfo>,
    pub benefits: Vec<String>,
    pub chrono_advice: ChronoAdvice,
    pub synergy: Vec<InteractionObservation>,
}

/// One nutrient line of an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutrientInfo {
    pub name: String,
    /// Free text, e.g. "10mg"
    pub amount: String,
    /// 0-100
    pub daily_value_percentage: u8,
}

/// Provider's timing advice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChronoAdvice {
    pub best_time: String,
    pub reasoning: String,
    /// Provider's own estimate, 0-100
    pub current_bioavailability_score: u8,
}

/// Macronutrients in grams
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Macros {
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl FoodAnalysis {
    /// Parse and validate a raw provider response.
    ///
    /// Markdown code fences around the JSON are removed first. Unknown fields
    /// are ignored. Every failure maps to [`NutriError::AnalysisUnavailable`].
    pub fn from_provider_json(raw: &str) -> Result<Self, NutriError> {
        let body = strip_code_fences(raw);
        if body.is_empty() {
            warn!("analysis payload rejected: empty body");
            return Err(NutriError::unavailable("empty analysis payload"));
        }

        let parsed: RawAnalysis = serde_json::from_str(body).map_err(|e| {
            warn!(error = %e, "analysis payload rejected: malformed JSON");
            NutriError::unavailable(format!("malformed analysis payload: {}", e))
        })?;

        parsed.validate().map_err(|field| {
            warn!(field = %field, "analysis payload rejected");
            NutriError::unavailable(format!("invalid or missing field: {}", field))
        })
    }

    /// Profile of tracked nutrients, in canonical units.
    ///
    /// Untracked names and unparseable or overflowing amounts contribute
    /// nothing; repeated nutrients are summed. A total that still cannot form
    /// a valid profile is [`NutriError::AnalysisUnavailable`].
    pub fn nutrient_profile(&self) -> Result<NutrientProfile, NutriError> {
        let mut pairs = Vec::new();

        for info in &self.nutrients {
            let Some(nutrient) = Nutrient::from_name(&info.name) else {
                debug!(name = %info.name, "nutrient not tracked");
                continue;
            };
            match parse_amount(&info.amount)
                .and_then(|a| to_canonical(nutrient, a))
                .filter(|q| q.is_finite())
            {
                Some(quantity) => pairs.push((nutrient, quantity)),
                None => debug!(name = %info.name, amount = %info.amount, "amount not convertible"),
            }
        }

        NutrientProfile::from_pairs(pairs).map_err(|e| {
            warn!(error = %e, "analysis payload rejected: nutrient totals");
            NutriError::unavailable(format!("invalid nutrient totals: {}", e))
        })
    }

    /// Protein, carbohydrate and fat totals from the nutrient list
    pub fn macros(&self) -> Macros {
        let mut macros = Macros::default();

        for info in &self.nutrients {
            let key = info.name.trim().to_lowercase();
            let slot = match key.as_str() {
                "protein" | "proteins" => &mut macros.protein_g,
                "carbohydrates" | "carbohydrate" | "carbs" | "total carbohydrates" => {
                    &mut macros.carbs_g
                }
                "fat" | "fats" | "total fat" => &mut macros.fat_g,
                _ => continue,
            };
            if let Some(grams) = parse_amount(&info.amount).and_then(to_grams) {
                *slot += grams;
            }
        }

        macros
    }
}

/// Extract the body of the first ``` fence, if any.
///
/// Text before the opening fence and after the closing one is dropped, and a
/// language tag such as `json` or `JSON` after the opening fence is skipped.
pub fn strip_code_fences(raw: &str) -> &str {
    let Some(start) = raw.find("```") else {
        return raw.trim();
    };
    let mut body = &raw[start + 3..];

    let tag_len = body
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(body.len());
    if tag_len > 0 && body[tag_len..].starts_with(|c: char| c.is_whitespace()) {
        body = &body[tag_len..];
    }

    if let Some(end) = body.find("```") {
        body = &body[..end];
    }
    body.trim()
}

// Provider response structures. Every field is optional so a missing field is
// reported by name instead of as a generic serde error.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    food_name: Option<String>,
    estimated_calories: Option<i64>,
    nutrients: Option<Vec<RawNutrient>>,
    benefits: Option<Vec<String>>,
    chrono_advice: Option<RawChronoAdvice>,
    synergy: Option<Vec<RawSynergy>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNutrient {
    name: Option<String>,
    amount: Option<String>,
    daily_value_percentage: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChronoAdvice {
    best_time: Option<String>,
    reasoning: Option<String>,
    current_bioavailability_score: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSynergy {
    nutrient_a: Option<String>,
    nutrient_b: Option<String>,
    interaction: Option<String>,
    description: Option<String>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, String> {
    value.ok_or_else(|| field.to_string())
}

fn percentage(value: Option<i64>, field: &str) -> Result<u8, String> {
    let v = required(value, field)?;
    if (0..=100).contains(&v) {
        Ok(v as u8)
    } else {
        Err(format!("{} (out of range: {})", field, v))
    }
}

impl RawAnalysis {
    /// Returns the offending field name on failure
    fn validate(self) -> Result<FoodAnalysis, String> {
        let food_name = required(self.food_name, "foodName")?;

        let calories = required(self.estimated_calories, "estimatedCalories")?;
        let estimated_calories = u32::try_from(calories)
            .map_err(|_| format!("estimatedCalories (out of range: {})", calories))?;

        let nutrients = required(self.nutrients, "nutrients")?
            .into_iter()
            .enumerate()
            .map(|(i, n)| -> Result<NutrientInfo, String> {
                Ok(NutrientInfo {
                    name: required(n.name, &format!("nutrients[{}].name", i))?,
                    amount: required(n.amount, &format!("nutrients[{}].amount", i))?,
                    daily_value_percentage: percentage(
                        n.daily_value_percentage,
                        &format!("nutrients[{}].dailyValuePercentage", i),
                    )?,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;

        let benefits = required(self.benefits, "benefits")?;

        let advice = required(self.chrono_advice, "chronoAdvice")?;
        let chrono_advice = ChronoAdvice {
            best_time: required(advice.best_time, "chronoAdvice.bestTime")?,
            reasoning: required(advice.reasoning, "chronoAdvice.reasoning")?,
            current_bioavailability_score: percentage(
                advice.current_bioavailability_score,
                "chronoAdvice.currentBioavailabilityScore",
            )?,
        };

        let synergy = required(self.synergy, "synergy")?
            .into_iter()
            .enumerate()
            .map(|(i, s)| -> Result<InteractionObservation, String> {
                Ok(InteractionObservation {
                    nutrient_a: required(s.nutrient_a, &format!("synergy[{}].nutrientA", i))?,
                    nutrient_b: required(s.nutrient_b, &format!("synergy[{}].nutrientB", i))?,
                    interaction: required(s.interaction, &format!("synergy[{}].interaction", i))?,
                    description: required(s.description, &format!("synergy[{}].description", i))?,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;

        Ok(FoodAnalysis {
            food_name,
            estimated_calories,
            nutrients,
            benefits,
            chrono_advice,
            synergy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE_PAYLOAD: &str = r#"{
        "foodName": "Spinach and orange salad",
        "estimatedCalories": 320,
        "nutrients": [
            { "name": "Vitamin C", "amount": "60mg", "dailyValuePercentage": 67 },
            { "name": "Iron", "amount": "4.5 mg", "dailyValuePercentage": 25 },
            { "name": "Calcium", "amount": "0.2g", "dailyValuePercentage": 15 },
            { "name": "Vitamin A", "amount": "900mcg", "dailyValuePercentage": 100 },
            { "name": "Protein", "amount": "8g", "dailyValuePercentage": 16 },
            { "name": "Fat", "amount": "14 g", "dailyValuePercentage": 18 }
        ],
        "benefits": ["Supports immunity", "Iron for oxygen transport"],
        "chronoAdvice": {
            "bestTime": "Breakfast (7AM - 9AM)",
            "reasoning": "Morning iron absorption peaks when hepcidin is low",
            "currentBioavailabilityScore": 85,
            "confidence": "high"
        },
        "synergy": [
            { "nutrientA": "Iron", "nutrientB": "Vitamin C", "interaction": "Synergy", "description": "Vitamin C enhances Iron absorption" },
            { "nutrientA": "Iron", "nutrientB": "Calcium", "interaction": "antagonism", "description": "Calcium competes with iron" }
        ],
        "model": "vision-v2"
    }"#;

    #[test]
    fn test_parse_valid_payload() {
        let analysis = FoodAnalysis::from_provider_json(SAMPLE_PAYLOAD).unwrap();

        assert_eq!(analysis.food_name, "Spinach and orange salad");
        assert_eq!(analysis.estimated_calories, 320);
        assert_eq!(analysis.nutrients.len(), 6);
        assert_eq!(analysis.chrono_advice.current_bioavailability_score, 85);
        assert_eq!(analysis.synergy[1].interaction, "antagonism");
    }

    #[test]
    fn test_fenced_payload() {
        let fenced = format!("```json\n{}\n```", SAMPLE_PAYLOAD);
        assert!(FoodAnalysis::from_provider_json(&fenced).is_ok());
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```JSON\n{}\n```"), "{}");
        assert_eq!(
            strip_code_fences("Here is the analysis:\n```json\n{\"a\":1}\n```\nEnjoy!"),
            "{\"a\":1}"
        );
        assert_eq!(strip_code_fences("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_overflowing_amounts_are_unavailable() {
        let mut value: serde_json::Value = serde_json::from_str(SAMPLE_PAYLOAD).unwrap();
        value["nutrients"] = serde_json::json!([
            { "name": "Iron", "amount": "1.7e308mg", "dailyValuePercentage": 10 },
            { "name": "Iron", "amount": "1.7e308mg", "dailyValuePercentage": 10 }
        ]);
        let analysis = FoodAnalysis::from_provider_json(&value.to_string()).unwrap();

        let err = analysis.nutrient_profile().unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_non_finite_canonical_amount_is_dropped() {
        let mut value: serde_json::Value = serde_json::from_str(SAMPLE_PAYLOAD).unwrap();
        value["nutrients"] = serde_json::json!([
            { "name": "Calcium", "amount": "1e308 g", "dailyValuePercentage": 10 },
            { "name": "Iron", "amount": "3mg", "dailyValuePercentage": 17 }
        ]);
        let analysis = FoodAnalysis::from_provider_json(&value.to_string()).unwrap();
        let profile = analysis.nutrient_profile().unwrap();

        assert_eq!(profile.quantity(Nutrient::Calcium), 0.0);
        assert_eq!(profile.quantity(Nutrient::Iron), 3.0);
    }

    #[test]
    fn test_missing_required_field_is_unavailable() {
        let mut value: serde_json::Value = serde_json::from_str(SAMPLE_PAYLOAD).unwrap();
        value.as_object_mut().unwrap().remove("chronoAdvice");

        let err = FoodAnalysis::from_provider_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, NutriError::AnalysisUnavailable(ref m) if m.contains("chronoAdvice")));
    }

    #[test]
    fn test_missing_nested_field_is_unavailable() {
        let mut value: serde_json::Value = serde_json::from_str(SAMPLE_PAYLOAD).unwrap();
        value["synergy"][0]
            .as_object_mut()
            .unwrap()
            .remove("nutrientB");

        let err = FoodAnalysis::from_provider_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, NutriError::AnalysisUnavailable(ref m) if m.contains("synergy[0].nutrientB")));
    }

    #[test]
    fn test_out_of_range_values_are_unavailable() {
        let mut value: serde_json::Value = serde_json::from_str(SAMPLE_PAYLOAD).unwrap();
        value["estimatedCalories"] = serde_json::json!(-10);
        assert!(FoodAnalysis::from_provider_json(&value.to_string()).is_err());

        let mut value: serde_json::Value = serde_json::from_str(SAMPLE_PAYLOAD).unwrap();
        value["nutrients"][0]["dailyValuePercentage"] = serde_json::json!(140);
        assert!(FoodAnalysis::from_provider_json(&value.to_string()).is_err());
    }

    #[test]
    fn test_garbage_is_unavailable() {
        for raw in ["", "not json", "[]", "{\"foodName\": 12}"] {
            let err = FoodAnalysis::from_provider_json(raw).unwrap_err();
            assert!(err.is_recoverable(), "{}", raw);
        }
    }

    #[test]
    fn test_nutrient_profile_conversion() {
        let analysis = FoodAnalysis::from_provider_json(SAMPLE_PAYLOAD).unwrap();
        let profile = analysis.nutrient_profile().unwrap();

        assert_eq!(profile.quantity(Nutrient::VitaminC), 60.0);
        assert_eq!(profile.quantity(Nutrient::Iron), 4.5);
        assert!((profile.quantity(Nutrient::Calcium) - 200.0).abs() < 1e-9);
        assert_eq!(profile.quantity(Nutrient::Zinc), 0.0);
    }

    #[test]
    fn test_macros() {
        let analysis = FoodAnalysis::from_provider_json(SAMPLE_PAYLOAD).unwrap();
        assert_eq!(
            analysis.macros(),
            Macros {
                protein_g: 8.0,
                carbs_g: 0.0,
                fat_g: 14.0,
            }
        );
    }
}
