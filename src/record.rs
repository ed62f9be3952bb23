//! Food record data shape
//!
//! The record handed to the persistence layer after an analysis. Storage
//! itself lives outside this crate.

use crate::analysis::FoodAnalysis;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodRecord {
    pub id: Uuid,
    pub name: String,
    pub calories: u32,
    /// grams
    pub protein: f64,
    /// grams
    pub carbs: f64,
    /// grams
    pub fat: f64,
    /// Serving weight, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_grams: Option<f64>,
    /// Consumption time (epoch millis)
    pub timestamp: i64,
}

impl FoodRecord {
    pub fn from_analysis(analysis: &FoodAnalysis, consumed_at_epoch_millis: i64) -> Self {
        let macros = analysis.macros();
        Self {
            id: Uuid::new_v4(),
            name: analysis.food_name.clone(),
            calories: analysis.estimated_calories,
            protein: macros.protein_g,
            carbs: macros.carbs_g,
            fat: macros.fat_g,
            weight_grams: None,
            timestamp: consumed_at_epoch_millis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "foodName": "Grilled salmon",
        "estimatedCalories": 520,
        "nutrients": [
            { "name": "Protein", "amount": "34g", "dailyValuePercentage": 68 },
            { "name": "Fat", "amount": "22 g", "dailyValuePercentage": 28 },
            { "name": "Vitamin D", "amount": "600 IU", "dailyValuePercentage": 75 }
        ],
        "benefits": [],
        "chronoAdvice": { "bestTime": "Lunch", "reasoning": "Fat aids vitamin D", "currentBioavailabilityScore": 90 },
        "synergy": []
    }"#;

    #[test]
    fn test_record_from_analysis() {
        let analysis = FoodAnalysis::from_provider_json(PAYLOAD).unwrap();
        let record = FoodRecord::from_analysis(&analysis, 1_705_305_600_000);

        assert_eq!(record.name, "Grilled salmon");
        assert_eq!(record.calories, 520);
        assert_eq!(record.protein, 34.0);
        assert_eq!(record.fat, 22.0);
        assert_eq!(record.carbs, 0.0);
        assert_eq!(record.timestamp, 1_705_305_600_000);
    }

    #[test]
    fn test_record_ids_are_unique() {
        let analysis = FoodAnalysis::from_provider_json(PAYLOAD).unwrap();
        let a = FoodRecord::from_analysis(&analysis, 0);
        let b = FoodRecord::from_analysis(&analysis, 0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let analysis = FoodAnalysis::from_provider_json(PAYLOAD).unwrap();
        let json = serde_json::to_value(FoodRecord::from_analysis(&analysis, 42)).unwrap();
        assert_eq!(json["timestamp"], 42);
        assert!(json.get("weightGrams").is_none());
    }
}
