//! Nutrient interaction classification
//!
//! Normalizes the provider's free-text interaction labels, lays out the
//! meal-centred interaction graph consumed by the presentation layer, and
//! holds the interaction catalog used by the opt-in magnitude adjustment.

use crate::error::NutriError;
use crate::types::{CircadianRule, InteractionEntry, InteractionType, Nutrient, NutrientProfile};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Pairwise interaction as reported by the analysis provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionObservation {
    pub nutrient_a: String,
    pub nutrient_b: String,
    /// Free-text label, normally "Synergy" or "Antagonism"
    pub interaction: String,
    pub description: String,
}

/// Interaction with a normalized type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedInteraction {
    pub nutrient_a: String,
    pub nutrient_b: String,
    pub interaction_type: InteractionType,
    pub description: String,
}

/// Normalize every observation's label to an [`InteractionType`]
pub fn classify(interactions: &[InteractionObservation]) -> Vec<ClassifiedInteraction> {
    interactions
        .iter()
        .map(|obs| ClassifiedInteraction {
            nutrient_a: obs.nutrient_a.clone(),
            nutrient_b: obs.nutrient_b.clone(),
            interaction_type: InteractionType::from_label(&obs.interaction),
            description: obs.description.clone(),
        })
        .collect()
}

/// Node of the interaction graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: usize,
    pub label: String,
}

/// Edge from the meal node to a nutrient node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: usize,
    pub to: usize,
    pub interaction_type: InteractionType,
    pub description: String,
}

/// Star-shaped graph: the meal at the centre, one satellite per nutrient.
///
/// Node 0 is always the centre. Satellites appear in first-mention order and
/// are deduplicated case-insensitively. Each interaction yields one edge per
/// involved nutrient; duplicate `(nutrient, type)` edges are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionGraph {
    pub center: GraphNode,
    pub satellites: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl InteractionGraph {
    pub const CENTER_ID: usize = 0;

    pub fn from_interactions(meal_label: &str, interactions: &[ClassifiedInteraction]) -> Self {
        let mut satellites: Vec<GraphNode> = Vec::new();
        let mut edges: Vec<GraphEdge> = Vec::new();

        for interaction in interactions {
            for name in [&interaction.nutrient_a, &interaction.nutrient_b] {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }

                let id = match satellites
                    .iter()
                    .find(|n| n.label.eq_ignore_ascii_case(name))
                {
                    Some(node) => node.id,
                    None => {
                        let id = satellites.len() + 1;
                        satellites.push(GraphNode {
                            id,
                            label: name.to_string(),
                        });
                        id
                    }
                };

                let duplicate = edges
                    .iter()
                    .any(|e| e.to == id && e.interaction_type == interaction.interaction_type);
                if !duplicate {
                    edges.push(GraphEdge {
                        from: Self::CENTER_ID,
                        to: id,
                        interaction_type: interaction.interaction_type,
                        description: interaction.description.clone(),
                    });
                }
            }
        }

        Self {
            center: GraphNode {
                id: Self::CENTER_ID,
                label: meal_label.to_string(),
            },
            satellites,
            edges,
        }
    }

    pub fn node_count(&self) -> usize {
        self.satellites.len() + 1
    }
}

/// Read-only catalog of known nutrient interactions
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InteractionCatalog {
    entries: Vec<InteractionEntry>,
}

impl InteractionCatalog {
    pub fn new(entries: Vec<InteractionEntry>) -> Result<Self, NutriError> {
        for entry in &entries {
            entry.validate()?;
        }
        Ok(Self { entries })
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Parse a JSON array of catalog entries.
    ///
    /// Entries naming an untracked nutrient are skipped.
    pub fn from_json(json: &str) -> Result<Self, NutriError> {
        let raw: Vec<RawEntry> = serde_json::from_str(json)?;
        let mut entries = Vec::with_capacity(raw.len());

        for r in raw {
            let (Some(nutrient_a), Some(nutrient_b)) = (
                Nutrient::from_name(&r.nutrient_a),
                Nutrient::from_name(&r.nutrient_b),
            ) else {
                debug!(a = %r.nutrient_a, b = %r.nutrient_b, "skipping interaction with untracked nutrient");
                continue;
            };
            entries.push(InteractionEntry {
                nutrient_a,
                nutrient_b,
                interaction_type: InteractionType::from_label(&r.interaction_type),
                magnitude: r.magnitude,
                description: r.description,
            });
        }

        Self::new(entries)
    }

    pub fn entries(&self) -> &[InteractionEntry] {
        &self.entries
    }

    /// Entries involving `nutrient`
    pub fn for_nutrient(&self, nutrient: Nutrient) -> impl Iterator<Item = &InteractionEntry> {
        self.entries.iter().filter(move |e| e.involves(nutrient))
    }

    /// Product of the magnitudes of every entry whose two nutrients are both
    /// relevant: present in `profile` and targeted by at least one rule.
    /// Returns 1.0 when nothing applies.
    pub fn combined_magnitude(&self, profile: &NutrientProfile, rules: &[CircadianRule]) -> f64 {
        let relevant = |n: Nutrient| profile.is_present(n) && rules.iter().any(|r| r.nutrient == n);

        self.entries
            .iter()
            .filter(|e| relevant(e.nutrient_a) && relevant(e.nutrient_b))
            .map(|e| e.magnitude)
            .product()
    }
}

impl Default for InteractionCatalog {
    /// Built-in catalog of well-documented pairings
    fn default() -> Self {
        let entry = |a, b, interaction_type, magnitude, description: &str| InteractionEntry {
            nutrient_a: a,
            nutrient_b: b,
            interaction_type,
            magnitude,
            description: description.to_string(),
        };

        Self {
            entries: vec![
                entry(
                    Nutrient::VitaminC,
                    Nutrient::Iron,
                    InteractionType::Synergy,
                    1.5,
                    "Vitamin C reduces non-heme iron to its absorbable ferrous form",
                ),
                entry(
                    Nutrient::Calcium,
                    Nutrient::Iron,
                    InteractionType::Antagonism,
                    0.6,
                    "Calcium competes with iron for intestinal uptake",
                ),
                entry(
                    Nutrient::VitaminD,
                    Nutrient::Calcium,
                    InteractionType::Synergy,
                    1.3,
                    "Vitamin D upregulates calcium-binding transport proteins",
                ),
                entry(
                    Nutrient::Zinc,
                    Nutrient::Iron,
                    InteractionType::Antagonism,
                    0.8,
                    "High-dose zinc and iron share the DMT1 transporter",
                ),
                entry(
                    Nutrient::Magnesium,
                    Nutrient::Calcium,
                    InteractionType::Neutral,
                    1.0,
                    "Competition only matters at supplement doses",
                ),
            ],
        }
    }
}

impl<'de> Deserialize<'de> for InteractionCatalog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let entries = Vec::<InteractionEntry>::deserialize(deserializer)?;
        InteractionCatalog::new(entries).map_err(serde::de::Error::custom)
    }
}

/// Catalog entry as it appears in catalog files
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    nutrient_a: String,
    nutrient_b: String,
    #[serde(rename = "type")]
    interaction_type: String,
    magnitude: f64,
    #[serde(default)]
    description: String,
}
