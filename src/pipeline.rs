//! Pipeline orchestration
//!
//! This module provides the request-level API for NutriScan. It orchestrates a
//! single analysis from provider output to a scored meal report:
//!
//! 1. AnalysisProvider - Produce the raw analysis payload (injected)
//! 2. FoodAnalysis - Parse and validate the payload
//! 3. NutrientProfile - Convert amounts to canonical quantities
//! 4. BioavailabilityEngine - Score against the rule set
//! 5. Interactions - Classify and lay out the interaction graph

use crate::analysis::FoodAnalysis;
use crate::engine::{hour_of_day, BioavailabilityEngine};
use crate::error::{NutriError, ProviderError};
use crate::interactions::{classify, ClassifiedInteraction, InteractionCatalog, InteractionGraph};
use crate::record::FoodRecord;
use crate::rules::RuleSet;
use crate::types::{NutrientProfile, Score, ScoreBreakdown};
use chrono::{FixedOffset, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Source of raw food analyses, e.g. a vision/language model client.
///
/// Implementations are passed to each request; the pipeline keeps no client.
pub trait AnalysisProvider {
    /// Analyze `image` and return the raw JSON payload.
    ///
    /// `hour_hint` is the consumption hour of day (0-23).
    fn analyze(&self, image: &[u8], hour_hint: u32) -> Result<String, ProviderError>;
}

/// Everything the presentation and persistence layers need for one meal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealReport {
    pub analysis: FoodAnalysis,
    pub profile: NutrientProfile,
    pub breakdown: ScoreBreakdown,
    /// Rule score adjusted by catalog magnitudes, when enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_adjusted_score: Option<Score>,
    pub interactions: Vec<ClassifiedInteraction>,
    pub graph: InteractionGraph,
    pub record: FoodRecord,
}

impl MealReport {
    pub fn score(&self) -> Score {
        self.breakdown.score
    }
}

/// Score a raw provider payload with the built-in rules, local time.
///
/// # Example
/// ```ignore
/// let report = score_payload(&provider_json, consumed_at_ms)?;
/// println!("{}", report.score());
/// ```
pub fn score_payload(raw_json: &str, consumed_at_epoch_millis: i64) -> Result<MealReport, NutriError> {
    ScoringPipeline::default().score_payload(raw_json, consumed_at_epoch_millis)
}

/// Reusable request orchestrator over shared, read-only reference data
#[derive(Debug, Clone)]
pub struct ScoringPipeline {
    rules: Arc<RuleSet>,
    catalog: Arc<InteractionCatalog>,
    use_interactions: bool,
    /// `None` resolves hours in the system's local time zone
    utc_offset: Option<FixedOffset>,
}

impl Default for ScoringPipeline {
    fn default() -> Self {
        Self::new(Arc::new(RuleSet::default()))
    }
}

impl ScoringPipeline {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self {
            rules,
            catalog: Arc::new(InteractionCatalog::default()),
            use_interactions: false,
            utc_offset: None,
        }
    }

    /// Also report a score adjusted by `catalog` magnitudes
    pub fn with_interactions(mut self, catalog: Arc<InteractionCatalog>) -> Self {
        self.catalog = catalog;
        self.use_interactions = true;
        self
    }

    /// Resolve hours at a fixed UTC offset instead of local time
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = Some(offset);
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Ask `provider` for an analysis, then score it.
    ///
    /// Provider failures map to [`NutriError::AnalysisUnavailable`].
    pub fn analyze_meal<P: AnalysisProvider + ?Sized>(
        &self,
        provider: &P,
        image: &[u8],
        consumed_at_epoch_millis: i64,
    ) -> Result<MealReport, NutriError> {
        let hour = self.hour(consumed_at_epoch_millis)?;

        let raw = provider.analyze(image, hour).map_err(|e| {
            warn!(error = %e, "analysis provider failed");
            NutriError::unavailable(e.to_string())
        })?;

        self.score_payload(&raw, consumed_at_epoch_millis)
    }

    /// Score an already-fetched provider payload
    pub fn score_payload(
        &self,
        raw_json: &str,
        consumed_at_epoch_millis: i64,
    ) -> Result<MealReport, NutriError> {
        let analysis = FoodAnalysis::from_provider_json(raw_json)?;
        self.score_analysis(analysis, consumed_at_epoch_millis)
    }

    pub fn score_analysis(
        &self,
        analysis: FoodAnalysis,
        consumed_at_epoch_millis: i64,
    ) -> Result<MealReport, NutriError> {
        let hour = self.hour(consumed_at_epoch_millis)?;
        let profile = analysis.nutrient_profile()?;

        let breakdown = BioavailabilityEngine::explain_at_hour(&profile, hour, &self.rules)?;

        let interaction_adjusted_score = if self.use_interactions {
            Some(BioavailabilityEngine::score_with_interactions_at_hour(
                &profile,
                hour,
                &self.rules,
                &self.catalog,
            )?)
        } else {
            None
        };

        let interactions = classify(&analysis.synergy);
        let graph = InteractionGraph::from_interactions(&analysis.food_name, &interactions);
        let record = FoodRecord::from_analysis(&analysis, consumed_at_epoch_millis);

        info!(
            food = %analysis.food_name,
            hour,
            score = breakdown.score.value(),
            "meal scored"
        );

        Ok(MealReport {
            analysis,
            profile,
            breakdown,
            interaction_adjusted_score,
            interactions,
            graph,
            record,
        })
    }

    fn hour(&self, epoch_millis: i64) -> Result<u32, NutriError> {
        match &self.utc_offset {
            Some(offset) => hour_of_day(epoch_millis, offset),
            None => hour_of_day(epoch_millis, &Local),
        }
    }
}
