//! Bioavailability scoring engine
//!
//! Pure functions combining a rule set, a nutrient profile and a consumption
//! time into a bioavailability score. The engine performs no I/O and keeps no
//! state between calls.
//!
//! Scoring:
//! 1. Resolve the timestamp to an hour of day `h` in the caller's time zone
//! 2. Start from a multiplier of 1.0
//! 3. For each rule whose nutrient is present in the profile, multiply by the
//!    rule's efficiency factor when `h` is inside its window, otherwise by
//!    [`OUT_OF_WINDOW_PENALTY`]
//! 4. Score = 100 × multiplier

use crate::error::NutriError;
use crate::interactions::InteractionCatalog;
use crate::types::{CircadianRule, NutrientProfile, RuleOutcome, Score, ScoreBreakdown};
use chrono::{Local, TimeZone, Timelike};
use tracing::trace;

/// Multiplier applied by a relevant rule consumed outside its window
pub const OUT_OF_WINDOW_PENALTY: f64 = 0.9;

/// Score a profile consumed at `consumed_at_epoch_millis`, local time.
///
/// Shorthand for [`BioavailabilityEngine::score`].
pub fn score(
    profile: &NutrientProfile,
    consumed_at_epoch_millis: i64,
    rules: &[CircadianRule],
) -> Result<Score, NutriError> {
    BioavailabilityEngine::score(profile, consumed_at_epoch_millis, rules)
}

/// Stateless scoring engine
pub struct BioavailabilityEngine;

impl BioavailabilityEngine {
    /// Score using the system's local time zone
    pub fn score(
        profile: &NutrientProfile,
        consumed_at_epoch_millis: i64,
        rules: &[CircadianRule],
    ) -> Result<Score, NutriError> {
        Self::score_in(profile, consumed_at_epoch_millis, rules, &Local)
    }

    /// Score with the hour of day resolved in `tz`
    pub fn score_in<Tz: TimeZone>(
        profile: &NutrientProfile,
        consumed_at_epoch_millis: i64,
        rules: &[CircadianRule],
        tz: &Tz,
    ) -> Result<Score, NutriError> {
        let hour = hour_of_day(consumed_at_epoch_millis, tz)?;
        Self::score_at_hour(profile, hour, rules)
    }

    /// Score at an already-resolved hour of day (0-23)
    pub fn score_at_hour(
        profile: &NutrientProfile,
        hour: u32,
        rules: &[CircadianRule],
    ) -> Result<Score, NutriError> {
        Self::explain_at_hour(profile, hour, rules).map(|b| b.score)
    }

    /// Like [`score`](Self::score), with the per-rule breakdown
    pub fn explain(
        profile: &NutrientProfile,
        consumed_at_epoch_millis: i64,
        rules: &[CircadianRule],
    ) -> Result<ScoreBreakdown, NutriError> {
        Self::explain_in(profile, consumed_at_epoch_millis, rules, &Local)
    }

    /// Breakdown with the hour of day resolved in `tz`
    pub fn explain_in<Tz: TimeZone>(
        profile: &NutrientProfile,
        consumed_at_epoch_millis: i64,
        rules: &[CircadianRule],
        tz: &Tz,
    ) -> Result<ScoreBreakdown, NutriError> {
        let hour = hour_of_day(consumed_at_epoch_millis, tz)?;
        Self::explain_at_hour(profile, hour, rules)
    }

    /// Evaluate every rule at `hour`; errors on an hour outside 0-23 or a malformed rule
    pub fn explain_at_hour(
        profile: &NutrientProfile,
        hour: u32,
        rules: &[CircadianRule],
    ) -> Result<ScoreBreakdown, NutriError> {
        check_hour(hour)?;

        let mut multiplier = 1.0;
        let mut outcomes = Vec::new();
        let mut skipped_rules = 0;

        for rule in rules {
            rule.validate()?;

            if !profile.is_present(rule.nutrient) {
                skipped_rules += 1;
                continue;
            }

            let in_window = rule.contains_hour(hour);
            let factor = if in_window {
                rule.efficiency_factor
            } else {
                OUT_OF_WINDOW_PENALTY
            };
            multiplier *= factor;

            trace!(nutrient = %rule.nutrient, hour, in_window, factor, "rule applied");

            outcomes.push(RuleOutcome {
                nutrient: rule.nutrient,
                in_window,
                factor,
                reason: rule.reason.clone(),
            });
        }

        Ok(ScoreBreakdown {
            hour,
            outcomes,
            skipped_rules,
            score: Score::from_multiplier(multiplier),
        })
    }

    /// Rule score further adjusted by catalog interaction magnitudes.
    ///
    /// Opt-in: [`score`](Self::score) never applies magnitudes. An entry
    /// applies when both of its nutrients are relevant, see
    /// [`InteractionCatalog::combined_magnitude`].
    pub fn score_with_interactions(
        profile: &NutrientProfile,
        consumed_at_epoch_millis: i64,
        rules: &[CircadianRule],
        catalog: &InteractionCatalog,
    ) -> Result<Score, NutriError> {
        Self::score_with_interactions_in(profile, consumed_at_epoch_millis, rules, catalog, &Local)
    }

    /// Interaction-adjusted score with the hour of day resolved in `tz`
    pub fn score_with_interactions_in<Tz: TimeZone>(
        profile: &NutrientProfile,
        consumed_at_epoch_millis: i64,
        rules: &[CircadianRule],
        catalog: &InteractionCatalog,
        tz: &Tz,
    ) -> Result<Score, NutriError> {
        let hour = hour_of_day(consumed_at_epoch_millis, tz)?;
        Self::score_with_interactions_at_hour(profile, hour, rules, catalog)
    }

    /// Interaction-adjusted score at an already-resolved hour of day
    pub fn score_with_interactions_at_hour(
        profile: &NutrientProfile,
        hour: u32,
        rules: &[CircadianRule],
        catalog: &InteractionCatalog,
    ) -> Result<Score, NutriError> {
        let breakdown = Self::explain_at_hour(profile, hour, rules)?;
        let magnitude = catalog.combined_magnitude(profile, rules);
        Ok(Score::from_multiplier(
            breakdown.score.value() / Score::BASELINE.value() * magnitude,
        ))
    }
}

/// Resolve an epoch-millisecond timestamp to an hour of day in `tz`
pub fn hour_of_day<Tz: TimeZone>(epoch_millis: i64, tz: &Tz) -> Result<u32, NutriError> {
    tz.timestamp_millis_opt(epoch_millis)
        .single()
        .map(|dt| dt.hour())
        .ok_or_else(|| {
            NutriError::invalid(format!(
                "timestamp {} ms is outside the representable range",
                epoch_millis
            ))
        })
}

fn check_hour(hour: u32) -> Result<(), NutriError> {
    if hour > 23 {
        return Err(NutriError::invalid(format!(
            "hour of day must be within 0-23, got {}",
            hour
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InteractionEntry, InteractionType, Nutrient};
    use chrono::{FixedOffset, NaiveDate, Utc};
    use proptest::prelude::*;

    fn rule(nutrient: Nutrient, start: u32, end: u32, factor: f64) -> CircadianRule {
        CircadianRule::new(nutrient, start, end, factor, "test").unwrap()
    }

    fn scenario_profile() -> NutrientProfile {
        NutrientProfile::from_pairs([(Nutrient::VitaminC, 50.0), (Nutrient::Iron, 10.0)]).unwrap()
    }

    fn scenario_rules() -> Vec<CircadianRule> {
        vec![
            rule(Nutrient::VitaminC, 6, 10, 1.2),
            rule(Nutrient::Iron, 18, 20, 1.3),
        ]
    }

    fn utc_millis(hour: u32) -> i64 {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(hour, 30, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    #[test]
    fn test_morning_scenario() {
        let score = BioavailabilityEngine::score_at_hour(&scenario_profile(), 8, &scenario_rules())
            .unwrap();
        assert!((score.value() - 108.0).abs() < 1e-9);
    }

    #[test]
    fn test_scenario_from_timestamp() {
        let score = BioavailabilityEngine::score_in(
            &scenario_profile(),
            utc_millis(8),
            &scenario_rules(),
            &Utc,
        )
        .unwrap();
        assert!((score.value() - 108.0).abs() < 1e-9);
    }

    #[test]
    fn test_hour_resolution_uses_time_zone() {
        // 08:30 UTC is 18:30 at UTC+10
        let plus_ten = FixedOffset::east_opt(10 * 3600).unwrap();
        assert_eq!(hour_of_day(utc_millis(8), &plus_ten).unwrap(), 18);

        let score = BioavailabilityEngine::score_in(
            &scenario_profile(),
            utc_millis(8),
            &scenario_rules(),
            &plus_ten,
        )
        .unwrap();
        // Vitamin C out of window, Iron in window
        assert!((score.value() - 100.0 * 0.9 * 1.3).abs() < 1e-9);
    }

    #[test]
    fn test_local_score_matches_local_hour() {
        let ts = utc_millis(12);
        let hour = hour_of_day(ts, &Local).unwrap();
        let expected =
            BioavailabilityEngine::score_at_hour(&scenario_profile(), hour, &scenario_rules())
                .unwrap();
        assert_eq!(score(&scenario_profile(), ts, &scenario_rules()).unwrap(), expected);
    }

    #[test]
    fn test_empty_rules_is_baseline() {
        let score = BioavailabilityEngine::score_at_hour(&scenario_profile(), 3, &[]).unwrap();
        assert_eq!(score.value(), 100.0);
    }

    #[test]
    fn test_all_zero_profile_is_baseline() {
        let breakdown = BioavailabilityEngine::explain_at_hour(
            &NutrientProfile::default(),
            8,
            &scenario_rules(),
        )
        .unwrap();
        assert_eq!(breakdown.score.value(), 100.0);
        assert_eq!(breakdown.skipped_rules, 2);
        assert!(breakdown.outcomes.is_empty());
    }

    #[test]
    fn test_single_rule_in_and_out_of_window() {
        let profile = NutrientProfile::from_pairs([(Nutrient::Calcium, 300.0)]).unwrap();
        let rules = [rule(Nutrient::Calcium, 18, 21, 1.15)];

        let inside = BioavailabilityEngine::score_at_hour(&profile, 21, &rules).unwrap();
        assert!((inside.value() - 115.0).abs() < 1e-9);

        let outside = BioavailabilityEngine::score_at_hour(&profile, 22, &rules).unwrap();
        assert!((outside.value() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_each_rule_contributes_once() {
        let profile = NutrientProfile::from_pairs([(Nutrient::Zinc, 8.0)]).unwrap();
        let rules = [
            rule(Nutrient::Zinc, 18, 22, 1.1),
            rule(Nutrient::Zinc, 6, 8, 1.5),
            rule(Nutrient::Iron, 6, 10, 1.3),
        ];

        let breakdown = BioavailabilityEngine::explain_at_hour(&profile, 7, &rules).unwrap();
        assert_eq!(breakdown.outcomes.len(), 2);
        assert_eq!(breakdown.skipped_rules, 1);
        assert!((breakdown.score.value() - 100.0 * 0.9 * 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_breakdown_reports_outcomes() {
        let breakdown =
            BioavailabilityEngine::explain_at_hour(&scenario_profile(), 8, &scenario_rules())
                .unwrap();

        assert_eq!(breakdown.hour, 8);
        assert_eq!(breakdown.outcomes[0].nutrient, Nutrient::VitaminC);
        assert!(breakdown.outcomes[0].in_window);
        assert_eq!(breakdown.outcomes[0].factor, 1.2);
        assert_eq!(breakdown.outcomes[1].nutrient, Nutrient::Iron);
        assert!(!breakdown.outcomes[1].in_window);
        assert_eq!(breakdown.outcomes[1].factor, OUT_OF_WINDOW_PENALTY);
    }

    #[test]
    fn test_invalid_hour_is_rejected() {
        let err = BioavailabilityEngine::score_at_hour(&scenario_profile(), 24, &scenario_rules())
            .unwrap_err();
        assert!(matches!(err, NutriError::InvalidInput(_)));
    }

    #[test]
    fn test_malformed_rule_is_rejected() {
        let bad = CircadianRule {
            nutrient: Nutrient::Magnesium,
            window_start: 22,
            window_end: 2,
            efficiency_factor: 1.1,
            reason: "overnight".to_string(),
        };
        let err = BioavailabilityEngine::score_at_hour(&NutrientProfile::default(), 23, &[bad])
            .unwrap_err();
        assert!(matches!(err, NutriError::InvalidInput(_)));
    }

    #[test]
    fn test_unrepresentable_timestamp_is_rejected() {
        let err = BioavailabilityEngine::score_in(&scenario_profile(), i64::MAX, &[], &Utc)
            .unwrap_err();
        assert!(matches!(err, NutriError::InvalidInput(_)));
    }

    #[test]
    fn test_score_without_catalog_ignores_magnitudes() {
        let catalog = InteractionCatalog::new(vec![InteractionEntry {
            nutrient_a: Nutrient::VitaminC,
            nutrient_b: Nutrient::Iron,
            interaction_type: InteractionType::Synergy,
            magnitude: 1.5,
            description: String::new(),
        }])
        .unwrap();

        let plain =
            BioavailabilityEngine::score_at_hour(&scenario_profile(), 8, &scenario_rules())
                .unwrap();
        let adjusted = BioavailabilityEngine::score_with_interactions_at_hour(
            &scenario_profile(),
            8,
            &scenario_rules(),
            &catalog,
        )
        .unwrap();

        assert!((plain.value() - 108.0).abs() < 1e-9);
        assert!((adjusted.value() - 162.0).abs() < 1e-9);
    }

    fn arb_profile() -> impl Strategy<Value = NutrientProfile> {
        prop::array::uniform6(prop_oneof![Just(0.0), 0.0f64..500.0])
            .prop_map(|q| NutrientProfile::new(q).unwrap())
    }

    fn arb_rule() -> impl Strategy<Value = CircadianRule> {
        (0usize..Nutrient::COUNT, 0u32..24, 0u32..24, 0.5f64..2.0).prop_map(
            |(idx, a, b, factor)| CircadianRule {
                nutrient: Nutrient::ALL[idx],
                window_start: a.min(b),
                window_end: a.max(b),
                efficiency_factor: factor,
                reason: String::new(),
            },
        )
    }

    proptest! {
        #[test]
        fn prop_zero_profile_scores_baseline(
            rules in prop::collection::vec(arb_rule(), 0..12),
            hour in 0u32..24,
        ) {
            let score = BioavailabilityEngine::score_at_hour(&NutrientProfile::default(), hour, &rules).unwrap();
            prop_assert_eq!(score.value(), 100.0);
        }

        #[test]
        fn prop_empty_rules_score_baseline(profile in arb_profile(), hour in 0u32..24) {
            let score = BioavailabilityEngine::score_at_hour(&profile, hour, &[]).unwrap();
            prop_assert_eq!(score.value(), 100.0);
        }

        #[test]
        fn prop_rule_order_does_not_matter(
            profile in arb_profile(),
            rules in prop::collection::vec(arb_rule(), 0..12),
            hour in 0u32..24,
        ) {
            let forward = BioavailabilityEngine::score_at_hour(&profile, hour, &rules).unwrap();
            let mut reversed = rules.clone();
            reversed.reverse();
            let backward = BioavailabilityEngine::score_at_hour(&profile, hour, &reversed).unwrap();
            let mut rotated = rules.clone();
            if !rotated.is_empty() {
                rotated.rotate_left(1);
            }
            let rotated = BioavailabilityEngine::score_at_hour(&profile, hour, &rotated).unwrap();

            let tolerance = forward.value().abs() * 1e-12;
            prop_assert!((forward.value() - backward.value()).abs() <= tolerance);
            prop_assert!((forward.value() - rotated.value()).abs() <= tolerance);
        }

        #[test]
        fn prop_scoring_is_deterministic(
            profile in arb_profile(),
            rules in prop::collection::vec(arb_rule(), 0..12),
            ts in 0i64..4_102_444_800_000,
        ) {
            let first = BioavailabilityEngine::score_in(&profile, ts, &rules, &Utc).unwrap();
            let second = BioavailabilityEngine::score_in(&profile, ts, &rules, &Utc).unwrap();
            prop_assert_eq!(first.value().to_bits(), second.value().to_bits());
        }
    }
}
