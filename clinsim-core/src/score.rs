//! End-of-case scoring.
//!
//! Reduces a finished play-through into five 0–100 components and a weighted
//! composite. Missing answer-key data and empty denominators fall back to
//! neutral values instead of penalising the learner.
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::case::{CaseDefinition, DdxSnapshot};
use crate::numbers::{i32_to_f64, percent_of, round_to_score, u32_to_f64};
use crate::state::{CaseState, ChoiceRecord, clamp_rapport};

/// Score used when a component has nothing to measure.
pub const NEUTRAL_COMPONENT: f64 = 50.0;

/// Flat experience award before choice modifiers.
pub const BASE_EXPERIENCE: u32 = 100;

/// Composite weights in whole percent; they sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub resource_efficiency: u32,
    pub diagnostic_accuracy: u32,
    pub decision_optimality: u32,
    pub key_finding_coverage: u32,
    pub relationship: u32,
}

impl ScoreWeights {
    pub const STANDARD: Self = Self {
        resource_efficiency: 20,
        diagnostic_accuracy: 20,
        decision_optimality: 25,
        key_finding_coverage: 20,
        relationship: 15,
    };

    #[must_use]
    pub const fn total(&self) -> u32 {
        self.resource_efficiency
            + self.diagnostic_accuracy
            + self.decision_optimality
            + self.key_finding_coverage
            + self.relationship
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Raw counts behind each component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScoreBreakdown {
    pub actual_cp_spend: u32,
    pub optimal_cp_spend: u32,
    pub checkpoints_reached: usize,
    pub checkpoints_total: usize,
    /// Choices whose scene and option still resolve.
    pub choices_scored: usize,
    pub optimal_choices: usize,
    /// Choices dropped because their scene or option no longer resolves.
    pub choices_excluded: usize,
    pub key_findings_found: usize,
    pub key_findings_total: usize,
    pub optimal_path_visited: usize,
    pub optimal_path_total: usize,
}

/// Letter band for a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    #[must_use]
    pub const fn from_composite(composite: u8) -> Self {
        match composite {
            90.. => Self::A,
            80..=89 => Self::B,
            70..=79 => Self::C,
            60..=69 => Self::D,
            _ => Self::F,
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        f.write_str(label)
    }
}

/// Immutable result of a finished play-through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub resource_efficiency: u8,
    pub diagnostic_accuracy: u8,
    pub decision_optimality: u8,
    pub key_finding_coverage: u8,
    pub relationship: u8,
    pub composite: u8,
    pub experience: u32,
    pub breakdown: ScoreBreakdown,
}

impl Score {
    #[must_use]
    pub const fn grade(&self) -> Grade {
        Grade::from_composite(self.composite)
    }
}

/// `optimal / max(actual, optimal) * 100`; under-spending caps at 100.
#[must_use]
pub fn resource_efficiency(actual: u32, optimal: u32) -> f64 {
    if optimal == 0 {
        return 100.0;
    }
    u32_to_f64(optimal) / u32_to_f64(actual.max(optimal)) * 100.0
}

/// Intersection over union of two diagnosis lists treated as sets; 0 when both are empty.
#[must_use]
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    let left: HashSet<&str> = a.iter().map(String::as_str).collect();
    let right: HashSet<&str> = b.iter().map(String::as_str).collect();
    let union = left.union(&right).count();
    let intersection = left.intersection(&right).count();
    percent_of(intersection, union).map_or(0.0, |pct| pct / 100.0)
}

/// Mean Jaccard similarity over the checkpoints the learner reached, scaled to
/// 0–100, with the number reached. When one checkpoint was snapshotted more
/// than once, the first snapshot is the one compared.
fn diagnostic_accuracy(player: &[DdxSnapshot], expert: &[DdxSnapshot]) -> (Option<f64>, usize) {
    let similarities: Vec<f64> = expert
        .iter()
        .filter_map(|checkpoint| {
            player
                .iter()
                .find(|snapshot| snapshot.scene_id == checkpoint.scene_id)
                .map(|snapshot| jaccard(&checkpoint.diagnoses, &snapshot.diagnoses))
        })
        .collect();
    let reached = similarities.len();
    let total: f64 = similarities.iter().sum();
    let mean = percent_of(1, reached).map(|scale| total * scale);
    (mean, reached)
}

struct ChoiceTally {
    scored: usize,
    optimal: usize,
    excluded: usize,
    xp_delta: i64,
}

fn tally_choices(history: &[ChoiceRecord], case: &CaseDefinition) -> ChoiceTally {
    let mut tally = ChoiceTally {
        scored: 0,
        optimal: 0,
        excluded: 0,
        xp_delta: 0,
    };
    for record in history {
        let Some(option) = case
            .scene(&record.scene_id)
            .and_then(|scene| scene.option(&record.option_id))
        else {
            debug!(
                "scoring skips choice {} at {}: no longer resolves",
                record.option_id, record.scene_id
            );
            tally.excluded += 1;
            continue;
        };
        tally.scored += 1;
        if option.is_optimal {
            tally.optimal += 1;
        }
        tally.xp_delta += i64::from(option.xp_modifier);
    }
    tally
}

fn experience(delta: i64) -> u32 {
    let total = i64::from(BASE_EXPERIENCE).saturating_add(delta).max(0);
    u32::try_from(total).unwrap_or(u32::MAX)
}

/// Score a play-through against the case's answer key with the standard weights.
#[must_use]
pub fn compute_score(state: &CaseState, case: &CaseDefinition) -> Score {
    compute_score_with_weights(state, case, ScoreWeights::STANDARD)
}

/// Score a play-through using explicit composite weights.
#[must_use]
pub fn compute_score_with_weights(
    state: &CaseState,
    case: &CaseDefinition,
    weights: ScoreWeights,
) -> Score {
    let key = &case.answer_key;

    let efficiency = resource_efficiency(state.cp_spent, key.optimal_cp_spend);

    let (accuracy, checkpoints_reached) = diagnostic_accuracy(&state.ddx_history, &key.expert_ddx);
    let accuracy = accuracy.unwrap_or(NEUTRAL_COMPONENT);

    let choices = tally_choices(&state.choice_history, case);
    let optimality = percent_of(choices.optimal, choices.scored).unwrap_or(NEUTRAL_COMPONENT);

    let key_findings = case.key_findings();
    let found = key_findings
        .iter()
        .filter(|clue_id| state.has_clue(clue_id))
        .count();
    let coverage = percent_of(found, key_findings.len()).unwrap_or(NEUTRAL_COMPONENT);

    let rapport = clamp_rapport(state.rapport);
    let relationship = i32_to_f64(rapport);

    // Whole-percent weights, divided once before the final round.
    let composite = (efficiency * u32_to_f64(weights.resource_efficiency)
        + accuracy * u32_to_f64(weights.diagnostic_accuracy)
        + optimality * u32_to_f64(weights.decision_optimality)
        + coverage * u32_to_f64(weights.key_finding_coverage)
        + relationship * u32_to_f64(weights.relationship))
        / 100.0;

    let visited: BTreeSet<&str> = state.visited_scenes.iter().map(String::as_str).collect();
    let path: BTreeSet<&str> = key.optimal_path.iter().map(String::as_str).collect();

    Score {
        resource_efficiency: round_to_score(efficiency),
        diagnostic_accuracy: round_to_score(accuracy),
        decision_optimality: round_to_score(optimality),
        key_finding_coverage: round_to_score(coverage),
        relationship: u8::try_from(rapport).unwrap_or(0),
        composite: round_to_score(composite),
        experience: experience(choices.xp_delta),
        breakdown: ScoreBreakdown {
            actual_cp_spend: state.cp_spent,
            optimal_cp_spend: key.optimal_cp_spend,
            checkpoints_reached,
            checkpoints_total: key.expert_ddx.len(),
            choices_scored: choices.scored,
            optimal_choices: choices.optimal,
            choices_excluded: choices.excluded,
            key_findings_found: found,
            key_findings_total: key_findings.len(),
            optimal_path_visited: path.intersection(&visited).count(),
            optimal_path_total: path.len(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{at, case, t0};
    use crate::state::ChoiceSource;
    use crate::transitions::{
        advance_to_scene, complete_ddx_check, create_initial_state, examine_zone, make_choice,
        update_ddx,
    };

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn efficiency_caps_at_optimal_and_degrades_on_overspend() {
        assert!((resource_efficiency(3, 6) - 100.0).abs() < f64::EPSILON);
        assert!((resource_efficiency(6, 6) - 100.0).abs() < f64::EPSILON);
        assert!((resource_efficiency(12, 6) - 50.0).abs() < f64::EPSILON);
        assert!((resource_efficiency(40, 0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn jaccard_bounds_and_order_independence() {
        let a = labels(&["MI", "PE", "Pericarditis"]);
        let b = labels(&["Pericarditis", "PE", "MI"]);
        assert!((jaccard(&a, &b) - 1.0).abs() < f64::EPSILON);
        assert!(jaccard(&a, &labels(&["Reflux"])).abs() < f64::EPSILON);
        assert!(jaccard(&[], &[]).abs() < f64::EPSILON);
        assert!((jaccard(&a, &labels(&["MI"])) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn grade_bands() {
        assert_eq!(Grade::from_composite(100), Grade::A);
        assert_eq!(Grade::from_composite(90), Grade::A);
        assert_eq!(Grade::from_composite(85), Grade::B);
        assert_eq!(Grade::from_composite(70), Grade::C);
        assert_eq!(Grade::from_composite(61), Grade::D);
        assert_eq!(Grade::from_composite(12), Grade::F);
        assert_eq!(Grade::A.to_string(), "A");
    }

    #[test]
    fn empty_play_through_uses_neutral_fallbacks() {
        let case = case();
        let state = create_initial_state(&case, t0());
        let score = compute_score(&state, &case);
        assert_eq!(score.resource_efficiency, 100);
        assert_eq!(score.diagnostic_accuracy, 50);
        assert_eq!(score.decision_optimality, 50);
        // c-vitals of {c-vitals, c-rub}
        assert_eq!(score.key_finding_coverage, 50);
        assert_eq!(score.relationship, 50);
        // 20 + 10 + 12.5 + 10 + 7.5
        assert_eq!(score.composite, 60);
        assert_eq!(score.experience, BASE_EXPERIENCE);
        assert_eq!(score.breakdown.checkpoints_reached, 0);
        assert_eq!(score.breakdown.optimal_path_visited, 1);
    }

    #[test]
    fn expert_play_through_scores_full_marks_on_process() {
        let case = case();
        let history = case.scene("history").unwrap();
        let labs = case.scene("labs").unwrap();
        let chest = case.scene("exam").unwrap().interaction.zone("chest").unwrap();

        let state = create_initial_state(&case, t0());
        let state = advance_to_scene(&state, "history", &case, at(1));
        let state = make_choice(&state, history.option("listen").unwrap(), &case, at(2));
        let state = examine_zone(&state, "exam", chest);
        let state = advance_to_scene(&state, "ddx1", &case, at(3));
        let state = update_ddx(&state, ["Pericarditis", "Myocardial infarction", "Pulmonary embolism"]);
        let state = complete_ddx_check(&state, "labs", &case, at(4));
        let state = make_choice(&state, labs.option("troponin").unwrap(), &case, at(5));
        let state = update_ddx(&state, ["Myocardial infarction", "Pericarditis"]);
        let state = complete_ddx_check(&state, "reveal", &case, at(6));

        let score = compute_score(&state, &case);
        assert_eq!(state.cp_spent, 6);
        assert_eq!(score.resource_efficiency, 100);
        assert_eq!(score.diagnostic_accuracy, 100);
        assert_eq!(score.decision_optimality, 100);
        assert_eq!(score.key_finding_coverage, 100);
        // 50 + 10 - 2
        assert_eq!(score.relationship, 58);
        // 85 + 0.15 * 58 = 93.7
        assert_eq!(score.composite, 94);
        assert_eq!(score.grade(), Grade::A);
        assert_eq!(score.experience, 115);
        assert_eq!(score.breakdown.optimal_path_visited, 7);
    }

    #[test]
    fn composite_rounds_once_at_the_end() {
        let case = case();
        let mut state = create_initial_state(&case, t0());
        state.rapport = 8;
        for option_id in ["listen", "rush", "rush"] {
            state.choice_history.push(ChoiceRecord {
                scene_id: "history".to_string(),
                option_id: option_id.to_string(),
                at: t0(),
                source: ChoiceSource::Manual,
            });
        }
        let score = compute_score(&state, &case);
        assert_eq!(score.decision_optimality, 33);
        // 20 + 10 + 8.33 + 10 + 1.2 = 49.53; summing rounded parts would give 49.
        assert_eq!(score.composite, 50);
    }

    #[test]
    fn composite_tie_rounds_up() {
        let mut case = case();
        case.answer_key.optimal_cp_spend = 1;
        let mut state = create_initial_state(&case, t0());
        state.cp_spent = 100;
        state.ddx_history.push(DdxSnapshot {
            scene_id: "ddx1".to_string(),
            diagnoses: labels(&["Reflux"]),
        });
        state.choice_history.push(ChoiceRecord {
            scene_id: "history".to_string(),
            option_id: "rush".to_string(),
            at: t0(),
            source: ChoiceSource::Manual,
        });
        state.collected_clues.clear();
        state.rapport = 62;

        let score = compute_score(&state, &case);
        assert_eq!(score.resource_efficiency, 1);
        assert_eq!(score.diagnostic_accuracy, 0);
        assert_eq!(score.decision_optimality, 0);
        assert_eq!(score.key_finding_coverage, 0);
        // 20 * 1 + 15 * 62 = 950, so the composite is exactly 9.5.
        assert_eq!(score.composite, 10);
    }

    #[test]
    fn standard_weights_total_one_hundred() {
        assert_eq!(ScoreWeights::STANDARD.total(), 100);
        assert_eq!(ScoreWeights::default(), ScoreWeights::STANDARD);
    }

    #[test]
    fn unresolvable_choices_are_excluded_not_penalised() {
        let case = case();
        let mut state = create_initial_state(&case, t0());
        state.choice_history.push(ChoiceRecord {
            scene_id: "history".to_string(),
            option_id: "listen".to_string(),
            at: t0(),
            source: ChoiceSource::Manual,
        });
        state.choice_history.push(ChoiceRecord {
            scene_id: "retired-scene".to_string(),
            option_id: "gone".to_string(),
            at: t0(),
            source: ChoiceSource::Manual,
        });
        let score = compute_score(&state, &case);
        assert_eq!(score.decision_optimality, 100);
        assert_eq!(score.breakdown.choices_scored, 1);
        assert_eq!(score.breakdown.choices_excluded, 1);
    }

    #[test]
    fn experience_is_floored_at_zero() {
        let case = case();
        let mut state = create_initial_state(&case, t0());
        for _ in 0..3 {
            state.choice_history.push(ChoiceRecord {
                scene_id: "labs".to_string(),
                option_id: "discharge".to_string(),
                at: t0(),
                source: ChoiceSource::TimerExpired,
            });
        }
        assert_eq!(compute_score(&state, &case).experience, 0);
    }

    #[test]
    fn unreached_checkpoints_do_not_lower_accuracy() {
        let case = case();
        let mut state = create_initial_state(&case, t0());
        state.ddx_history.push(DdxSnapshot {
            scene_id: "ddx1".to_string(),
            diagnoses: labels(&["Pericarditis", "Myocardial infarction", "Pulmonary embolism"]),
        });
        let score = compute_score(&state, &case);
        assert_eq!(score.diagnostic_accuracy, 100);
        assert_eq!(score.breakdown.checkpoints_reached, 1);
        assert_eq!(score.breakdown.checkpoints_total, 2);
    }

    #[test]
    fn empty_snapshot_differs_from_missing_snapshot() {
        let case = case();
        let mut state = create_initial_state(&case, t0());
        state.ddx_history.push(DdxSnapshot {
            scene_id: "ddx1".to_string(),
            diagnoses: Vec::new(),
        });
        // reached with nothing listed scores 0, never the neutral 50
        assert_eq!(compute_score(&state, &case).diagnostic_accuracy, 0);
    }
}
