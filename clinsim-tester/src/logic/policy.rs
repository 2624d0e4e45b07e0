use std::fmt;

use clinsim_core::{CaseDefinition, CaseState, Interaction, Scene, is_region_examined};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// One learner input, applied to a session by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LearnerAction {
    Continue,
    Choose(String),
    ExpireTimer,
    Examine(String),
    CompleteExam(String),
    CommitDdx {
        diagnoses: Vec<String>,
        next_scene_id: String,
    },
    Finalize,
}

impl LearnerAction {
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Continue => "continue".to_string(),
            Self::Choose(option_id) => format!("choose {option_id}"),
            Self::ExpireTimer => "timer expired".to_string(),
            Self::Examine(region_id) => format!("examine {region_id}"),
            Self::CompleteExam(target) => format!("finish exam -> {target}"),
            Self::CommitDdx { diagnoses, .. } => format!("ddx [{}]", diagnoses.join(", ")),
            Self::Finalize => "finalize".to_string(),
        }
    }
}

/// Policy interface for automated play-throughs.
pub trait LearnerPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Decide what to do in the current, non-terminal scene.
    fn next_action(
        &mut self,
        state: &CaseState,
        scene: &Scene,
        case: &CaseDefinition,
    ) -> LearnerAction;
}

/// Built-in learner strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LearnerStrategy {
    Optimal,
    First,
    Random,
}

impl LearnerStrategy {
    pub const ALL: [Self; 3] = [Self::Optimal, Self::First, Self::Random];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Optimal => "optimal",
            Self::First => "first",
            Self::Random => "random",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Optimal => "Follows flagged options, key exam zones and the expert differential",
            Self::First => "Always takes the first option, skips exams, commits empty differentials",
            Self::Random => "Seeded random choices, exams, timer expiries and differentials",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.key().eq_ignore_ascii_case(key))
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn LearnerPolicy> {
        match self {
            Self::Optimal => Box::new(OptimalPolicy),
            Self::First => Box::new(FirstOptionPolicy),
            Self::Random => Box::new(RandomPolicy::new(seed)),
        }
    }
}

impl fmt::Display for LearnerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

struct OptimalPolicy;
struct FirstOptionPolicy;

struct RandomPolicy {
    rng: ChaCha20Rng,
}

impl RandomPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

fn first_option(scene: &Scene) -> LearnerAction {
    scene
        .interaction
        .options()
        .first()
        .map_or(LearnerAction::ExpireTimer, |option| {
            LearnerAction::Choose(option.id.clone())
        })
}

impl LearnerPolicy for OptimalPolicy {
    fn name(&self) -> &'static str {
        "Optimal"
    }

    fn next_action(
        &mut self,
        state: &CaseState,
        scene: &Scene,
        case: &CaseDefinition,
    ) -> LearnerAction {
        match &scene.interaction {
            Interaction::Narrative { .. } => LearnerAction::Continue,
            Interaction::Choices { options } | Interaction::TimedChoice { options, .. } => options
                .iter()
                .find(|option| option.is_optimal)
                .map_or_else(
                    || first_option(scene),
                    |option| LearnerAction::Choose(option.id.clone()),
                ),
            Interaction::ExamZones {
                zones,
                next_scene_id,
            } => zones
                .iter()
                .find(|zone| {
                    zone.is_key_finding && !is_region_examined(state, &scene.id, &zone.region_id)
                })
                .map_or_else(
                    || LearnerAction::CompleteExam(next_scene_id.clone()),
                    |zone| LearnerAction::Examine(zone.region_id.clone()),
                ),
            Interaction::DdxCheck { next_scene_id } => LearnerAction::CommitDdx {
                diagnoses: case
                    .answer_key
                    .expert_ddx
                    .iter()
                    .find(|snapshot| snapshot.scene_id == scene.id)
                    .map(|snapshot| snapshot.diagnoses.clone())
                    .unwrap_or_default(),
                next_scene_id: next_scene_id.clone(),
            },
            Interaction::DiagnosisReveal => LearnerAction::Finalize,
        }
    }
}

impl LearnerPolicy for FirstOptionPolicy {
    fn name(&self) -> &'static str {
        "First"
    }

    fn next_action(
        &mut self,
        _state: &CaseState,
        scene: &Scene,
        _case: &CaseDefinition,
    ) -> LearnerAction {
        match &scene.interaction {
            Interaction::Narrative { .. } => LearnerAction::Continue,
            Interaction::Choices { .. } | Interaction::TimedChoice { .. } => first_option(scene),
            Interaction::ExamZones { next_scene_id, .. } => {
                LearnerAction::CompleteExam(next_scene_id.clone())
            }
            Interaction::DdxCheck { next_scene_id } => LearnerAction::CommitDdx {
                diagnoses: Vec::new(),
                next_scene_id: next_scene_id.clone(),
            },
            Interaction::DiagnosisReveal => LearnerAction::Finalize,
        }
    }
}

impl LearnerPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "Random"
    }

    fn next_action(
        &mut self,
        _state: &CaseState,
        scene: &Scene,
        case: &CaseDefinition,
    ) -> LearnerAction {
        match &scene.interaction {
            Interaction::Narrative { .. } => LearnerAction::Continue,
            Interaction::Choices { options } => options
                .choose(&mut self.rng)
                .map_or(LearnerAction::Finalize, |option| {
                    LearnerAction::Choose(option.id.clone())
                }),
            Interaction::TimedChoice { options, .. } => {
                if self.rng.gen_bool(0.25) {
                    return LearnerAction::ExpireTimer;
                }
                options
                    .choose(&mut self.rng)
                    .map_or(LearnerAction::ExpireTimer, |option| {
                        LearnerAction::Choose(option.id.clone())
                    })
            }
            Interaction::ExamZones {
                zones,
                next_scene_id,
            } => {
                if self.rng.gen_bool(0.5)
                    && let Some(zone) = zones.choose(&mut self.rng)
                {
                    return LearnerAction::Examine(zone.region_id.clone());
                }
                LearnerAction::CompleteExam(next_scene_id.clone())
            }
            Interaction::DdxCheck { next_scene_id } => {
                let amount = self.rng.gen_range(0..=case.candidate_diagnoses.len());
                LearnerAction::CommitDdx {
                    diagnoses: case
                        .candidate_diagnoses
                        .choose_multiple(&mut self.rng, amount)
                        .cloned()
                        .collect(),
                    next_scene_id: next_scene_id.clone(),
                }
            }
            Interaction::DiagnosisReveal => LearnerAction::Finalize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::TesterAssets;
    use chrono::{DateTime, Utc};
    use clinsim_core::{create_initial_state, examine_zone};

    fn case() -> CaseDefinition {
        TesterAssets::load_default().unwrap().case().clone()
    }

    fn state_at(case: &CaseDefinition, scene_id: &str) -> CaseState {
        let mut state = create_initial_state(case, DateTime::<Utc>::UNIX_EPOCH);
        state.current_scene_id = scene_id.to_string();
        state
    }

    #[test]
    fn strategies_parse_from_keys() {
        assert_eq!(LearnerStrategy::from_key("optimal"), Some(LearnerStrategy::Optimal));
        assert_eq!(LearnerStrategy::from_key("RANDOM"), Some(LearnerStrategy::Random));
        assert_eq!(LearnerStrategy::from_key("greedy"), None);
        assert_eq!(LearnerStrategy::First.to_string(), "first");
    }

    #[test]
    fn optimal_policy_picks_flagged_option() {
        let case = case();
        let state = state_at(&case, "triage");
        let scene = case.scene("triage").unwrap();
        let mut policy = LearnerStrategy::Optimal.create_policy(0);
        assert_eq!(
            policy.next_action(&state, scene, &case),
            LearnerAction::Choose("ask-history".to_string())
        );
    }

    #[test]
    fn optimal_policy_examines_key_zones_then_moves_on() {
        let case = case();
        let scene = case.scene("vitals").unwrap();
        let mut policy = LearnerStrategy::Optimal.create_policy(0);
        let mut state = state_at(&case, "vitals");
        for region in ["chest", "left-leg"] {
            assert_eq!(
                policy.next_action(&state, scene, &case),
                LearnerAction::Examine(region.to_string())
            );
            state = examine_zone(&state, "vitals", scene.interaction.zone(region).unwrap());
        }
        assert_eq!(
            policy.next_action(&state, scene, &case),
            LearnerAction::CompleteExam("ddx-initial".to_string())
        );
    }

    #[test]
    fn optimal_policy_mirrors_expert_differential() {
        let case = case();
        let state = state_at(&case, "ddx-refined");
        let scene = case.scene("ddx-refined").unwrap();
        let action = LearnerStrategy::Optimal
            .create_policy(0)
            .next_action(&state, scene, &case);
        assert_eq!(
            action,
            LearnerAction::CommitDdx {
                diagnoses: vec!["Pulmonary embolism".to_string()],
                next_scene_id: "disclosure".to_string(),
            }
        );
    }

    #[test]
    fn first_policy_skips_exams() {
        let case = case();
        let state = state_at(&case, "vitals");
        let scene = case.scene("vitals").unwrap();
        let action = LearnerStrategy::First
            .create_policy(0)
            .next_action(&state, scene, &case);
        assert_eq!(action, LearnerAction::CompleteExam("ddx-initial".to_string()));
    }

    #[test]
    fn random_policy_is_reproducible_per_seed() {
        let case = case();
        let state = state_at(&case, "ddx-initial");
        let scene = case.scene("ddx-initial").unwrap();
        let mut left = LearnerStrategy::Random.create_policy(99);
        let mut right = LearnerStrategy::Random.create_policy(99);
        for _ in 0..10 {
            assert_eq!(
                left.next_action(&state, scene, &case),
                right.next_action(&state, scene, &case)
            );
        }
    }

    #[test]
    fn action_labels_are_readable() {
        let action = LearnerAction::CommitDdx {
            diagnoses: vec!["A".to_string(), "B".to_string()],
            next_scene_id: "next".to_string(),
        };
        assert_eq!(action.label(), "ddx [A, B]");
        assert_eq!(LearnerAction::Examine("chest".into()).label(), "examine chest");
    }
}
