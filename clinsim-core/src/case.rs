//! Authored case definitions: the scene graph, its interactions, and the answer key.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

use crate::state::{RAPPORT_MAX, RAPPORT_MIN};

/// Narrative phase a scene belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Act {
    #[default]
    Opening,
    History,
    Examination,
    Investigation,
    Diagnosis,
    Resolution,
}

/// An atomic piece of discoverable case information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clue {
    pub id: String,
    pub label: String,
    /// Free-form tag such as `history`, `vitals`, `lab`, or `imaging`.
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub is_key_finding: bool,
}

/// A selectable option inside a `choices` or `timed_choice` interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub label: String,
    pub target_scene_id: String,
    #[serde(default)]
    pub cp_cost: u32,
    #[serde(default)]
    pub rapport_effect: i32,
    /// Answer-key annotation: whether an expert would pick this option here.
    #[serde(default)]
    pub is_optimal: bool,
    #[serde(default)]
    pub xp_modifier: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// A body region that can be examined in an `exam_zones` interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamZone {
    pub region_id: String,
    pub label: String,
    #[serde(default)]
    pub cp_cost: u32,
    #[serde(default)]
    pub clues: Vec<Clue>,
    /// Clues revealed by a key-finding zone count toward coverage.
    #[serde(default)]
    pub is_key_finding: bool,
}

/// What input a scene expects and how it resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Interaction {
    Narrative {
        next_scene_id: String,
    },
    Choices {
        options: Vec<ChoiceOption>,
    },
    TimedChoice {
        options: Vec<ChoiceOption>,
        seconds: u32,
        default_option_id: String,
    },
    ExamZones {
        zones: Vec<ExamZone>,
        next_scene_id: String,
    },
    DdxCheck {
        next_scene_id: String,
    },
    DiagnosisReveal,
}

impl Interaction {
    /// Decision-bearing options, empty for every other mode.
    #[must_use]
    pub fn options(&self) -> &[ChoiceOption] {
        match self {
            Self::Choices { options } | Self::TimedChoice { options, .. } => options,
            _ => &[],
        }
    }

    #[must_use]
    pub fn zones(&self) -> &[ExamZone] {
        match self {
            Self::ExamZones { zones, .. } => zones,
            _ => &[],
        }
    }

    #[must_use]
    pub fn zone(&self, region_id: &str) -> Option<&ExamZone> {
        self.zones().iter().find(|zone| zone.region_id == region_id)
    }

    /// The authored continuation for modes that advance to a fixed scene.
    #[must_use]
    pub fn next_scene_id(&self) -> Option<&str> {
        match self {
            Self::Narrative { next_scene_id }
            | Self::ExamZones { next_scene_id, .. }
            | Self::DdxCheck { next_scene_id } => Some(next_scene_id),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::DiagnosisReveal)
    }

    #[must_use]
    pub const fn mode_label(&self) -> &'static str {
        match self {
            Self::Narrative { .. } => "narrative",
            Self::Choices { .. } => "choices",
            Self::TimedChoice { .. } => "timed_choice",
            Self::ExamZones { .. } => "exam_zones",
            Self::DdxCheck { .. } => "ddx_check",
            Self::DiagnosisReveal => "diagnosis_reveal",
        }
    }
}

/// One node in the case's narrative graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    #[serde(default)]
    pub act: Act,
    #[serde(default)]
    pub narration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue: Option<String>,
    #[serde(default)]
    pub clues: Vec<Clue>,
    #[serde(default)]
    pub cp_cost: Option<u32>,
    #[serde(default)]
    pub rapport_effect: Option<i32>,
    pub interaction: Interaction,
}

impl Scene {
    #[must_use]
    pub fn option(&self, option_id: &str) -> Option<&ChoiceOption> {
        self.interaction
            .options()
            .iter()
            .find(|option| option.id == option_id)
    }
}

/// Differential captured at a checkpoint scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdxSnapshot {
    pub scene_id: String,
    #[serde(default)]
    pub diagnoses: Vec<String>,
}

/// Authored ground truth a play-through is scored against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AnswerKey {
    #[serde(default)]
    pub optimal_path: Vec<String>,
    #[serde(default)]
    pub optimal_cp_spend: u32,
    /// Time-ordered expert differentials, one per checkpoint scene.
    #[serde(default)]
    pub expert_ddx: Vec<DdxSnapshot>,
    #[serde(default)]
    pub final_diagnosis: String,
    #[serde(default)]
    pub learning_notes: Vec<String>,
}

/// Errors raised when case JSON cannot be read.
#[derive(Debug, Error)]
pub enum CaseLoadError {
    #[error("case definition is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Authoring mistakes reported by [`CaseDefinition::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaseValidationError {
    #[error("case `{case_id}` defines no scenes")]
    NoScenes { case_id: String },
    #[error("scene id `{scene_id}` is defined more than once")]
    DuplicateScene { scene_id: String },
    #[error("start scene `{scene_id}` does not exist")]
    UnknownStartScene { scene_id: String },
    #[error("scene `{scene_id}` points at missing scene `{target}`")]
    DanglingTarget { scene_id: String, target: String },
    #[error("timed choice in `{scene_id}` defaults to unknown option `{option_id}`")]
    UnknownDefaultOption { scene_id: String, option_id: String },
    #[error("expert differential references unknown scene `{scene_id}`")]
    UnknownCheckpoint { scene_id: String },
    #[error("optimal path references unknown scene `{scene_id}`")]
    UnknownPathScene { scene_id: String },
    #[error("starting rapport {value} is outside [{min}, {max}]")]
    RapportOutOfRange { value: i32, min: i32, max: i32 },
}

/// A fully authored case, supplied whole to the engine and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseDefinition {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub start_scene_id: String,
    #[serde(default)]
    pub starting_budget: u32,
    #[serde(default = "default_starting_rapport")]
    pub starting_rapport: i32,
    #[serde(default)]
    pub candidate_diagnoses: Vec<String>,
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub answer_key: AnswerKey,
}

const fn default_starting_rapport() -> i32 {
    50
}

impl CaseDefinition {
    /// Parse a case definition from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a case definition.
    pub fn from_json(json: &str) -> Result<Self, CaseLoadError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn scene(&self, scene_id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|scene| scene.id == scene_id)
    }

    /// Clue ids that count toward key-finding coverage.
    ///
    /// Scene clues count when flagged individually; zone clues count only when
    /// their zone is flagged as a key-finding zone.
    #[must_use]
    pub fn key_findings(&self) -> BTreeSet<&str> {
        let mut keys = BTreeSet::new();
        for scene in &self.scenes {
            keys.extend(
                scene
                    .clues
                    .iter()
                    .filter(|clue| clue.is_key_finding)
                    .map(|clue| clue.id.as_str()),
            );
            for zone in scene.interaction.zones() {
                if zone.is_key_finding {
                    keys.extend(zone.clues.iter().map(|clue| clue.id.as_str()));
                }
            }
        }
        keys
    }

    /// Authoring-time consistency check. Play never calls this; transitions
    /// stay lenient toward whatever it would report.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), CaseValidationError> {
        if self.scenes.is_empty() {
            return Err(CaseValidationError::NoScenes {
                case_id: self.id.clone(),
            });
        }
        let mut ids = HashSet::new();
        for scene in &self.scenes {
            if !ids.insert(scene.id.as_str()) {
                return Err(CaseValidationError::DuplicateScene {
                    scene_id: scene.id.clone(),
                });
            }
        }
        if !ids.contains(self.start_scene_id.as_str()) {
            return Err(CaseValidationError::UnknownStartScene {
                scene_id: self.start_scene_id.clone(),
            });
        }
        if !(RAPPORT_MIN..=RAPPORT_MAX).contains(&self.starting_rapport) {
            return Err(CaseValidationError::RapportOutOfRange {
                value: self.starting_rapport,
                min: RAPPORT_MIN,
                max: RAPPORT_MAX,
            });
        }
        for scene in &self.scenes {
            self.validate_scene(scene, &ids)?;
        }
        if let Some(snapshot) = self
            .answer_key
            .expert_ddx
            .iter()
            .find(|snapshot| !ids.contains(snapshot.scene_id.as_str()))
        {
            return Err(CaseValidationError::UnknownCheckpoint {
                scene_id: snapshot.scene_id.clone(),
            });
        }
        if let Some(scene_id) = self
            .answer_key
            .optimal_path
            .iter()
            .find(|scene_id| !ids.contains(scene_id.as_str()))
        {
            return Err(CaseValidationError::UnknownPathScene {
                scene_id: scene_id.clone(),
            });
        }
        Ok(())
    }

    fn validate_scene(&self, scene: &Scene, ids: &HashSet<&str>) -> Result<(), CaseValidationError> {
        let dangling = |target: &str| CaseValidationError::DanglingTarget {
            scene_id: scene.id.clone(),
            target: target.to_string(),
        };
        if let Some(next) = scene.interaction.next_scene_id()
            && !ids.contains(next)
        {
            return Err(dangling(next));
        }
        for option in scene.interaction.options() {
            if !ids.contains(option.target_scene_id.as_str()) {
                return Err(dangling(&option.target_scene_id));
            }
        }
        if let Interaction::TimedChoice {
            default_option_id, ..
        } = &scene.interaction
            && scene.option(default_option_id).is_none()
        {
            return Err(CaseValidationError::UnknownDefaultOption {
                scene_id: scene.id.clone(),
                option_id: default_option_id.clone(),
            });
        }
        Ok(())
    }
}
