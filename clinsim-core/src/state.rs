//! Per-play-through case state.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::case::{Act, Clue, DdxSnapshot};
use crate::score::Score;

pub const RAPPORT_MIN: i32 = 0;
pub const RAPPORT_MAX: i32 = 100;

/// Examined regions for one scene, stored inline for the common small case.
pub type RegionSet = SmallVec<[String; 4]>;

#[must_use]
pub const fn clamp_rapport(value: i32) -> i32 {
    if value < RAPPORT_MIN {
        RAPPORT_MIN
    } else if value > RAPPORT_MAX {
        RAPPORT_MAX
    } else {
        value
    }
}

/// Where a recorded choice came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceSource {
    #[default]
    Manual,
    /// Applied automatically when a timed choice's countdown expired.
    TimerExpired,
}

/// A decision made at a choice-bearing scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceRecord {
    pub scene_id: String,
    pub option_id: String,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub source: ChoiceSource,
}

/// Regions examined while at a given scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamRecord {
    pub scene_id: String,
    #[serde(default)]
    pub regions: RegionSet,
}

/// Progress of one play-through. Replaced wholesale by every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseState {
    pub case_id: String,
    pub current_scene_id: String,
    pub current_act: Act,
    /// Every scene entered, in order, revisits included.
    pub visited_scenes: Vec<String>,
    pub choice_history: Vec<ChoiceRecord>,
    /// The learner's current differential, an ordered set.
    pub working_ddx: Vec<String>,
    /// Checkpoint snapshots, one per `snapshot_ddx` call.
    pub ddx_history: Vec<DdxSnapshot>,
    pub cp_budget: u32,
    pub cp_spent: u32,
    pub rapport: i32,
    pub collected_clues: Vec<Clue>,
    pub exam_records: Vec<ExamRecord>,
    pub started_at: DateTime<Utc>,
    pub scene_entered_at: DateTime<Utc>,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revealed_diagnosis: Option<String>,
}

impl CaseState {
    #[must_use]
    pub fn has_clue(&self, clue_id: &str) -> bool {
        self.collected_clues.iter().any(|clue| clue.id == clue_id)
    }

    #[must_use]
    pub const fn remaining_budget(&self) -> u32 {
        self.cp_budget.saturating_sub(self.cp_spent)
    }

    #[must_use]
    pub const fn is_scored(&self) -> bool {
        self.score.is_some()
    }

    #[must_use]
    pub fn exam_record(&self, scene_id: &str) -> Option<&ExamRecord> {
        self.exam_records
            .iter()
            .find(|record| record.scene_id == scene_id)
    }

    pub(crate) fn spend(&mut self, cost: u32) {
        self.cp_spent = self.cp_spent.saturating_add(cost);
    }

    pub(crate) fn shift_rapport(&mut self, delta: i32) {
        self.rapport = clamp_rapport(self.rapport.saturating_add(delta));
    }

    /// Add clues whose ids are not yet collected, preserving discovery order.
    pub(crate) fn merge_clues<'a>(&mut self, clues: impl IntoIterator<Item = &'a Clue>) {
        for clue in clues {
            if !self.has_clue(&clue.id) {
                self.collected_clues.push(clue.clone());
            }
        }
    }

    pub(crate) fn record_region(&mut self, scene_id: &str, region_id: &str) {
        if let Some(record) = self
            .exam_records
            .iter_mut()
            .find(|record| record.scene_id == scene_id)
        {
            if !record.regions.iter().any(|region| region == region_id) {
                record.regions.push(region_id.to_string());
            }
            return;
        }
        let mut regions = RegionSet::new();
        regions.push(region_id.to_string());
        self.exam_records.push(ExamRecord {
            scene_id: scene_id.to_string(),
            regions,
        });
    }
}
