//! Read-only lookups shared by the transitions and the presentation layer.
use std::collections::HashSet;

use crate::case::{CaseDefinition, Scene};
use crate::state::CaseState;

#[must_use]
pub fn current_scene<'a>(state: &CaseState, case: &'a CaseDefinition) -> Option<&'a Scene> {
    case.scene(&state.current_scene_id)
}

#[must_use]
pub fn is_region_examined(state: &CaseState, scene_id: &str, region_id: &str) -> bool {
    state
        .exam_record(scene_id)
        .is_some_and(|record| record.regions.iter().any(|region| region == region_id))
}

/// Base entry cost of a scene, zero when unauthored.
#[must_use]
pub fn scene_cp_cost(scene: &Scene) -> u32 {
    scene.cp_cost.unwrap_or(0)
}

/// Points spent at `scene_id` over the whole play-through: entry cost per
/// charged visit, options chosen there, and zones examined there. The opening
/// visit to the start scene is free. Costs are resolved
/// from the case definition, so records that no longer resolve count as zero.
/// A zone examined repeatedly is counted once here even though each call
/// charged it.
#[must_use]
pub fn scene_spend(state: &CaseState, case: &CaseDefinition, scene_id: &str) -> u32 {
    let Some(scene) = case.scene(scene_id) else {
        return 0;
    };
    let visits = state
        .visited_scenes
        .iter()
        .filter(|visited| *visited == scene_id)
        .count();
    let opening = state.visited_scenes.first().is_some_and(|first| first == scene_id)
        && case.start_scene_id == scene_id;
    let visits = visits.saturating_sub(usize::from(opening));
    let entry = scene_cp_cost(scene).saturating_mul(u32::try_from(visits).unwrap_or(u32::MAX));
    let choices: u32 = state
        .choice_history
        .iter()
        .filter(|record| record.scene_id == scene_id)
        .filter_map(|record| scene.option(&record.option_id))
        .map(|option| option.cp_cost)
        .sum();
    let exams: u32 = state
        .exam_record(scene_id)
        .map(|record| {
            record
                .regions
                .iter()
                .filter_map(|region| scene.interaction.zone(region))
                .map(|zone| zone.cp_cost)
                .sum()
        })
        .unwrap_or(0);
    entry.saturating_add(choices).saturating_add(exams)
}

/// Number of diagnoses the two lists share, as sets.
#[must_use]
pub fn ddx_match_count(player: &[String], expert: &[String]) -> usize {
    let expert: HashSet<&str> = expert.iter().map(String::as_str).collect();
    player
        .iter()
        .map(String::as_str)
        .collect::<HashSet<_>>()
        .intersection(&expert)
        .count()
}
