//! Pure transition functions, one per player action.
//!
//! Every function takes the current [`CaseState`] by reference and returns the
//! next state; the input is never modified. Destination scene ids are authored
//! data, so an id that does not resolve turns the advance into a no-op rather
//! than an error.
use chrono::{DateTime, Utc};
use log::{debug, trace, warn};

use crate::case::{Act, CaseDefinition, ChoiceOption, DdxSnapshot, ExamZone, Interaction, Scene};
use crate::score::compute_score;
use crate::state::{CaseState, ChoiceRecord, ChoiceSource, clamp_rapport};

/// Build a fresh state for one play session.
///
/// Counters start at the definition's values. The start scene's clues are
/// collected and it is recorded as visited, but its CP cost and rapport effect
/// are not charged. An unknown start scene leaves the state parked on the
/// authored id with nothing collected.
#[must_use]
pub fn create_initial_state(case: &CaseDefinition, now: DateTime<Utc>) -> CaseState {
    let mut state = CaseState {
        case_id: case.id.clone(),
        current_scene_id: case.start_scene_id.clone(),
        current_act: Act::default(),
        visited_scenes: Vec::new(),
        choice_history: Vec::new(),
        working_ddx: Vec::new(),
        ddx_history: Vec::new(),
        cp_budget: case.starting_budget,
        cp_spent: 0,
        rapport: clamp_rapport(case.starting_rapport),
        collected_clues: Vec::new(),
        exam_records: Vec::new(),
        started_at: now,
        scene_entered_at: now,
        completed: false,
        score: None,
        revealed_diagnosis: None,
    };
    match case.scene(&case.start_scene_id) {
        Some(scene) => arrive_at(&mut state, scene, now),
        None => debug!(
            "case {} start scene {} does not resolve",
            case.id, case.start_scene_id
        ),
    }
    state
}

fn enter_scene(state: &mut CaseState, scene: &Scene, now: DateTime<Utc>) {
    state.spend(scene.cp_cost.unwrap_or(0));
    state.shift_rapport(scene.rapport_effect.unwrap_or(0));
    arrive_at(state, scene, now);
}

fn arrive_at(state: &mut CaseState, scene: &Scene, now: DateTime<Utc>) {
    state.merge_clues(&scene.clues);
    state.visited_scenes.push(scene.id.clone());
    state.current_scene_id.clone_from(&scene.id);
    state.current_act = scene.act;
    state.scene_entered_at = now;
    if scene.interaction.is_terminal() {
        state.completed = true;
    }
    trace!(
        "entered scene {} ({}), spent {} rapport {}",
        scene.id,
        scene.interaction.mode_label(),
        state.cp_spent,
        state.rapport
    );
}

/// Move to `target_scene_id`, applying its entry effects.
///
/// A completed case stays on its terminal scene; advancing from it is a no-op.
#[must_use]
pub fn advance_to_scene(
    state: &CaseState,
    target_scene_id: &str,
    case: &CaseDefinition,
    now: DateTime<Utc>,
) -> CaseState {
    if state.completed {
        debug!(
            "advance to {target_scene_id} ignored: case {} is already complete",
            state.case_id
        );
        return state.clone();
    }
    let Some(scene) = case.scene(target_scene_id) else {
        debug!(
            "advance from {} ignored: scene {target_scene_id} does not resolve",
            state.current_scene_id
        );
        return state.clone();
    };
    let mut next = state.clone();
    enter_scene(&mut next, scene, now);
    next
}

/// Record a manual choice and follow the option to its target scene.
#[must_use]
pub fn make_choice(
    state: &CaseState,
    option: &ChoiceOption,
    case: &CaseDefinition,
    now: DateTime<Utc>,
) -> CaseState {
    make_choice_from(state, option, ChoiceSource::Manual, case, now)
}

/// Shared path for every choice, whoever made it.
///
/// The choice is recorded and the option's cost and rapport effect are applied
/// even when the target scene does not resolve. Option effects land before the
/// destination scene's entry effects.
#[must_use]
pub fn make_choice_from(
    state: &CaseState,
    option: &ChoiceOption,
    source: ChoiceSource,
    case: &CaseDefinition,
    now: DateTime<Utc>,
) -> CaseState {
    let mut next = state.clone();
    next.choice_history.push(ChoiceRecord {
        scene_id: state.current_scene_id.clone(),
        option_id: option.id.clone(),
        at: now,
        source,
    });
    next.spend(option.cp_cost);
    next.shift_rapport(option.rapport_effect);
    advance_to_scene(&next, &option.target_scene_id, case, now)
}

/// Apply the default option of the current timed choice.
///
/// Called by the external countdown when it fires. Outside a timed choice, or
/// when the default option id does not resolve, this is a no-op.
#[must_use]
pub fn expire_timed_choice(
    state: &CaseState,
    case: &CaseDefinition,
    now: DateTime<Utc>,
) -> CaseState {
    let Some(scene) = case.scene(&state.current_scene_id) else {
        return state.clone();
    };
    let Interaction::TimedChoice {
        default_option_id, ..
    } = &scene.interaction
    else {
        debug!(
            "timer expiry ignored: scene {} is not a timed choice",
            scene.id
        );
        return state.clone();
    };
    match scene.option(default_option_id) {
        Some(option) => make_choice_from(state, option, ChoiceSource::TimerExpired, case, now),
        None => {
            debug!(
                "timer expiry ignored: default option {default_option_id} missing in {}",
                scene.id
            );
            state.clone()
        }
    }
}

/// Examine one body region of `scene_id`.
///
/// Clue merging is idempotent; the cost is charged on every call, so callers
/// should not re-issue a region already recorded for the scene.
#[must_use]
pub fn examine_zone(state: &CaseState, scene_id: &str, zone: &ExamZone) -> CaseState {
    let mut next = state.clone();
    next.spend(zone.cp_cost);
    next.merge_clues(&zone.clues);
    next.record_region(scene_id, &zone.region_id);
    next
}

/// Leave an exam scene for `target_scene_id`.
#[must_use]
pub fn complete_exam(
    state: &CaseState,
    target_scene_id: &str,
    case: &CaseDefinition,
    now: DateTime<Utc>,
) -> CaseState {
    advance_to_scene(state, target_scene_id, case, now)
}

/// Replace the working differential. Last write wins; duplicates collapse to
/// their first occurrence.
#[must_use]
pub fn update_ddx<I, S>(state: &CaseState, diagnoses: I) -> CaseState
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut working: Vec<String> = Vec::new();
    for diagnosis in diagnoses {
        let diagnosis = diagnosis.into();
        if !working.contains(&diagnosis) {
            working.push(diagnosis);
        }
    }
    CaseState {
        working_ddx: working,
        ..state.clone()
    }
}

/// Append a checkpoint snapshot of the working differential, tagged with the
/// current scene. Repeated calls for one scene append repeated entries.
#[must_use]
pub fn snapshot_ddx(state: &CaseState) -> CaseState {
    let mut next = state.clone();
    next.ddx_history.push(DdxSnapshot {
        scene_id: state.current_scene_id.clone(),
        diagnoses: state.working_ddx.clone(),
    });
    next
}

/// Snapshot the differential, then advance. The snapshot survives an
/// unresolved target.
#[must_use]
pub fn complete_ddx_check(
    state: &CaseState,
    target_scene_id: &str,
    case: &CaseDefinition,
    now: DateTime<Utc>,
) -> CaseState {
    advance_to_scene(&snapshot_ddx(state), target_scene_id, case, now)
}

/// Score the play-through and reveal the diagnosis.
///
/// One-shot: a state that already carries a score is returned unchanged.
#[must_use]
pub fn finalize_case(state: &CaseState, case: &CaseDefinition) -> CaseState {
    if state.is_scored() {
        warn!("case {} already finalized; keeping the first score", state.case_id);
        return state.clone();
    }
    let score = compute_score(state, case);
    CaseState {
        score: Some(score),
        revealed_diagnosis: Some(case.answer_key.final_diagnosis.clone()),
        completed: true,
        ..state.clone()
    }
}
