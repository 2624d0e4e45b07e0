//! Stateful wrapper that owns one play-through and stamps actions with a clock.
use log::debug;
use std::sync::Arc;

use crate::case::{CaseDefinition, Interaction, Scene};
use crate::clock::{Clock, SystemClock};
use crate::query::{current_scene, is_region_examined};
use crate::score::Score;
use crate::state::CaseState;
use crate::transitions;

/// Owns one play-through: the case it plays, the current state, and the clock.
///
/// Every action hands the held state to a transition function and replaces it
/// with the result. Actions return `true` when the state changed.
#[derive(Debug, Clone)]
pub struct CaseSession<C: Clock = SystemClock> {
    case: Arc<CaseDefinition>,
    state: CaseState,
    clock: C,
}

impl CaseSession<SystemClock> {
    /// Start a session timed by the wall clock.
    #[must_use]
    pub fn start(case: Arc<CaseDefinition>) -> Self {
        Self::with_clock(case, SystemClock)
    }
}

impl<C: Clock> CaseSession<C> {
    #[must_use]
    pub fn with_clock(case: Arc<CaseDefinition>, clock: C) -> Self {
        let state = transitions::create_initial_state(&case, clock.now());
        Self { case, state, clock }
    }

    #[must_use]
    pub const fn state(&self) -> &CaseState {
        &self.state
    }

    #[must_use]
    pub fn definition(&self) -> &CaseDefinition {
        &self.case
    }

    #[must_use]
    pub fn shared_definition(&self) -> Arc<CaseDefinition> {
        Arc::clone(&self.case)
    }

    #[must_use]
    pub fn current_scene(&self) -> Option<&Scene> {
        current_scene(&self.state, &self.case)
    }

    #[must_use]
    pub fn score(&self) -> Option<&Score> {
        self.state.score.as_ref()
    }

    fn replace(&mut self, next: CaseState) -> bool {
        let changed = next != self.state;
        self.state = next;
        changed
    }

    /// Advance to an arbitrary scene.
    pub fn advance(&mut self, target_scene_id: &str) -> bool {
        let next =
            transitions::advance_to_scene(&self.state, target_scene_id, &self.case, self.clock.now());
        self.replace(next)
    }

    /// Follow a narrative scene's fixed continuation.
    pub fn continue_narrative(&mut self) -> bool {
        let next_id = match self.current_scene().map(|scene| &scene.interaction) {
            Some(Interaction::Narrative { next_scene_id }) => next_scene_id.clone(),
            _ => {
                debug!("continue ignored outside a narrative scene");
                return false;
            }
        };
        self.advance(&next_id)
    }

    /// Pick an option of the current choice or timed-choice scene.
    pub fn choose(&mut self, option_id: &str) -> bool {
        let Some(option) = self
            .current_scene()
            .and_then(|scene| scene.option(option_id))
            .cloned()
        else {
            debug!(
                "choice {option_id} ignored: not offered at {}",
                self.state.current_scene_id
            );
            return false;
        };
        let next = transitions::make_choice(&self.state, &option, &self.case, self.clock.now());
        self.replace(next)
    }

    /// Entry point for the external countdown when a timed choice expires.
    pub fn expire_timer(&mut self) -> bool {
        let next = transitions::expire_timed_choice(&self.state, &self.case, self.clock.now());
        self.replace(next)
    }

    /// Examine a region of the current exam scene. A region already examined
    /// here is not charged again.
    pub fn examine(&mut self, region_id: &str) -> bool {
        let scene_id = self.state.current_scene_id.clone();
        if is_region_examined(&self.state, &scene_id, region_id) {
            debug!("region {region_id} already examined at {scene_id}");
            return false;
        }
        let Some(zone) = self
            .current_scene()
            .and_then(|scene| scene.interaction.zone(region_id))
            .cloned()
        else {
            debug!("region {region_id} is not examinable at {scene_id}");
            return false;
        };
        let next = transitions::examine_zone(&self.state, &scene_id, &zone);
        self.replace(next)
    }

    pub fn complete_exam(&mut self, target_scene_id: &str) -> bool {
        let next =
            transitions::complete_exam(&self.state, target_scene_id, &self.case, self.clock.now());
        self.replace(next)
    }

    pub fn update_ddx<I, S>(&mut self, diagnoses: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next = transitions::update_ddx(&self.state, diagnoses);
        self.replace(next)
    }

    pub fn snapshot_ddx(&mut self) -> bool {
        let next = transitions::snapshot_ddx(&self.state);
        self.replace(next)
    }

    pub fn complete_ddx_check(&mut self, target_scene_id: &str) -> bool {
        let next = transitions::complete_ddx_check(
            &self.state,
            target_scene_id,
            &self.case,
            self.clock.now(),
        );
        self.replace(next)
    }

    /// Score the play-through. Later calls keep the first score.
    pub fn finalize(&mut self) -> Option<&Score> {
        self.state = transitions::finalize_case(&self.state, &self.case);
        self.state.score.as_ref()
    }

    /// Discard this play-through and start over from the case's starting values.
    pub fn replay(&mut self) {
        self.state = transitions::create_initial_state(&self.case, self.clock.now());
    }

    #[must_use]
    pub fn into_state(self) -> CaseState {
        self.state
    }
}
