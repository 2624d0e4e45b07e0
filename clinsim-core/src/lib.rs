//! Clinsim Case Engine
//!
//! Platform-agnostic core for branching clinical case simulations: the case
//! state model, the pure transition functions that advance it, and the
//! end-of-case scoring. Rendering, audio, and persistence live elsewhere.

pub mod case;
pub mod clock;
pub mod numbers;
pub mod query;
pub mod score;
pub mod session;
pub mod state;
pub mod transitions;

#[cfg(test)]
mod fixtures;

// Re-export commonly used types
pub use case::{
    Act, AnswerKey, CaseDefinition, CaseLoadError, CaseValidationError, ChoiceOption, Clue,
    DdxSnapshot, ExamZone, Interaction, Scene,
};
pub use clock::{Clock, SteppingClock, SystemClock};
pub use query::{current_scene, ddx_match_count, is_region_examined, scene_cp_cost, scene_spend};
pub use score::{Grade, Score, ScoreBreakdown, ScoreWeights, compute_score};
pub use session::CaseSession;
pub use state::{CaseState, ChoiceRecord, ChoiceSource, ExamRecord, RAPPORT_MAX, RAPPORT_MIN};
pub use transitions::{
    advance_to_scene, complete_ddx_check, complete_exam, create_initial_state, examine_zone,
    expire_timed_choice, finalize_case, make_choice, make_choice_from, snapshot_ddx, update_ddx,
};

use std::sync::Arc;

/// Trait for abstracting case loading operations
/// Platform-specific implementations should provide this
pub trait CaseLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the authored definition for `case_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the case cannot be found or parsed.
    fn load_case(&self, case_id: &str) -> Result<CaseDefinition, Self::Error>;
}

/// Trait for handing finished scores to whatever persists them
/// Platform-specific implementations should provide this
pub trait ScoreSink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Record a finalized score
    ///
    /// # Errors
    ///
    /// Returns an error if the score cannot be stored.
    fn record_score(&self, case_id: &str, score: &Score) -> Result<(), Self::Error>;
}

/// Main engine for starting sessions and recording their results
pub struct CaseEngine<L, S>
where
    L: CaseLoader,
    S: ScoreSink,
{
    loader: L,
    sink: S,
}

impl<L, S> CaseEngine<L, S>
where
    L: CaseLoader,
    S: ScoreSink,
{
    /// Create a new engine with the provided loader and score sink
    pub const fn new(loader: L, sink: S) -> Self {
        Self { loader, sink }
    }

    /// Start a wall-clock session for `case_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the case cannot be loaded.
    pub fn start_session(&self, case_id: &str) -> Result<CaseSession, L::Error> {
        self.start_session_with_clock(case_id, SystemClock)
    }

    /// Start a session for `case_id` timed by `clock`
    ///
    /// # Errors
    ///
    /// Returns an error if the case cannot be loaded.
    pub fn start_session_with_clock<C: Clock>(
        &self,
        case_id: &str,
        clock: C,
    ) -> Result<CaseSession<C>, L::Error> {
        let case = self.loader.load_case(case_id)?;
        Ok(CaseSession::with_clock(Arc::new(case), clock))
    }

    /// Finalize the session and hand its score to the sink.
    ///
    /// A session that was already scored is not recorded a second time, and
    /// `Ok(None)` is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink rejects the score.
    pub fn finalize_and_record<C: Clock>(
        &self,
        session: &mut CaseSession<C>,
    ) -> Result<Option<Score>, anyhow::Error>
    where
        S::Error: Into<anyhow::Error>,
    {
        if session.state().is_scored() {
            return Ok(None);
        }
        let Some(score) = session.finalize().cloned() else {
            return Ok(None);
        };
        self.sink
            .record_score(&session.state().case_id, &score)
            .map_err(Into::into)?;
        Ok(Some(score))
    }
}
