use std::cell::RefCell;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clinsim_core::{
    CaseDefinition, CaseLoadError, CaseLoader, CaseValidationError, Score, ScoreSink,
};

const BUNDLED_CASE: &str = include_str!("../../../clinsim-core/assets/cases/breathless.json");

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read case file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] CaseLoadError),
    #[error("case failed validation: {0}")]
    Invalid(#[from] CaseValidationError),
    #[error("no case with id {0} is loaded")]
    UnknownCase(String),
}

/// The single case definition a tester run plays.
#[derive(Debug, Clone)]
pub struct TesterAssets {
    case: CaseDefinition,
}

impl TesterAssets {
    /// Load the demo case shipped with `clinsim-core`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled JSON no longer parses or validates.
    pub fn load_default() -> Result<Self, AssetError> {
        Self::from_json(BUNDLED_CASE)
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_path(path: &Path) -> Result<Self, AssetError> {
        let json = std::fs::read_to_string(path).map_err(|source| AssetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    fn from_json(json: &str) -> Result<Self, AssetError> {
        let case = CaseDefinition::from_json(json)?;
        case.validate()?;
        Ok(Self { case })
    }

    #[must_use]
    pub fn case(&self) -> &CaseDefinition {
        &self.case
    }

    #[must_use]
    pub fn case_id(&self) -> &str {
        &self.case.id
    }
}

impl CaseLoader for TesterAssets {
    type Error = AssetError;

    fn load_case(&self, case_id: &str) -> Result<CaseDefinition, Self::Error> {
        if case_id == self.case.id {
            Ok(self.case.clone())
        } else {
            Err(AssetError::UnknownCase(case_id.to_string()))
        }
    }
}

/// Collects every score the engine records so the runner can read it back.
#[derive(Debug, Clone, Default)]
pub struct ScoreLedger {
    recorded: Rc<RefCell<Vec<(String, Score)>>>,
}

impl ScoreLedger {
    pub fn drain(&self) -> Vec<(String, Score)> {
        self.recorded.borrow_mut().drain(..).collect()
    }
}

impl ScoreSink for ScoreLedger {
    type Error = Infallible;

    fn record_score(&self, case_id: &str, score: &Score) -> Result<(), Self::Error> {
        self.recorded
            .borrow_mut()
            .push((case_id.to_string(), score.clone()));
        Ok(())
    }
}
