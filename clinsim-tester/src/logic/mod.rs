pub mod assets;
pub mod policy;
pub mod reports;
pub mod runner;
pub mod tester;

pub use assets::TesterAssets;
pub use policy::LearnerStrategy;
pub use tester::*;
