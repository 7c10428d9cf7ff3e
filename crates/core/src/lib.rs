pub mod catalog;
pub mod coach;
pub mod config;
pub mod evaluation;
pub mod intent;
pub mod knowledge;
pub mod profile;
pub mod recorder;
pub mod report;
pub mod responder;
pub mod scenario;
pub mod session;
pub mod topic;

pub use coach::{Coach, CoachReply};
pub use config::CoachConfig;
pub use evaluation::{Dimension, DimensionScores, DimensionWeights, Evaluation};
pub use intent::Intent;
