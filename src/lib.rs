pub mod deviates;
pub mod layout;
pub mod load;
pub mod orthant;
pub mod scores;
pub mod stats;
pub mod types;

mod batch;

pub use deviates::Randomness;
pub use orthant::lpmvnorm;
pub use scores::{slpmvnorm, ScoreMatrix};
pub use stats::CdfMethod;
pub use types::{Problem, Settings};
