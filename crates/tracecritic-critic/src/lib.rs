mod aggregator;
pub mod engine;
mod prompts;

pub use aggregator::Aggregator;
pub use engine::{CritiqueEngine, CritiqueError, RawCritique, NO_HISTORY_SENTINEL};
pub use prompts::CritiquePrompts;
