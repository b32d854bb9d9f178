pub mod evaluator;
pub mod outcome;

pub use evaluator::{OutcomeEvaluator, PassReport};
pub use outcome::{evaluate, OutcomePolicy};
