pub mod exchange;
pub mod interpretation;

pub use exchange::ChatExchange;
pub use interpretation::{FailureCause, InterpretationResult};
