pub mod engine;
pub mod states;

pub use engine::{FlowEngine, FlowTransitionError};
pub use states::{FlowAction, FlowEvent, TransitionOutcome};
