pub mod engine;
pub mod states;

pub use engine::{FailurePolicy, FlowGraph, GraphError, MessageKey, StepDef, TerminalAction};
pub use states::{FlowOutcome, RunField, RunState, StepId};
