use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::flows::states::{RunField, RunState, StepId};

/// What a decision step does when its classification cannot be obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    Propagate,
    AssumeFalse,
}

/// Fixed texts a terminal step can emit; resolved against the configured messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKey {
    PoliteWarning,
    AskProduct,
    NoTool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminalAction {
    Message(MessageKey),
    /// Let the oracle answer or pick one tool call, then report the result.
    Agent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepDef {
    Decision { field: RunField, on_true: StepId, on_false: StepId, on_failure: FailurePolicy },
    Terminal(TerminalAction),
}

impl StepDef {
    fn targets(&self) -> Vec<StepId> {
        match self {
            Self::Decision { on_true, on_false, .. } => vec![*on_true, *on_false],
            Self::Terminal(_) => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("start step {start} has no definition")]
    MissingStart { start: StepId },
    #[error("step {step} is defined more than once")]
    DuplicateStep { step: StepId },
    #[error("step {from} routes to undefined step {to}")]
    UndefinedTarget { from: StepId, to: StepId },
    #[error("field {} is computed by both {first} and {second}", .field.as_str())]
    DuplicateFieldWriter { field: RunField, first: StepId, second: StepId },
    #[error("step {step} is part of a cycle")]
    Cycle { step: StepId },
    #[error("step {step} cannot be reached from the start step")]
    UnreachableStep { step: StepId },
    #[error("step {step} has no definition")]
    UndefinedStep { step: StepId },
    #[error("step {step} is terminal and has no outgoing edge")]
    NotADecision { step: StepId },
    #[error("step {step} branches on {} before it was computed", .field.as_str())]
    FieldUnset { step: StepId, field: RunField },
    #[error("field {} was already written for this run", .field.as_str())]
    FieldAlreadySet { field: RunField },
    #[error("run output was already written")]
    OutputAlreadySet,
    #[error("run exceeded {limit} steps without reaching a terminal step")]
    HopLimitExceeded { limit: usize },
}

/// Fixed directed graph of decision and terminal steps.
///
/// All structural checks happen in [`FlowGraph::new`]; a constructed graph is
/// acyclic, fully defined and reachable from its start step.
#[derive(Clone, Debug)]
pub struct FlowGraph {
    start: StepId,
    steps: BTreeMap<StepId, StepDef>,
    max_hops: usize,
}

impl FlowGraph {
    pub fn new(
        start: StepId,
        definitions: impl IntoIterator<Item = (StepId, StepDef)>,
    ) -> Result<Self, GraphError> {
        let mut steps = BTreeMap::new();
        let mut writers: BTreeMap<RunField, StepId> = BTreeMap::new();

        for (id, def) in definitions {
            if steps.insert(id, def).is_some() {
                return Err(GraphError::DuplicateStep { step: id });
            }
            if let StepDef::Decision { field, .. } = def {
                if let Some(first) = writers.insert(field, id) {
                    return Err(GraphError::DuplicateFieldWriter { field, first, second: id });
                }
            }
        }

        if !steps.contains_key(&start) {
            return Err(GraphError::MissingStart { start });
        }

        for (id, def) in &steps {
            for target in def.targets() {
                if !steps.contains_key(&target) {
                    return Err(GraphError::UndefinedTarget { from: *id, to: target });
                }
            }
        }

        let mut depths = BTreeMap::new();
        let max_hops = longest_path(start, &steps, &mut BTreeSet::new(), &mut depths)?;

        if let Some(step) = steps.keys().find(|id| !depths.contains_key(*id)) {
            return Err(GraphError::UnreachableStep { step: *step });
        }

        Ok(Self { start, steps, max_hops })
    }

    /// politeness → classify_pay_amount → check_tool → agent, with one
    /// terminal exit per negative verdict.
    pub fn purchase() -> Result<Self, GraphError> {
        use StepId::{
            Agent, AskProduct, CheckTool, ClassifyPayAmount, NoTool, PoliteWarning, Politeness,
        };
        use TerminalAction::Message;

        Self::new(
            Politeness,
            [
                (
                    Politeness,
                    StepDef::Decision {
                        field: RunField::IsHonorific,
                        on_true: ClassifyPayAmount,
                        on_false: PoliteWarning,
                        on_failure: FailurePolicy::Propagate,
                    },
                ),
                (
                    ClassifyPayAmount,
                    StepDef::Decision {
                        field: RunField::HasPaymentIntent,
                        on_true: CheckTool,
                        on_false: AskProduct,
                        on_failure: FailurePolicy::Propagate,
                    },
                ),
                (
                    CheckTool,
                    StepDef::Decision {
                        field: RunField::IsToolEligible,
                        on_true: Agent,
                        on_false: NoTool,
                        on_failure: FailurePolicy::AssumeFalse,
                    },
                ),
                (PoliteWarning, StepDef::Terminal(Message(MessageKey::PoliteWarning))),
                (AskProduct, StepDef::Terminal(Message(MessageKey::AskProduct))),
                (NoTool, StepDef::Terminal(Message(MessageKey::NoTool))),
                (Agent, StepDef::Terminal(TerminalAction::Agent)),
            ],
        )
    }

    pub fn start(&self) -> StepId {
        self.start
    }

    /// Number of steps on the longest path from start to a terminal, inclusive.
    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    pub fn step(&self, id: StepId) -> Result<&StepDef, GraphError> {
        self.steps.get(&id).ok_or(GraphError::UndefinedStep { step: id })
    }

    pub fn steps(&self) -> impl Iterator<Item = (&StepId, &StepDef)> {
        self.steps.iter()
    }

    pub fn next(&self, id: StepId, state: &RunState) -> Result<StepId, GraphError> {
        match self.step(id)? {
            StepDef::Decision { field, on_true, on_false, .. } => match state.get(*field) {
                Some(true) => Ok(*on_true),
                Some(false) => Ok(*on_false),
                None => Err(GraphError::FieldUnset { step: id, field: *field }),
            },
            StepDef::Terminal(_) => Err(GraphError::NotADecision { step: id }),
        }
    }
}

fn longest_path(
    id: StepId,
    steps: &BTreeMap<StepId, StepDef>,
    visiting: &mut BTreeSet<StepId>,
    depths: &mut BTreeMap<StepId, usize>,
) -> Result<usize, GraphError> {
    if let Some(depth) = depths.get(&id) {
        return Ok(*depth);
    }
    if !visiting.insert(id) {
        return Err(GraphError::Cycle { step: id });
    }

    let def = steps.get(&id).ok_or(GraphError::UndefinedStep { step: id })?;
    let mut deepest = 0;
    for target in def.targets() {
        deepest = deepest.max(longest_path(target, steps, visiting, depths)?);
    }

    visiting.remove(&id);
    depths.insert(id, deepest + 1);
    Ok(deepest + 1)
}

#[cfg(test)]
mod tests {
    use crate::flows::engine::{
        FailurePolicy, FlowGraph, GraphError, MessageKey, StepDef, TerminalAction,
    };
    use crate::flows::states::{RunField, RunState, StepId};

    const END: StepDef = StepDef::Terminal(TerminalAction::Message(MessageKey::NoTool));

    fn decision(field: RunField, on_true: StepId, on_false: StepId) -> StepDef {
        StepDef::Decision { field, on_true, on_false, on_failure: FailurePolicy::Propagate }
    }

    #[test]
    fn purchase_graph_is_valid_and_bounded() {
        let graph = FlowGraph::purchase().expect("fixed topology is valid");

        assert_eq!(graph.start(), StepId::Politeness);
        assert_eq!(graph.max_hops(), 4);
        assert_eq!(graph.steps().count(), 7);
    }

    #[test]
    fn only_check_tool_fails_open() {
        let graph = FlowGraph::purchase().expect("valid graph");
        let fail_open: Vec<_> = graph
            .steps()
            .filter(|(_, def)| {
                matches!(def, StepDef::Decision { on_failure: FailurePolicy::AssumeFalse, .. })
            })
            .map(|(id, _)| *id)
            .collect();

        assert_eq!(fail_open, vec![StepId::CheckTool]);
    }

    #[test]
    fn terminal_steps_declare_their_output() {
        let graph = FlowGraph::purchase().expect("valid graph");

        assert_eq!(
            graph.step(StepId::PoliteWarning),
            Ok(&StepDef::Terminal(TerminalAction::Message(MessageKey::PoliteWarning)))
        );
        assert_eq!(graph.step(StepId::Agent), Ok(&StepDef::Terminal(TerminalAction::Agent)));
    }

    #[test]
    fn next_follows_the_recorded_verdict() {
        let graph = FlowGraph::purchase().expect("valid graph");
        let mut state = RunState::new("결제할게요 10000원");

        state.record(RunField::IsHonorific, true).expect("record");
        assert_eq!(graph.next(StepId::Politeness, &state), Ok(StepId::ClassifyPayAmount));

        state.record(RunField::HasPaymentIntent, false).expect("record");
        assert_eq!(graph.next(StepId::ClassifyPayAmount, &state), Ok(StepId::AskProduct));
    }

    #[test]
    fn next_rejects_unset_field_and_terminal_steps() {
        let graph = FlowGraph::purchase().expect("valid graph");
        let state = RunState::new("사줘");

        assert_eq!(
            graph.next(StepId::Politeness, &state),
            Err(GraphError::FieldUnset { step: StepId::Politeness, field: RunField::IsHonorific })
        );
        assert_eq!(
            graph.next(StepId::NoTool, &state),
            Err(GraphError::NotADecision { step: StepId::NoTool })
        );
    }

    #[test]
    fn undefined_edge_target_is_rejected_at_construction() {
        let error = FlowGraph::new(
            StepId::Politeness,
            [
                (
                    StepId::Politeness,
                    decision(RunField::IsHonorific, StepId::Agent, StepId::PoliteWarning),
                ),
                (StepId::PoliteWarning, END),
            ],
        )
        .expect_err("agent is not defined");

        assert_eq!(
            error,
            GraphError::UndefinedTarget { from: StepId::Politeness, to: StepId::Agent }
        );
    }

    #[test]
    fn cycles_are_rejected() {
        let error = FlowGraph::new(
            StepId::Politeness,
            [
                (
                    StepId::Politeness,
                    decision(RunField::IsHonorific, StepId::CheckTool, StepId::NoTool),
                ),
                (
                    StepId::CheckTool,
                    decision(RunField::IsToolEligible, StepId::Politeness, StepId::NoTool),
                ),
                (StepId::NoTool, END),
            ],
        )
        .expect_err("politeness <-> check_tool loops");

        assert!(matches!(error, GraphError::Cycle { .. }));
    }

    #[test]
    fn duplicate_field_writers_are_rejected() {
        let error = FlowGraph::new(
            StepId::Politeness,
            [
                (
                    StepId::Politeness,
                    decision(RunField::IsHonorific, StepId::CheckTool, StepId::NoTool),
                ),
                (
                    StepId::CheckTool,
                    decision(RunField::IsHonorific, StepId::Agent, StepId::NoTool),
                ),
                (StepId::Agent, END),
                (StepId::NoTool, END),
            ],
        )
        .expect_err("two writers for is_honorific");

        assert_eq!(
            error,
            GraphError::DuplicateFieldWriter {
                field: RunField::IsHonorific,
                first: StepId::Politeness,
                second: StepId::CheckTool,
            }
        );
    }

    #[test]
    fn missing_start_and_unreachable_steps_are_rejected() {
        let missing = FlowGraph::new(StepId::Politeness, [(StepId::NoTool, END)])
            .expect_err("no start definition");
        assert_eq!(missing, GraphError::MissingStart { start: StepId::Politeness });

        let unreachable = FlowGraph::new(
            StepId::NoTool,
            [(StepId::NoTool, END), (StepId::Agent, END)],
        )
        .expect_err("agent is orphaned");
        assert_eq!(unreachable, GraphError::UnreachableStep { step: StepId::Agent });
    }
}
