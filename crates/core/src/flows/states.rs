use serde::{Deserialize, Serialize};

use crate::flows::engine::GraphError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    Politeness,
    ClassifyPayAmount,
    CheckTool,
    PoliteWarning,
    AskProduct,
    NoTool,
    Agent,
}

impl StepId {
    pub const ALL: [StepId; 7] = [
        Self::Politeness,
        Self::ClassifyPayAmount,
        Self::CheckTool,
        Self::PoliteWarning,
        Self::AskProduct,
        Self::NoTool,
        Self::Agent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Politeness => "politeness",
            Self::ClassifyPayAmount => "classify_pay_amount",
            Self::CheckTool => "check_tool",
            Self::PoliteWarning => "polite_warning",
            Self::AskProduct => "ask_product",
            Self::NoTool => "no_tool",
            Self::Agent => "agent",
        }
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state booleans of [`RunState`], each owned by exactly one decision step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunField {
    IsHonorific,
    HasPaymentIntent,
    IsToolEligible,
}

impl RunField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IsHonorific => "is_honorific",
            Self::HasPaymentIntent => "has_payment_intent",
            Self::IsToolEligible => "is_tool_eligible",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    input: String,
    pub is_honorific: Option<bool>,
    pub has_payment_intent: Option<bool>,
    pub is_tool_eligible: Option<bool>,
    output: Option<String>,
}

impl RunState {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            is_honorific: None,
            has_payment_intent: None,
            is_tool_eligible: None,
            output: None,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn get(&self, field: RunField) -> Option<bool> {
        match field {
            RunField::IsHonorific => self.is_honorific,
            RunField::HasPaymentIntent => self.has_payment_intent,
            RunField::IsToolEligible => self.is_tool_eligible,
        }
    }

    pub fn record(&mut self, field: RunField, value: bool) -> Result<(), GraphError> {
        let slot = match field {
            RunField::IsHonorific => &mut self.is_honorific,
            RunField::HasPaymentIntent => &mut self.has_payment_intent,
            RunField::IsToolEligible => &mut self.is_tool_eligible,
        };
        if slot.is_some() {
            return Err(GraphError::FieldAlreadySet { field });
        }
        *slot = Some(value);
        Ok(())
    }

    pub fn finish(&mut self, output: impl Into<String>) -> Result<(), GraphError> {
        if self.output.is_some() {
            return Err(GraphError::OutputAlreadySet);
        }
        self.output = Some(output.into());
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowOutcome {
    pub run_id: String,
    pub terminal: StepId,
    pub output: String,
    pub state: RunState,
}

#[cfg(test)]
mod tests {
    use super::{RunField, RunState, StepId};
    use crate::flows::engine::GraphError;

    #[test]
    fn fields_are_write_once() {
        let mut state = RunState::new("결제할게요");
        assert_eq!(state.get(RunField::IsHonorific), None);

        state.record(RunField::IsHonorific, true).expect("first write");
        let error = state.record(RunField::IsHonorific, false).expect_err("second write");

        assert_eq!(error, GraphError::FieldAlreadySet { field: RunField::IsHonorific });
        assert_eq!(state.get(RunField::IsHonorific), Some(true));
    }

    #[test]
    fn output_is_never_overwritten() {
        let mut state = RunState::new("사줘");
        state.finish("first").expect("first finish");

        assert_eq!(state.finish("second"), Err(GraphError::OutputAlreadySet));
        assert_eq!(state.output(), Some("first"));
        assert_eq!(state.input(), "사줘");
    }

    #[test]
    fn step_names_are_snake_case() {
        let names: Vec<_> = StepId::ALL.iter().map(StepId::as_str).collect();
        assert_eq!(
            names,
            vec![
                "politeness",
                "classify_pay_amount",
                "check_tool",
                "polite_warning",
                "ask_product",
                "no_tool",
                "agent"
            ]
        );
        assert_eq!(
            serde_json::to_string(&StepId::ClassifyPayAmount).expect("serialize"),
            "\"classify_pay_amount\""
        );
    }
}
