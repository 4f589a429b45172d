use async_trait::async_trait;
use paygate_core::{OracleError, RunField, ToolCatalog};

use crate::llm::LlmClient;

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, instruction: &str, subject: &str) -> Result<bool, OracleError>;
}

/// Binary classifier over an [`LlmClient`]; any reply not starting with `Y`
/// counts as a negative verdict.
pub struct LlmClassifier<'a, L: ?Sized> {
    llm: &'a L,
}

impl<'a, L> LlmClassifier<'a, L>
where
    L: LlmClient + ?Sized,
{
    pub fn new(llm: &'a L) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl<L> Classifier for LlmClassifier<'_, L>
where
    L: LlmClient + ?Sized,
{
    async fn classify(&self, instruction: &str, subject: &str) -> Result<bool, OracleError> {
        let response = self.llm.complete(&classification_prompt(instruction, subject)).await?;
        Ok(parse_verdict(&response))
    }
}

pub fn classification_prompt(instruction: &str, subject: &str) -> String {
    format!("[Instruction]\n{instruction}\n\n[User Input]\n{subject}")
}

pub fn parse_verdict(response: &str) -> bool {
    response.trim().to_uppercase().starts_with('Y')
}

pub fn instruction_for(field: RunField, catalog: &ToolCatalog) -> String {
    match field {
        RunField::IsHonorific => concat!(
            "Decide whether the user's utterance is written in the Korean formal/honorific register (존댓말). ",
            "Answer YES if it is honorific. Answer NO if it is casual speech (반말) or if it is unclear.\n",
            "Output only YES or NO and nothing else."
        )
        .to_string(),
        RunField::HasPaymentIntent => concat!(
            "Answer YES only if the user's utterance clearly expresses an intent to pay or settle a ",
            "specific amount (for example it names a number or a price). ",
            "Answer NO if it does not, or if the information is insufficient.\n",
            "Output only YES or NO and nothing else."
        )
        .to_string(),
        RunField::IsToolEligible => format!(
            "{}\n\n[Tools]\n{}",
            concat!(
                "Look at the available tools below and decide whether any of them can actually carry out ",
                "a purchase, order or payment of the specific item the user asks for. ",
                "Answer YES only when a tool's name or description reasonably indicates it can perform ",
                "that action, otherwise answer NO.\n",
                "Output only an uppercase YES or NO with no explanation."
            ),
            catalog.render_for_prompt()
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use paygate_core::{OracleError, RunField, ToolCatalog, ToolDescriptor};
    use serde_json::json;

    use super::{classification_prompt, instruction_for, parse_verdict, Classifier, LlmClassifier};
    use crate::llm::{AgentReply, LlmClient};

    struct EchoLlm {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
            self.prompts.lock().expect("lock").push(prompt.to_string());
            Ok(self.reply.clone())
        }

        async fn respond_or_call(
            &self,
            _prompt: &str,
            _tools: &ToolCatalog,
        ) -> Result<AgentReply, OracleError> {
            Ok(AgentReply::default())
        }
    }

    #[test]
    fn verdict_is_affirmative_only_for_leading_y() {
        assert!(parse_verdict("YES"));
        assert!(parse_verdict("  yes.\n"));
        assert!(parse_verdict("Y"));
        assert!(!parse_verdict("NO"));
        assert!(!parse_verdict("Maybe yes"));
        assert!(!parse_verdict(""));
        assert!(!parse_verdict("네"));
    }

    #[test]
    fn eligibility_instruction_lists_tools() {
        let catalog = ToolCatalog::new(vec![ToolDescriptor::new(
            "pay",
            "Pay for an order",
            json!({}),
        )])
        .expect("catalog");

        let instruction = instruction_for(RunField::IsToolEligible, &catalog);
        assert!(instruction.ends_with("[Tools]\n- pay: Pay for an order"));

        let empty = instruction_for(RunField::IsToolEligible, &ToolCatalog::default());
        assert!(empty.ends_with("(no tools)"));
    }

    #[tokio::test]
    async fn classifier_sends_combined_prompt() {
        let llm = EchoLlm { reply: "yes".to_string(), prompts: Mutex::new(Vec::new()) };
        let classifier = LlmClassifier::new(&llm);

        let verdict = classifier.classify("Is it formal?", "결제할게요").await.expect("verdict");

        assert!(verdict);
        let prompts = llm.prompts.lock().expect("lock");
        assert_eq!(prompts.as_slice(), [classification_prompt("Is it formal?", "결제할게요")]);
        assert!(prompts[0].starts_with("[Instruction]\nIs it formal?"));
        assert!(prompts[0].ends_with("[User Input]\n결제할게요"));
    }
}
