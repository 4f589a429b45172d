//! Agent runtime: the asynchronous half of the purchase flow.
//!
//! This crate walks the flow graph defined in `paygate-core`, consulting the
//! oracle at each decision step and delegating to tool providers at the end:
//! 1. **Classification** (`classifier`) - politeness, payment intent and tool
//!    eligibility as YES/NO verdicts
//! 2. **Oracle access** (`llm`, `openai`) - binary completions plus the joint
//!    "answer or call a tool" request
//! 3. **Action delegation** (`tools`) - catalog resolution and remote calls
//! 4. **Orchestration** (`runtime`) - one scoped tool session per run
//!
//! # Key Types
//!
//! - `AgentRuntime` - runs one utterance through the graph
//! - `LlmClient` - pluggable oracle backend
//! - `SessionFactory` / `ToolSession` - per-run tool provider connection

pub mod classifier;
pub mod llm;
pub mod openai;
pub mod runtime;
pub mod tools;

pub use classifier::{Classifier, LlmClassifier};
pub use llm::{AgentDecision, AgentReply, LlmClient, ProposedCall};
pub use openai::OpenAiCompatibleClient;
pub use runtime::AgentRuntime;
pub use tools::{ActionInvoker, SessionFactory, ToolOutput, ToolSession};
