//! Host plugin contract every LLM adapter implements.
//!
//! The host drives adapters only through this trait: it calls
//! [`LanguageModel::ask`] for generation and
//! [`LanguageModel::get_sorted_answer_indexes`] to rank candidate answers
//! coming from other models.

use palm2_llm::provider::Author;

use crate::error::AdapterError;
use crate::types::{AssembledPrompt, Persona, Turn, TurnRole};

#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model reported to the host.
    fn llm_model_name(&self) -> &str;

    /// Tokenizer backing [`tokenize`](Self::tokenize); empty when there is none.
    fn tokenizer_model_name(&self) -> &str;

    /// Default system prompt.
    fn system_prompt(&self) -> &str;

    fn tokenize(&self, prompt: &str) -> Option<Vec<u32>>;

    fn assemble_prompt(
        &self,
        message: &str,
        history: &[Turn],
        persona: &Persona,
    ) -> Result<AssembledPrompt, AdapterError>;

    async fn call_model(&self, prompt: AssembledPrompt) -> Result<String, AdapterError>;

    /// One score per target, lower is better.
    async fn score(
        &self,
        prompt: &str,
        targets: &[String],
        persona: &Persona,
    ) -> Result<Vec<f64>, AdapterError>;

    /// Positions of `answers`, best first.
    async fn get_sorted_answer_indexes(
        &self,
        question: &str,
        answers: &[String],
        persona: &Persona,
    ) -> Result<Vec<usize>, AdapterError>;

    /// Generate a reply to `message` given the preceding conversation.
    async fn ask(
        &self,
        message: &str,
        history: &[Turn],
        persona: &Persona,
    ) -> Result<String, AdapterError> {
        let prompt = self.assemble_prompt(message, history, persona)?;
        self.call_model(prompt).await
    }

    /// Host role → vendor author.
    fn convert_role(&self, role: TurnRole) -> Author {
        match role {
            TurnRole::User => Author::User,
            TurnRole::Llm => Author::Bot,
        }
    }
}
