//! PaLM 2 adapter: Vertex AI chat for generation, embedding distance for ranking.

use std::sync::Arc;

use palm2_llm::provider::{ChatService, ChatSession, ChatTurn, EmbeddingService};
use tokio::sync::OnceCell;

use crate::config::AdapterConfig;
use crate::distance::DistanceScorer;
use crate::error::AdapterError;
use crate::plugin::LanguageModel;
use crate::services::{ServiceFactory, VertexServices};
use crate::types::{AssembledPrompt, Persona, Turn};

/// Greedy decoding keeps ranking scores reproducible.
const TEMPERATURE: f32 = 0.0;

pub struct Palm2Adapter {
    config: AdapterConfig,
    services: Arc<dyn ServiceFactory>,
    scorer: Box<dyn DistanceScorer>,
    model: OnceCell<Arc<dyn ChatService>>,
    embedding: OnceCell<Arc<dyn EmbeddingService>>,
}

impl Palm2Adapter {
    /// Build and warm up: both service handles exist when this returns.
    pub async fn new(config: AdapterConfig, services: Arc<dyn ServiceFactory>) -> Result<Self, AdapterError> {
        let adapter = Self::lazy(config, services);
        adapter.warmup().await?;
        Ok(adapter)
    }

    /// Build against Vertex AI using the credentials at `config.key_path`.
    pub async fn from_config(config: AdapterConfig) -> Result<Self, AdapterError> {
        let services = Arc::new(VertexServices::from_config(&config)?);
        Self::new(config, services).await
    }

    /// Build without warming up; handles are created on first use.
    pub fn lazy(config: AdapterConfig, services: Arc<dyn ServiceFactory>) -> Self {
        let scorer = Box::new(config.distance_metric);
        Self {
            config,
            services,
            scorer,
            model: OnceCell::new(),
            embedding: OnceCell::new(),
        }
    }

    /// Replace the configured distance metric.
    pub fn with_scorer(mut self, scorer: impl DistanceScorer + 'static) -> Self {
        self.scorer = Box::new(scorer);
        self
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Chat handle, created on first call and shared afterwards.
    pub async fn model(&self) -> Result<&Arc<dyn ChatService>, AdapterError> {
        let model = self.model
            .get_or_try_init(|| async { self.services.chat_model() })
            .await?;
        Ok(model)
    }

    /// Embedding handle, created on first call and shared afterwards.
    pub async fn embedding(&self) -> Result<&Arc<dyn EmbeddingService>, AdapterError> {
        let embedding = self.embedding
            .get_or_try_init(|| async { self.services.embedding_model() })
            .await?;
        Ok(embedding)
    }

    pub async fn warmup(&self) -> Result<(), AdapterError> {
        let model = self.model().await?;
        let embedding = self.embedding().await?;
        tracing::info!(model = model.name(), embedding = embedding.name(), "palm2 adapter ready");
        Ok(())
    }

    /// Embeds a freshly generated answer to `question` together with `answers`.
    ///
    /// Returns the generated answer's embedding first, then one embedding per
    /// answer in input order. Costs one chat call and one embedding call.
    /// Every vector must share the first vector's dimension.
    pub async fn embeddings(
        &self,
        question: &str,
        answers: &[String],
        persona: &Persona,
    ) -> Result<(Vec<f64>, Vec<Vec<f64>>), AdapterError> {
        let response = self.ask(question, &[], persona).await?;

        let mut texts = Vec::with_capacity(answers.len() + 1);
        texts.push(response);
        texts.extend(answers.iter().cloned());
        let expected = texts.len();

        let vectors = self.embedding().await?.embed(texts).await?;
        if vectors.len() != expected {
            return Err(AdapterError::EmbeddingCountMismatch { expected, got: vectors.len() });
        }

        let mut values = vectors.into_iter().map(|e| e.values);
        let question_embedding = values.next()
            .ok_or(AdapterError::EmbeddingCountMismatch { expected, got: 0 })?;
        let answers_embeddings: Vec<Vec<f64>> = values.collect();

        let dimension = question_embedding.len();
        if let Some(bad) = answers_embeddings.iter().find(|v| v.len() != dimension) {
            return Err(AdapterError::EmbeddingDimensionMismatch { expected: dimension, got: bad.len() });
        }
        Ok((question_embedding, answers_embeddings))
    }
}

/// Positions sorted by ascending score; equal scores keep input order.
pub fn rank_by_score(scores: &[f64]) -> Vec<usize> {
    let mut ranked: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked.into_iter().map(|(i, _)| i).collect()
}

#[async_trait::async_trait]
impl LanguageModel for Palm2Adapter {
    fn llm_model_name(&self) -> &str {
        &self.config.model
    }

    fn tokenizer_model_name(&self) -> &str {
        ""
    }

    fn system_prompt(&self) -> &str {
        &self.config.role
    }

    // PaLM 2 exposes no tokenizer.
    fn tokenize(&self, _prompt: &str) -> Option<Vec<u32>> {
        None
    }

    fn assemble_prompt(
        &self,
        message: &str,
        history: &[Turn],
        persona: &Persona,
    ) -> Result<AssembledPrompt, AdapterError> {
        let system_prompt = persona.description.clone()
            .unwrap_or_else(|| self.system_prompt().to_owned());

        let depth = match self.config.context_depth {
            d if d <= 0 => 0,
            d => usize::try_from(d).unwrap_or(usize::MAX),
        };
        let start = history.len().saturating_sub(depth);
        let chat_history: Vec<ChatTurn> = history[start..].iter()
            .map(|t| ChatTurn::new(self.convert_role(t.role), t.content.clone()))
            .collect();

        tracing::debug!(turns = chat_history.len(), dropped = start, "assembled prompt");
        Ok(AssembledPrompt { system_prompt, chat_history, message: message.to_owned() })
    }

    async fn call_model(&self, prompt: AssembledPrompt) -> Result<String, AdapterError> {
        let model = self.model().await?;
        let mut chat = ChatSession::start(
            &**model,
            prompt.system_prompt,
            prompt.chat_history,
            self.config.max_tokens,
            TEMPERATURE,
        );
        let response = chat.send_message(&prompt.message).await?;
        Ok(response.text)
    }

    async fn score(
        &self,
        prompt: &str,
        targets: &[String],
        persona: &Persona,
    ) -> Result<Vec<f64>, AdapterError> {
        let (question_embedding, answers_embeddings) =
            self.embeddings(prompt, targets, persona).await?;
        Ok(self.scorer.distances(&question_embedding, &answers_embeddings))
    }

    async fn get_sorted_answer_indexes(
        &self,
        question: &str,
        answers: &[String],
        persona: &Persona,
    ) -> Result<Vec<usize>, AdapterError> {
        if answers.is_empty() {
            return Ok(vec![]);
        }
        let scores = self.score(question, answers, persona).await?;
        tracing::debug!(answers = answers.len(), ?scores, "scored answers");
        Ok(rank_by_score(&scores))
    }
}
