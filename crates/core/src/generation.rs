use crate::error::QaError;
use crate::models::{RetrievedChunk, TokenUsage};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

const PROMPT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// A hosted text generation model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<Completion, QaError>;
}

/// Puts every context chunk into a single prompt ahead of the question.
pub fn build_prompt(context: &[RetrievedChunk], question: &str) -> String {
    let context = context
        .iter()
        .map(|retrieved| retrieved.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{PROMPT_PREAMBLE}\n\n{context}\n\nQuestion: {question}\nHelpful Answer:")
}

pub struct AnswerGenerator {
    model: Arc<dyn LanguageModel>,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn generate(
        &self,
        context: &[RetrievedChunk],
        question: &str,
    ) -> Result<Completion, QaError> {
        let prompt = build_prompt(context, question);
        debug!(
            model = self.model.name(),
            context_chunks = context.len(),
            prompt_chars = prompt.len(),
            "requesting answer"
        );

        let completion = self.model.complete(&prompt).await?;
        let text = completion.text.trim();
        if text.is_empty() {
            return Err(QaError::Generation(format!(
                "{} returned an empty answer",
                self.model.name()
            )));
        }

        if let Some(usage) = completion.usage {
            info!(
                model = self.model.name(),
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "generation usage"
            );
        }

        Ok(Completion {
            text: text.to_string(),
            usage: completion.usage,
        })
    }
}
