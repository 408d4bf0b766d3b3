//! Prompt rendering and answer generation

mod llm;
mod ollama;
mod openai;
mod prompt;

pub use llm::{LlmBackend, LlmBackends, LlmProvider, LlmResolver};
pub use ollama::OllamaLlm;
pub use openai::OpenAiLlm;
pub use prompt::PromptTemplate;
