pub mod analyzer;
pub mod llm;
pub mod parser;
pub mod prompts;

pub use analyzer::{SentimentAnalyzer, SentimentResult};
pub use llm::{ChatCompletionsBackend, CompletionBackend};
