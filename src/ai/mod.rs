//! Generative-AI plumbing: prompt building, the HTTP client with its retry
//! policy, and best-effort parsing of the model's answer.

pub mod client;
pub mod parser;
pub mod prompt;
pub mod retry;

pub use client::{AiError, GeminiClient, GenerationConfig};
pub use parser::{parse_ai_response, AiInsights, ParseOutcome};
pub use retry::{retry, RetryPolicy};
