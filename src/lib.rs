pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod llm;
pub mod pipeline;
pub mod summarizer;
pub mod synthesizer;
pub mod validator;
