// LLM abstraction layer

pub mod provider;
pub mod openai;
pub mod anthropic;
pub mod replicate;
pub mod openrouter;
pub mod groq;
pub mod text_agent;

pub use provider::*;
pub use text_agent::TextAgent;
