pub mod grok;
pub mod openai;
