pub mod backend;
pub mod openai;
pub mod summarizer;
