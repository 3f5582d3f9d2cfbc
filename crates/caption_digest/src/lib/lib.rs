pub mod aggregator;
pub mod chain;
pub mod chunker;
pub mod config;
mod error;
mod llm;
pub mod normalizer;
mod processor;
pub mod resolver;
pub mod retry;
#[cfg(test)]
mod stub_http;
pub mod tracing;
pub mod types;
pub mod yt;

pub use chain::CaptionProvider;
pub use error::{
    AcquisitionFailure, AcquisitionFailureKind, ChunkFailure, ConfigError, PartialFailure,
    PipelineError, SummarizationFailure, SummarizationFailureKind,
};
pub use llm::{backend, openai};
pub use llm::summarizer::{Summarizer, SummaryResponse};
pub use processor::{
    builder::DigestProcessorBuilder, DigestProcessor, IllegalTransition, PipelineStage,
    StageTracker,
};
