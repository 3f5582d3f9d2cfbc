use std::{fmt, time::Duration};

use crate::types::CaptionSourceKind;

/// Why a caption source could not produce captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquisitionFailureKind {
    NotFound,
    Disabled,
    Unauthorized,
    QuotaExceeded,
    TransientNetworkError,
    MalformedResponse,
}

impl AcquisitionFailureKind {
    /// Lower is more actionable. Used to pick the failure surfaced once every
    /// source has been exhausted.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Unauthorized => 0,
            Self::QuotaExceeded => 1,
            Self::Disabled => 2,
            Self::NotFound => 3,
            Self::TransientNetworkError => 4,
            Self::MalformedResponse => 5,
        }
    }

    /// A failure tied to the source's credentials rather than to the
    /// requested language; retrying the same source with another language
    /// will not help.
    pub fn is_source_wide(self) -> bool {
        matches!(self, Self::Unauthorized | Self::QuotaExceeded)
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, Self::TransientNetworkError)
    }
}

impl fmt::Display for AcquisitionFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::Disabled => "disabled",
            Self::Unauthorized => "unauthorized",
            Self::QuotaExceeded => "quota exceeded",
            Self::TransientNetworkError => "transient network error",
            Self::MalformedResponse => "malformed response",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{origin} captions {kind}: {detail}")]
pub struct AcquisitionFailure {
    pub origin: CaptionSourceKind,
    pub kind: AcquisitionFailureKind,
    pub detail: String,
}

impl AcquisitionFailure {
    pub fn new(
        origin: CaptionSourceKind,
        kind: AcquisitionFailureKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            origin,
            kind,
            detail: detail.into(),
        }
    }

    pub fn not_found(origin: CaptionSourceKind, detail: impl Into<String>) -> Self {
        Self::new(origin, AcquisitionFailureKind::NotFound, detail)
    }

    pub fn transient(origin: CaptionSourceKind, detail: impl fmt::Display) -> Self {
        Self::new(
            origin,
            AcquisitionFailureKind::TransientNetworkError,
            detail.to_string(),
        )
    }

    /// Wraps anything outside the taxonomy, keeping the original message.
    pub fn malformed(origin: CaptionSourceKind, detail: impl fmt::Display) -> Self {
        Self::new(
            origin,
            AcquisitionFailureKind::MalformedResponse,
            detail.to_string(),
        )
    }

    /// Picks the most actionable failure, keeping the earliest on ties.
    pub fn most_specific(failures: impl IntoIterator<Item = Self>) -> Option<Self> {
        failures.into_iter().min_by_key(|f| f.kind.precedence())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummarizationFailureKind {
    Unauthorized,
    QuotaExceeded,
    Transient,
    MalformedResponse,
}

impl SummarizationFailureKind {
    pub fn precedence(self) -> u8 {
        match self {
            Self::Unauthorized => 0,
            Self::QuotaExceeded => 1,
            Self::Transient => 2,
            Self::MalformedResponse => 3,
        }
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Configuration-level failures that will not improve within a run.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Unauthorized | Self::QuotaExceeded)
    }
}

impl fmt::Display for SummarizationFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unauthorized => "unauthorized",
            Self::QuotaExceeded => "quota exceeded",
            Self::Transient => "transient failure",
            Self::MalformedResponse => "malformed response",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("summarizer {kind}: {detail}")]
pub struct SummarizationFailure {
    pub kind: SummarizationFailureKind,
    pub detail: String,
}

impl SummarizationFailure {
    pub fn new(kind: SummarizationFailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn transient(detail: impl fmt::Display) -> Self {
        Self::new(SummarizationFailureKind::Transient, detail.to_string())
    }

    pub fn malformed(detail: impl fmt::Display) -> Self {
        Self::new(SummarizationFailureKind::MalformedResponse, detail.to_string())
    }

    pub fn most_specific(failures: impl IntoIterator<Item = Self>) -> Option<Self> {
        failures.into_iter().min_by_key(|f| f.kind.precedence())
    }
}

/// One chunk that could not be summarized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub failure: SummarizationFailure,
}

/// Annotation attached to a summary built from only some of the chunks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} of {total_chunks} chunks failed to summarize ({})", .failed.len(), describe(.failed))]
pub struct PartialFailure {
    pub total_chunks: usize,
    pub failed: Vec<ChunkFailure>,
}

impl PartialFailure {
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failed.iter().map(|f| f.chunk_index).collect()
    }
}

fn describe(failed: &[ChunkFailure]) -> String {
    failed
        .iter()
        .map(|f| format!("chunk {}: {}", f.chunk_index, f.failure.kind))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid video reference: {0}")]
    InvalidReference(String),
    #[error("No captions found: {0}")]
    CaptionsNotFound(AcquisitionFailure),
    #[error("Captions are disabled: {0}")]
    CaptionsDisabled(AcquisitionFailure),
    #[error("Caption source rejected credentials: {0}")]
    SourceUnauthorized(AcquisitionFailure),
    #[error("Caption source quota exceeded: {0}")]
    SourceQuotaExceeded(AcquisitionFailure),
    #[error("Caption source unreachable: {0}")]
    SourceTransient(AcquisitionFailure),
    #[error("Caption source returned an unexpected response: {0}")]
    SourceMalformed(AcquisitionFailure),
    #[error("Summarizer rejected credentials: {0}")]
    SummarizerUnauthorized(SummarizationFailure),
    #[error("Summarizer quota exceeded: {0}")]
    SummarizerQuotaExceeded(SummarizationFailure),
    #[error("Summarizer unreachable: {0}")]
    SummarizerTransient(SummarizationFailure),
    #[error("Summarizer returned an unexpected response: {0}")]
    SummarizerMalformed(SummarizationFailure),
    #[error("Summary is incomplete: {0}")]
    PartialSummarizationFailure(PartialFailure),
    #[error("Pipeline timed out after {0:?}")]
    PipelineTimeout(Duration),
}

impl PipelineError {
    /// Stable code for presentation layers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidReference(_) => "invalid_reference",
            Self::CaptionsNotFound(_) => "captions_not_found",
            Self::CaptionsDisabled(_) => "captions_disabled",
            Self::SourceUnauthorized(_) => "source_unauthorized",
            Self::SourceQuotaExceeded(_) => "source_quota_exceeded",
            Self::SourceTransient(_) => "source_transient",
            Self::SourceMalformed(_) => "source_malformed",
            Self::SummarizerUnauthorized(_) => "summarizer_unauthorized",
            Self::SummarizerQuotaExceeded(_) => "summarizer_quota_exceeded",
            Self::SummarizerTransient(_) => "summarizer_transient",
            Self::SummarizerMalformed(_) => "summarizer_malformed",
            Self::PartialSummarizationFailure(_) => "partial_summarization_failure",
            Self::PipelineTimeout(_) => "pipeline_timeout",
        }
    }
}

impl From<AcquisitionFailure> for PipelineError {
    fn from(failure: AcquisitionFailure) -> Self {
        match failure.kind {
            AcquisitionFailureKind::NotFound => Self::CaptionsNotFound(failure),
            AcquisitionFailureKind::Disabled => Self::CaptionsDisabled(failure),
            AcquisitionFailureKind::Unauthorized => Self::SourceUnauthorized(failure),
            AcquisitionFailureKind::QuotaExceeded => Self::SourceQuotaExceeded(failure),
            AcquisitionFailureKind::TransientNetworkError => Self::SourceTransient(failure),
            AcquisitionFailureKind::MalformedResponse => Self::SourceMalformed(failure),
        }
    }
}

impl From<SummarizationFailure> for PipelineError {
    fn from(failure: SummarizationFailure) -> Self {
        match failure.kind {
            SummarizationFailureKind::Unauthorized => Self::SummarizerUnauthorized(failure),
            SummarizationFailureKind::QuotaExceeded => Self::SummarizerQuotaExceeded(failure),
            SummarizationFailureKind::Transient => Self::SummarizerTransient(failure),
            SummarizationFailureKind::MalformedResponse => Self::SummarizerMalformed(failure),
        }
    }
}

/// Rejected configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("language preference must contain at least one language")]
    EmptyLanguages,
    #[error("at least one caption source must be enabled")]
    NoSources,
    #[error("caption source {0} is listed more than once")]
    DuplicateSource(CaptionSourceKind),
    #[error("{0} must be at least 1")]
    Zero(&'static str),
}
