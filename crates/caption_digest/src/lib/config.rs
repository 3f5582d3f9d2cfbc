//! Immutable configuration handed to the pipeline at construction.

use std::{collections::HashSet, num::NonZeroUsize, time::Duration};

use crate::{
    error::ConfigError,
    types::{CaptionSource, LanguagePreference},
};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub languages: LanguagePreference,
    /// Caption sources in priority order.
    pub sources: Vec<CaptionSource>,
    pub max_chunk_chars: NonZeroUsize,
    pub concurrency: NonZeroUsize,
    pub timeout: Duration,
    /// Joined summaries longer than this get one extra condensation pass.
    pub resummarize_threshold: usize,
}

impl PipelineConfig {
    pub const DEFAULT_MAX_CHUNK_CHARS: usize = 12_000;
    pub const DEFAULT_CONCURRENCY: usize = 4;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
    pub const DEFAULT_RESUMMARIZE_THRESHOLD: usize = 4_000;

    pub fn new(
        languages: LanguagePreference,
        sources: Vec<CaptionSource>,
    ) -> Result<Self, ConfigError> {
        if sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        let mut seen = HashSet::new();
        if let Some(dup) = sources.iter().map(|s| s.kind()).find(|k| !seen.insert(*k)) {
            return Err(ConfigError::DuplicateSource(dup));
        }

        Ok(Self {
            languages,
            sources,
            max_chunk_chars: NonZeroUsize::new(Self::DEFAULT_MAX_CHUNK_CHARS)
                .ok_or(ConfigError::Zero("max_chunk_chars"))?,
            concurrency: NonZeroUsize::new(Self::DEFAULT_CONCURRENCY)
                .ok_or(ConfigError::Zero("concurrency"))?,
            timeout: Self::DEFAULT_TIMEOUT,
            resummarize_threshold: Self::DEFAULT_RESUMMARIZE_THRESHOLD,
        })
    }

    pub fn with_max_chunk_chars(mut self, max_chunk_chars: usize) -> Result<Self, ConfigError> {
        self.max_chunk_chars =
            NonZeroUsize::new(max_chunk_chars).ok_or(ConfigError::Zero("max_chunk_chars"))?;
        Ok(self)
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self, ConfigError> {
        self.concurrency = NonZeroUsize::new(concurrency).ok_or(ConfigError::Zero("concurrency"))?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_resummarize_threshold(mut self, threshold: usize) -> Self {
        self.resummarize_threshold = threshold;
        self
    }
}

/// Retry bound for transient backend failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Request dialect spoken by the summarization backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendDialect {
    /// OpenAI-compatible `/chat/completions`.
    ChatCompletions,
    /// Hosted text-generation inference (`inputs` + `parameters`).
    TextGeneration,
}

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub dialect: BackendDialect,
    pub max_output_tokens: u32,
    /// Chunk text beyond this many characters is cut before sending.
    pub max_input_chars: usize,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl SummarizerConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            api_key: api_key.into(),
            model: "gpt-4o-mini".into(),
            dialect: BackendDialect::ChatCompletions,
            max_output_tokens: 500,
            max_input_chars: 100_000,
            request_timeout: Duration::from_secs(60),
            retry: RetryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::YtDlpConfig;

    #[test]
    fn rejects_empty_and_duplicate_sources() {
        let langs = LanguagePreference::default();
        assert!(matches!(
            PipelineConfig::new(langs.clone(), vec![]),
            Err(ConfigError::NoSources)
        ));

        let dup = vec![
            CaptionSource::EmbeddedTranscript,
            CaptionSource::SubtitleExtraction {
                ytdlp: YtDlpConfig::default(),
            },
            CaptionSource::EmbeddedTranscript,
        ];
        assert!(matches!(
            PipelineConfig::new(langs, dup),
            Err(ConfigError::DuplicateSource(_))
        ));
    }

    #[test]
    fn zero_bounds_are_rejected() {
        let config =
            PipelineConfig::new(LanguagePreference::default(), vec![CaptionSource::EmbeddedTranscript])
                .unwrap();
        assert!(config.clone().with_max_chunk_chars(0).is_err());
        assert!(config.with_concurrency(0).is_err());
    }
}
