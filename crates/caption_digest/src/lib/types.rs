use std::{fmt, ops::Deref, path::PathBuf, str::FromStr, time::Duration};

use crate::error::{ConfigError, PartialFailure, PipelineError};

/// The platform identifier extracted from a video reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalId(String);

impl CanonicalId {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl Deref for CanonicalId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, non-empty list of language tags, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePreference(Vec<String>);

impl LanguagePreference {
    pub fn new<I, S>(languages: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let languages = languages
            .into_iter()
            .map(Into::into)
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>();

        if languages.is_empty() {
            return Err(ConfigError::EmptyLanguages);
        }
        Ok(Self(languages))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn primary(&self) -> &str {
        &self.0[0]
    }
}

impl Default for LanguagePreference {
    fn default() -> Self {
        Self(vec!["ja".into(), "en".into()])
    }
}

impl FromStr for LanguagePreference {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.split(','))
    }
}

/// Data-less tag naming a caption source, used in results and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptionSourceKind {
    EmbeddedTranscript,
    SubtitleExtraction,
    PlatformCaptions,
    AudioTranscription,
}

impl CaptionSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmbeddedTranscript => "embedded-transcript",
            Self::SubtitleExtraction => "subtitle-extraction",
            Self::PlatformCaptions => "platform-captions",
            Self::AudioTranscription => "audio-transcription",
        }
    }
}

impl fmt::Display for CaptionSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptionSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "embedded-transcript" | "embedded" => Ok(Self::EmbeddedTranscript),
            "subtitle-extraction" | "yt-dlp" | "ytdlp" => Ok(Self::SubtitleExtraction),
            "platform-captions" | "platform" => Ok(Self::PlatformCaptions),
            "audio-transcription" | "audio" => Ok(Self::AudioTranscription),
            other => Err(format!("unknown caption source: {other}")),
        }
    }
}

/// How to run `yt-dlp`.
///
/// Audio for transcription is extracted as 48 kbit/s mp3, which keeps about
/// 70 minutes of speech under the 25 MiB transcription upload limit. Longer
/// videos fail the audio source with `Disabled` instead of being uploaded.
#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    pub binary: PathBuf,
    pub cookies_path: Option<PathBuf>,
    pub timeout: Duration,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            cookies_path: None,
            timeout: Duration::from_secs(120),
        }
    }
}

/// A caption acquisition strategy together with the data it needs.
#[derive(Debug, Clone)]
pub enum CaptionSource {
    EmbeddedTranscript,
    SubtitleExtraction {
        ytdlp: YtDlpConfig,
    },
    PlatformCaptions {
        api_key: String,
        base_url: String,
    },
    AudioTranscription {
        ytdlp: YtDlpConfig,
        api_key: String,
        base_url: String,
        model: String,
    },
}

impl CaptionSource {
    pub fn kind(&self) -> CaptionSourceKind {
        match self {
            Self::EmbeddedTranscript => CaptionSourceKind::EmbeddedTranscript,
            Self::SubtitleExtraction { .. } => CaptionSourceKind::SubtitleExtraction,
            Self::PlatformCaptions { .. } => CaptionSourceKind::PlatformCaptions,
            Self::AudioTranscription { .. } => CaptionSourceKind::AudioTranscription,
        }
    }
}

/// Captions produced by the first source that succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionResult {
    pub text: String,
    pub language: String,
    pub source: CaptionSourceKind,
}

/// A contiguous slice of the caption text. `offset` counts characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub offset: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryFragment {
    pub chunk_index: usize,
    pub text: String,
}

/// The outcome of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct Digest {
    pub video_id: CanonicalId,
    pub language: String,
    pub source: CaptionSourceKind,
    pub summary: String,
    pub chunk_count: usize,
    pub partial_failure: Option<PartialFailure>,
}

impl Digest {
    pub fn is_partial(&self) -> bool {
        self.partial_failure.is_some()
    }

    /// Returns the summary only if every chunk was summarized.
    pub fn into_strict(self) -> Result<String, PipelineError> {
        match self.partial_failure {
            Some(partial) => Err(PipelineError::PartialSummarizationFailure(partial)),
            None => Ok(self.summary),
        }
    }
}
