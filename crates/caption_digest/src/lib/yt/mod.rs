pub mod platform;
pub mod timedtext;
pub mod ytdlp;

use std::path::Path;

use reqwest::StatusCode;

use crate::{
    chain::CaptionProvider,
    config::RetryConfig,
    error::{AcquisitionFailure, AcquisitionFailureKind},
    llm::openai::{OpenAIClient, OpenAIError},
    normalizer::collapse_whitespace,
    retry,
    types::{CanonicalId, CaptionResult, CaptionSource, CaptionSourceKind, YtDlpConfig},
};

use self::ytdlp::YtDlp;

/// The production caption provider: every [`CaptionSource`] variant is
/// dispatched from the single `match` in [`CaptionProvider::attempt`].
///
/// Every HTTP call a source makes is retried on transient network errors
/// according to `retry`. yt-dlp invocations are not.
#[derive(Debug, Clone)]
pub struct YouTubeCaptions {
    http: reqwest::Client,
    timedtext_base_url: String,
    retry: RetryConfig,
}

impl Default for YouTubeCaptions {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl YouTubeCaptions {
    pub const TIMEDTEXT_BASE_URL: &str = "https://www.youtube.com/api/timedtext";

    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            timedtext_base_url: Self::TIMEDTEXT_BASE_URL.into(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_timedtext_base_url(mut self, url: impl Into<String>) -> Self {
        self.timedtext_base_url = url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[tracing::instrument(skip(self, ytdlp, api_key, base_url))]
    async fn transcribe_audio(
        &self,
        ytdlp: &YtDlpConfig,
        api_key: &str,
        base_url: &str,
        model: &str,
        id: &CanonicalId,
        language: &str,
    ) -> Result<CaptionResult, AcquisitionFailure> {
        const ORIGIN: CaptionSourceKind = CaptionSourceKind::AudioTranscription;

        // removed when this attempt returns
        let scratch = tempfile::tempdir()
            .inspect_err(|e| tracing::error!(error = %e, "Failed to create scratch directory"))
            .map_err(|e| AcquisitionFailure::malformed(ORIGIN, e))?;

        let audio_path = YtDlp::new(ytdlp)
            .download_audio(id, scratch.path())
            .await
            .map_err(|mut failure| {
                failure.origin = ORIGIN;
                failure
            })?;

        self.transcribe_file(&audio_path, api_key, base_url, model, language)
            .await
    }

    /// Uploads one audio file for transcription, retrying transient failures.
    async fn transcribe_file(
        &self,
        audio_path: &Path,
        api_key: &str,
        base_url: &str,
        model: &str,
        language: &str,
    ) -> Result<CaptionResult, AcquisitionFailure> {
        const ORIGIN: CaptionSourceKind = CaptionSourceKind::AudioTranscription;

        let size = tokio::fs::metadata(audio_path)
            .await
            .map_err(|e| AcquisitionFailure::malformed(ORIGIN, e))?
            .len();
        if size > OpenAIClient::MAX_UPLOAD_BYTES {
            tracing::warn!(
                size,
                limit = OpenAIClient::MAX_UPLOAD_BYTES,
                "Audio is too large to transcribe"
            );
            return Err(too_large(format!(
                "audio is {size} bytes, over the {} byte upload limit",
                OpenAIClient::MAX_UPLOAD_BYTES
            )));
        }

        let client = OpenAIClient::with_client(self.http.clone(), api_key).with_base_url(base_url);
        let client = &client;
        let transcript = retry::with_backoff(&self.retry, |_| async move {
            client
                .send_transcribe_request(audio_path, model, Some(language))
                .await
                .map_err(openai_to_acquisition_failure)
        })
        .await?;

        tracing::info!(
            duration_secs = transcript.duration,
            detected_language = transcript.language.as_deref().unwrap_or("unknown"),
            segments = transcript.segments.as_ref().map_or(0, Vec::len),
            "Audio transcribed"
        );

        let text = collapse_whitespace(&transcript.text);
        if text.is_empty() {
            return Err(AcquisitionFailure::not_found(ORIGIN, "transcription was empty"));
        }

        Ok(CaptionResult {
            text,
            language: language.to_string(),
            source: ORIGIN,
        })
    }
}

impl CaptionProvider for YouTubeCaptions {
    async fn attempt(
        &self,
        source: &CaptionSource,
        id: &CanonicalId,
        language: &str,
    ) -> Result<CaptionResult, AcquisitionFailure> {
        match source {
            CaptionSource::EmbeddedTranscript => {
                timedtext::fetch_transcript(
                    &self.http,
                    &self.timedtext_base_url,
                    &self.retry,
                    id,
                    language,
                )
                .await
            }
            CaptionSource::SubtitleExtraction { ytdlp } => {
                YtDlp::new(ytdlp).fetch_subtitles(id, language).await
            }
            CaptionSource::PlatformCaptions { api_key, base_url } => {
                platform::PlatformCaptions::new(&self.http, base_url, api_key, &self.retry)
                    .fetch(id, language)
                    .await
            }
            CaptionSource::AudioTranscription {
                ytdlp,
                api_key,
                base_url,
                model,
            } => {
                self.transcribe_audio(ytdlp, api_key, base_url, model, id, language)
                    .await
            }
        }
    }
}

/// Maps an HTTP status from a caption endpoint into the failure taxonomy.
/// Endpoint-specific meanings (e.g. 400 as a bad key) are handled by callers.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> AcquisitionFailureKind {
    match status.as_u16() {
        401 => AcquisitionFailureKind::Unauthorized,
        403 if mentions_quota(body) => AcquisitionFailureKind::QuotaExceeded,
        403 => AcquisitionFailureKind::Unauthorized,
        404 | 410 => AcquisitionFailureKind::NotFound,
        429 => AcquisitionFailureKind::QuotaExceeded,
        500..=599 | 408 => AcquisitionFailureKind::TransientNetworkError,
        _ => AcquisitionFailureKind::MalformedResponse,
    }
}

pub(crate) fn mentions_quota(body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    body.contains("quota") || body.contains("limitexceeded")
}

/// Maps a `reqwest` transport error: connection problems and timeouts are
/// transient, anything else (decoding, redirects, ...) is malformed.
pub(crate) fn transport_failure(origin: CaptionSourceKind, e: reqwest::Error) -> AcquisitionFailure {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        AcquisitionFailure::transient(origin, e)
    } else {
        AcquisitionFailure::malformed(origin, e)
    }
}

/// The audio cannot be sent in one upload. Reported as `Disabled`: no retry
/// or other language will make this source work for the video.
fn too_large(detail: impl Into<String>) -> AcquisitionFailure {
    AcquisitionFailure::new(
        CaptionSourceKind::AudioTranscription,
        AcquisitionFailureKind::Disabled,
        detail,
    )
}

fn openai_to_acquisition_failure(e: OpenAIError) -> AcquisitionFailure {
    const ORIGIN: CaptionSourceKind = CaptionSourceKind::AudioTranscription;
    match e {
        OpenAIError::Request(e) => transport_failure(ORIGIN, e),
        OpenAIError::Api { status: 413, message } => too_large(message),
        OpenAIError::Api { status, message } => {
            let kind = StatusCode::from_u16(status)
                .map(|s| classify_status(s, &message))
                .unwrap_or(AcquisitionFailureKind::MalformedResponse);
            AcquisitionFailure::new(ORIGIN, kind, message)
        }
        other => AcquisitionFailure::malformed(ORIGIN, other),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{resolver::resolve, stub_http::StubServer};

    const VERBOSE_JSON: &str = r#"{
        "task": "transcribe",
        "language": "japanese",
        "duration": 3.2,
        "text": " こんにちは   世界 ",
        "segments": [{"id": 0, "start": 0.0, "end": 3.2, "text": "こんにちは世界"}]
    }"#;

    fn captions() -> YouTubeCaptions {
        YouTubeCaptions::default().with_retry(RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        })
    }

    #[tokio::test]
    async fn embedded_transcript_goes_through_the_configured_endpoint() {
        let server = StubServer::start(&[
            (500, ""),
            (200, r#"{"events": [{"segs": [{"utf8": "こんにちは"}]}]}"#),
        ])
        .await;
        let provider = captions().with_timedtext_base_url(server.url("/api/timedtext"));
        let id = resolve("https://www.youtube.com/watch?v=abc123").unwrap();

        let result = provider
            .attempt(&CaptionSource::EmbeddedTranscript, &id, "ja")
            .await
            .unwrap();

        assert_eq!(result.text, "こんにちは");
        assert_eq!(result.language, "ja");
        assert_eq!(server.hits(), 2);
    }

    #[tokio::test]
    async fn transcription_upload_is_retried() {
        let server = StubServer::start(&[(503, "upstream busy"), (200, VERBOSE_JSON)]).await;
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("abc123.mp3");
        std::fs::write(&audio, b"ID3 not really audio").unwrap();

        let result = captions()
            .transcribe_file(&audio, "sk-test", &server.base_url, "whisper-1", "ja-JP")
            .await
            .unwrap();

        assert_eq!(result.text, "こんにちは 世界");
        assert_eq!(result.language, "ja-JP");
        assert_eq!(result.source, CaptionSourceKind::AudioTranscription);

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].uri, "/audio/transcriptions");
        assert!(requests[1].body.contains("verbose_json"));
        assert!(requests[1].body.contains("whisper-1"));
    }

    #[tokio::test]
    async fn oversized_upload_disables_the_source() {
        let server = StubServer::start(&[(413, "Maximum content size limit exceeded")]).await;
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("abc123.mp3");
        std::fs::write(&audio, b"ID3").unwrap();

        let failure = captions()
            .transcribe_file(&audio, "sk-test", &server.base_url, "whisper-1", "ja")
            .await
            .unwrap_err();

        assert_eq!(failure.kind, AcquisitionFailureKind::Disabled);
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn rejected_key_is_not_retried() {
        let server = StubServer::start(&[(401, "Incorrect API key provided")]).await;
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("abc123.mp3");
        std::fs::write(&audio, b"ID3").unwrap();

        let failure = captions()
            .transcribe_file(&audio, "sk-bad", &server.base_url, "whisper-1", "ja")
            .await
            .unwrap_err();

        assert_eq!(failure.kind, AcquisitionFailureKind::Unauthorized);
        assert_eq!(server.hits(), 1);
    }

    #[test]
    fn status_classification() {
        use AcquisitionFailureKind::*;

        let cases = [
            (401, "", Unauthorized),
            (403, r#"{"error":{"errors":[{"reason":"quotaExceeded"}]}}"#, QuotaExceeded),
            (403, r#"{"error":{"errors":[{"reason":"forbidden"}]}}"#, Unauthorized),
            (404, "", NotFound),
            (429, "", QuotaExceeded),
            (500, "", TransientNetworkError),
            (503, "", TransientNetworkError),
            (418, "", MalformedResponse),
        ];

        for (status, body, expected) in cases {
            let status = StatusCode::from_u16(status).unwrap();
            assert_eq!(classify_status(status, body), expected, "{status}");
        }
    }

    #[test]
    fn openai_api_errors_keep_their_message() {
        let failure = openai_to_acquisition_failure(OpenAIError::Api {
            status: 401,
            message: "Incorrect API key provided".into(),
        });
        assert_eq!(failure.kind, AcquisitionFailureKind::Unauthorized);
        assert_eq!(failure.origin, CaptionSourceKind::AudioTranscription);
        assert_eq!(failure.detail, "Incorrect API key provided");
    }
}
