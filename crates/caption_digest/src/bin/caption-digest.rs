use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use caption_digest::{
    backend::SummarizationBackend,
    config::{BackendDialect, PipelineConfig, RetryConfig, SummarizerConfig},
    openai::OpenAIClient,
    tracing::init_tracing_subscriber,
    types::{CaptionSource, CaptionSourceKind, LanguagePreference, YtDlpConfig},
    yt::{platform::DATA_API_BASE_URL, YouTubeCaptions},
    DigestProcessorBuilder,
};
use clap::{Parser, ValueEnum};

#[derive(Parser)]
#[command(
    name = "caption-digest",
    about = "Summarize a YouTube video from its captions"
)]
struct Cli {
    /// Watch URL or short link of the video
    url: String,

    /// API key for the summarization backend (also used for audio transcription)
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_key: String,

    /// Summarization endpoint
    #[arg(
        long,
        env = "SUMMARIZER_ENDPOINT",
        default_value = "https://api.openai.com/v1/chat/completions"
    )]
    endpoint: String,

    /// Summarization model
    #[arg(long, env = "SUMMARIZER_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    #[arg(long, env = "SUMMARIZER_DIALECT", value_enum, default_value = "chat")]
    dialect: Dialect,

    /// Upper bound on generated tokens per request
    #[arg(long, env = "SUMMARIZER_MAX_OUTPUT_TOKENS", default_value = "500")]
    max_output_tokens: u32,

    /// Attempts per request for transient network or backend failures
    #[arg(long, env = "SUMMARIZER_MAX_ATTEMPTS", default_value = "3")]
    max_attempts: u32,

    /// YouTube Data API key, required by the platform-captions source
    #[arg(long, env = "YOUTUBE_API_KEY")]
    youtube_api_key: Option<String>,

    /// Preferred caption languages, most preferred first
    #[arg(long, env = "DIGEST_LANGUAGES", default_value = "ja,en")]
    languages: LanguagePreference,

    /// Caption sources to try, in priority order
    #[arg(
        long,
        env = "DIGEST_SOURCES",
        value_delimiter = ',',
        default_value = "embedded-transcript,subtitle-extraction"
    )]
    sources: Vec<CaptionSourceKind>,

    /// Path to the yt-dlp executable
    #[arg(long, env = "YTDLP_BINARY", default_value = "yt-dlp")]
    ytdlp_binary: PathBuf,

    /// Path to yt-dlp cookies file
    #[arg(long, env = "YTDLP_COOKIES_PATH")]
    cookies_path: Option<PathBuf>,

    /// Per-invocation yt-dlp timeout in seconds
    #[arg(long, env = "YTDLP_TIMEOUT", default_value = "120")]
    ytdlp_timeout: u64,

    /// Maximum characters per summarized chunk
    #[arg(long, env = "DIGEST_MAX_CHUNK_CHARS", default_value = "12000")]
    max_chunk_chars: usize,

    /// Chunks summarized concurrently
    #[arg(long, env = "DIGEST_CONCURRENCY", default_value = "4")]
    concurrency: usize,

    /// Overall timeout in seconds
    #[arg(long, env = "DIGEST_TIMEOUT", default_value = "300")]
    timeout: u64,

    /// Joined summaries longer than this get condensed once more
    #[arg(long, env = "DIGEST_RESUMMARIZE_THRESHOLD", default_value = "4000")]
    resummarize_threshold: usize,

    /// Fail instead of printing a summary with missing chunks
    #[arg(long)]
    strict: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Dialect {
    /// OpenAI-compatible chat completions
    Chat,
    /// Hosted text-generation inference
    TextGeneration,
}

impl From<Dialect> for BackendDialect {
    fn from(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Chat => BackendDialect::ChatCompletions,
            Dialect::TextGeneration => BackendDialect::TextGeneration,
        }
    }
}

impl Cli {
    fn caption_sources(&self) -> anyhow::Result<Vec<CaptionSource>> {
        let ytdlp = YtDlpConfig {
            binary: self.ytdlp_binary.clone(),
            cookies_path: self.cookies_path.clone(),
            timeout: Duration::from_secs(self.ytdlp_timeout),
        };

        self.sources
            .iter()
            .map(|kind| -> anyhow::Result<CaptionSource> {
                Ok(match kind {
                    CaptionSourceKind::EmbeddedTranscript => CaptionSource::EmbeddedTranscript,
                    CaptionSourceKind::SubtitleExtraction => CaptionSource::SubtitleExtraction {
                        ytdlp: ytdlp.clone(),
                    },
                    CaptionSourceKind::PlatformCaptions => CaptionSource::PlatformCaptions {
                        api_key: self
                            .youtube_api_key
                            .clone()
                            .context("platform-captions requires YOUTUBE_API_KEY")?,
                        base_url: DATA_API_BASE_URL.into(),
                    },
                    CaptionSourceKind::AudioTranscription => CaptionSource::AudioTranscription {
                        ytdlp: ytdlp.clone(),
                        api_key: self.openai_key.clone(),
                        base_url: OpenAIClient::BASE_URL.into(),
                        model: OpenAIClient::TRANSCRIPTION_MODEL.into(),
                    },
                })
            })
            .collect()
    }

    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let config = PipelineConfig::new(self.languages.clone(), self.caption_sources()?)?
            .with_max_chunk_chars(self.max_chunk_chars)?
            .with_concurrency(self.concurrency)?
            .with_timeout(Duration::from_secs(self.timeout))
            .with_resummarize_threshold(self.resummarize_threshold);
        Ok(config)
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            ..Default::default()
        }
    }

    fn summarizer_config(&self) -> SummarizerConfig {
        SummarizerConfig {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            dialect: self.dialect.into(),
            max_output_tokens: self.max_output_tokens,
            retry: self.retry_config(),
            ..SummarizerConfig::openai(&self.openai_key)
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let _guard = sentry::init((
        std::env::var("SENTRY_DSN").unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    ));

    let cli = Cli::parse();
    init_tracing_subscriber()?;

    let config = cli
        .pipeline_config()
        .context("Invalid pipeline configuration")?;
    tracing::info!(
        url = %cli.url,
        sources = ?cli.sources,
        languages = ?config.languages,
        "Running caption digest"
    );

    let processor = DigestProcessorBuilder::new(config)
        .captions(YouTubeCaptions::default().with_retry(cli.retry_config()))
        .summarizer(SummarizationBackend::new(cli.summarizer_config()))
        .build();

    let digest = processor.run(&cli.url).await?;

    if let Some(partial) = &digest.partial_failure {
        tracing::warn!(
            failed = ?partial.failed_indices(),
            total = partial.total_chunks,
            "Summary is missing some chunks"
        );
    }

    let summary = if cli.strict {
        digest.into_strict()?
    } else {
        digest.summary
    };
    println!("{summary}");

    Ok(())
}
