//! Thin async wrapper over the `yt-dlp` command line tool.
//!
//! Every invocation writes into a scratch directory owned by the caller (or
//! created and removed within the call), so nothing outlives an attempt.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;

use crate::{
    error::{AcquisitionFailure, AcquisitionFailureKind},
    normalizer::normalize,
    types::{CanonicalId, CaptionResult, CaptionSourceKind, YtDlpConfig},
};

const ORIGIN: CaptionSourceKind = CaptionSourceKind::SubtitleExtraction;

pub struct YtDlp<'a> {
    config: &'a YtDlpConfig,
}

impl<'a> YtDlp<'a> {
    pub fn new(config: &'a YtDlpConfig) -> Self {
        Self { config }
    }

    /// Downloads manual or auto-generated subtitles for `language` as WebVTT
    /// and returns their normalized text.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_subtitles(
        &self,
        id: &CanonicalId,
        language: &str,
    ) -> Result<CaptionResult, AcquisitionFailure> {
        let scratch = tempfile::tempdir()
            .inspect_err(|e| tracing::error!(error = %e, "Failed to create scratch directory"))
            .map_err(|e| AcquisitionFailure::malformed(ORIGIN, e))?;
        let output_template = scratch.path().join("%(id)s.%(ext)s");

        let args = [
            "--skip-download",
            "--write-sub",
            "--write-auto-sub",
            "--sub-lang",
            language,
            "--sub-format",
            "vtt",
            "--no-warnings",
            "-o",
        ];
        self.run(&args, &output_template, id).await?;

        let (path, file_language) = find_subtitle_file(scratch.path(), language)
            .await?
            .ok_or_else(|| {
                AcquisitionFailure::not_found(ORIGIN, format!("no {language} subtitles for {id}"))
            })?;

        let raw = tokio::fs::read_to_string(&path)
            .await
            .inspect_err(|e| tracing::error!(error = %e, path = ?path, "Failed to read subtitle file"))
            .map_err(|e| AcquisitionFailure::malformed(ORIGIN, e))?;

        let text = normalize(&raw);
        if text.is_empty() {
            return Err(AcquisitionFailure::not_found(
                ORIGIN,
                format!("subtitle file {} had no text", path.display()),
            ));
        }

        Ok(CaptionResult {
            text,
            language: file_language,
            source: ORIGIN,
        })
    }

    /// Extracts the audio track as low-bitrate mp3 into `audio_dl_path`.
    #[tracing::instrument(skip(self))]
    pub async fn download_audio(
        &self,
        id: &CanonicalId,
        audio_dl_path: &Path,
    ) -> Result<PathBuf, AcquisitionFailure> {
        let output_template = audio_dl_path.join(format!("{id}.%(ext)s"));
        let audio_mp3_path = audio_dl_path.join(format!("{id}.mp3"));

        let args = [
            "-x",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "48K",
            "--no-warnings",
            "-o",
        ];
        self.run(&args, &output_template, id).await?;

        if !audio_mp3_path.exists() {
            return Err(AcquisitionFailure::malformed(
                ORIGIN,
                format!(
                    "yt-dlp did not produce expected file: {}",
                    audio_mp3_path.display()
                ),
            ));
        }
        Ok(audio_mp3_path)
    }

    /// Runs `yt-dlp <args> <output_template> <watch url>` under the configured
    /// timeout.
    async fn run(
        &self,
        args: &[&str],
        output_template: &Path,
        id: &CanonicalId,
    ) -> Result<(), AcquisitionFailure> {
        let mut cmd = Command::new(&self.config.binary);
        if let Some(cookies) = &self.config.cookies_path {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.args(args)
            .arg(output_template)
            .arg(id.watch_url())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.config.timeout, cmd.output()).await {
            Err(_) => {
                tracing::error!(timeout = ?self.config.timeout, "yt-dlp timed out");
                return Err(AcquisitionFailure::transient(
                    ORIGIN,
                    format!("yt-dlp timed out after {:?}", self.config.timeout),
                ));
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::error!(binary = ?self.config.binary, "yt-dlp is not installed");
                return Err(AcquisitionFailure::new(
                    ORIGIN,
                    AcquisitionFailureKind::Disabled,
                    format!("{} not found", self.config.binary.display()),
                ));
            }
            Ok(Err(e)) => return Err(AcquisitionFailure::malformed(ORIGIN, e)),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(status = %output.status, stderr = %stderr.trim(), "yt-dlp failed");
            return Err(AcquisitionFailure::new(
                ORIGIN,
                classify_stderr(&stderr),
                last_line(&stderr),
            ));
        }
        Ok(())
    }
}

/// Maps yt-dlp's error output to a failure kind.
pub fn classify_stderr(stderr: &str) -> AcquisitionFailureKind {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("sign in to confirm")
        || (lower.contains("cookies") && lower.contains("login"))
    {
        AcquisitionFailureKind::Unauthorized
    } else if lower.contains("http error 429") || lower.contains("too many requests") {
        AcquisitionFailureKind::QuotaExceeded
    } else if lower.contains("video unavailable")
        || lower.contains("private video")
        || lower.contains("http error 404")
        || lower.contains("does not exist")
    {
        AcquisitionFailureKind::NotFound
    } else {
        AcquisitionFailureKind::TransientNetworkError
    }
}

fn last_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("yt-dlp exited with an error")
        .to_string()
}

/// Finds the `.vtt` file yt-dlp wrote, preferring `<id>.<language>.vtt`.
/// Returns the path and the language tag from its file name.
async fn find_subtitle_file(
    dir: &Path,
    language: &str,
) -> Result<Option<(PathBuf, String)>, AcquisitionFailure> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| AcquisitionFailure::malformed(ORIGIN, e))?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AcquisitionFailure::malformed(ORIGIN, e))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("vtt") {
            candidates.push(path);
        }
    }
    candidates.sort();

    let tagged = candidates
        .into_iter()
        .map(|path| {
            let tag = subtitle_language(&path).unwrap_or_else(|| language.to_string());
            (path, tag)
        })
        .collect::<Vec<_>>();

    let exact = tagged
        .iter()
        .position(|(_, tag)| tag.eq_ignore_ascii_case(language));
    Ok(match exact {
        Some(idx) => tagged.into_iter().nth(idx),
        None => tagged.into_iter().next(),
    })
}

/// `abc123.ja.vtt` -> `ja`
fn subtitle_language(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let (_, tag) = stem.rsplit_once('.')?;
    (!tag.is_empty()).then(|| tag.to_string())
}
