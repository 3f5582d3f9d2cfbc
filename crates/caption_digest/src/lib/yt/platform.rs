//! Platform captions source: the YouTube Data API v3.
//!
//! Two steps: list the caption tracks of the video and pick the first whose
//! language matches the requested tag by prefix, then download that track as
//! SRT and normalize it.

use serde::Deserialize;

use crate::{
    config::RetryConfig,
    error::{AcquisitionFailure, AcquisitionFailureKind},
    normalizer::normalize,
    retry,
    types::{CanonicalId, CaptionResult, CaptionSourceKind},
};

use super::{classify_status, mentions_quota, transport_failure};

const ORIGIN: CaptionSourceKind = CaptionSourceKind::PlatformCaptions;

pub const DATA_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Deserialize)]
pub struct CaptionListResponse {
    #[serde(default)]
    pub items: Vec<CaptionTrack>,
}

#[derive(Debug, Deserialize)]
pub struct CaptionTrack {
    pub id: String,
    pub snippet: CaptionSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionSnippet {
    pub language: String,
    #[serde(default)]
    pub track_kind: Option<String>,
}

pub struct PlatformCaptions<'a> {
    http: &'a reqwest::Client,
    base_url: &'a str,
    api_key: &'a str,
    retry: &'a RetryConfig,
}

impl<'a> PlatformCaptions<'a> {
    pub fn new(
        http: &'a reqwest::Client,
        base_url: &'a str,
        api_key: &'a str,
        retry: &'a RetryConfig,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/'),
            api_key,
            retry,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn fetch(
        &self,
        id: &CanonicalId,
        language: &str,
    ) -> Result<CaptionResult, AcquisitionFailure> {
        let tracks = retry::with_backoff(self.retry, |_| self.list(id)).await?;

        let track = select_track(&tracks.items, language).ok_or_else(|| {
            AcquisitionFailure::not_found(ORIGIN, format!("no {language} caption track for {id}"))
        })?;

        let srt = retry::with_backoff(self.retry, |_| self.download(&track.id)).await?;
        let text = normalize(&srt);
        if text.is_empty() {
            return Err(AcquisitionFailure::not_found(
                ORIGIN,
                format!("caption track {} is empty", track.id),
            ));
        }

        Ok(CaptionResult {
            text,
            language: track.snippet.language.clone(),
            source: ORIGIN,
        })
    }

    async fn list(&self, id: &CanonicalId) -> Result<CaptionListResponse, AcquisitionFailure> {
        let resp = self
            .http
            .get(format!("{}/captions", self.base_url))
            .query(&[("part", "snippet"), ("videoId", id.as_str()), ("key", self.api_key)])
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to list caption tracks"))
            .map_err(|e| transport_failure(ORIGIN, e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| transport_failure(ORIGIN, e))?;

        if !status.is_success() {
            return Err(AcquisitionFailure::new(
                ORIGIN,
                classify_list_status(status, &body),
                format!("captions.list returned {status}"),
            ));
        }

        serde_json::from_str(&body).map_err(|e| AcquisitionFailure::malformed(ORIGIN, e))
    }

    async fn download(&self, track_id: &str) -> Result<String, AcquisitionFailure> {
        let resp = self
            .http
            .get(format!("{}/captions/{track_id}", self.base_url))
            .query(&[("tfmt", "srt"), ("key", self.api_key)])
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to download caption track"))
            .map_err(|e| transport_failure(ORIGIN, e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| transport_failure(ORIGIN, e))?;

        if !status.is_success() {
            return Err(AcquisitionFailure::new(
                ORIGIN,
                classify_download_status(status, &body),
                format!("captions.download returned {status}"),
            ));
        }
        Ok(body)
    }
}

/// A 400 on the list call means the key itself was rejected.
fn classify_list_status(status: reqwest::StatusCode, body: &str) -> AcquisitionFailureKind {
    match status.as_u16() {
        400 => AcquisitionFailureKind::Unauthorized,
        _ => classify_status(status, body),
    }
}

/// A 403 on download means the owner does not allow third-party access to
/// the track.
fn classify_download_status(status: reqwest::StatusCode, body: &str) -> AcquisitionFailureKind {
    match status.as_u16() {
        403 if !mentions_quota(body) => AcquisitionFailureKind::Disabled,
        _ => classify_status(status, body),
    }
}

/// Picks the first track whose language equals `language` or is a regional
/// variant of it (`ja` matches `ja-JP`). Standard tracks beat auto-generated
/// ones for the same tag.
pub fn select_track<'t>(tracks: &'t [CaptionTrack], language: &str) -> Option<&'t CaptionTrack> {
    let matches = |track: &&CaptionTrack| language_matches(&track.snippet.language, language);
    let is_asr = |track: &&CaptionTrack| {
        track
            .snippet
            .track_kind
            .as_deref()
            .is_some_and(|k| k.eq_ignore_ascii_case("asr"))
    };

    tracks
        .iter()
        .filter(matches)
        .find(|t| !is_asr(t))
        .or_else(|| tracks.iter().find(matches))
}

fn language_matches(track_language: &str, requested: &str) -> bool {
    let track_language = track_language.to_ascii_lowercase();
    let requested = requested.to_ascii_lowercase();
    track_language == requested || track_language.starts_with(&format!("{requested}-"))
}
