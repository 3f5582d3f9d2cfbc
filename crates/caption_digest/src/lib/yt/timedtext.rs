//! Embedded transcript source: the player's own `timedtext` endpoint in
//! `json3` form. No credential is needed and the language is requested up
//! front. The manually uploaded track is tried before the auto-generated one.

use serde::Deserialize;

use crate::{
    config::RetryConfig,
    error::{AcquisitionFailure, AcquisitionFailureKind},
    normalizer::collapse_whitespace,
    retry,
    types::{CanonicalId, CaptionResult, CaptionSourceKind},
};

use super::{classify_status, transport_failure};

const ORIGIN: CaptionSourceKind = CaptionSourceKind::EmbeddedTranscript;

#[derive(Debug, Default, Deserialize)]
pub struct TimedTextDocument {
    #[serde(default)]
    pub events: Vec<TimedTextEvent>,
}

/// One timed caption cue. Timing fields are not needed for prose.
#[derive(Debug, Deserialize)]
pub struct TimedTextEvent {
    #[serde(default)]
    pub segs: Vec<TimedTextSegment>,
}

#[derive(Debug, Deserialize)]
pub struct TimedTextSegment {
    #[serde(default)]
    pub utf8: String,
}

impl TimedTextDocument {
    /// Concatenates every cue's text into one whitespace-collapsed line.
    pub fn plain_text(&self) -> String {
        let joined = self
            .events
            .iter()
            .map(|event| event.segs.iter().map(|seg| seg.utf8.as_str()).collect::<String>())
            .collect::<Vec<_>>()
            .join(" ");
        collapse_whitespace(&joined)
    }
}

#[tracing::instrument(skip(http, base_url, retry_config))]
pub async fn fetch_transcript(
    http: &reqwest::Client,
    base_url: &str,
    retry_config: &RetryConfig,
    id: &CanonicalId,
    language: &str,
) -> Result<CaptionResult, AcquisitionFailure> {
    for kind in [None, Some("asr")] {
        let text = retry::with_backoff(retry_config, |_| {
            fetch_track(http, base_url, id, language, kind)
        })
        .await?;
        if !text.is_empty() {
            return Ok(CaptionResult {
                text,
                language: language.to_string(),
                source: ORIGIN,
            });
        }
        tracing::debug!(track_kind = ?kind, "Empty timedtext track");
    }

    Err(AcquisitionFailure::not_found(
        ORIGIN,
        format!("no {language} transcript for {id}"),
    ))
}

/// Returns the track text, or an empty string when the track does not exist.
async fn fetch_track(
    http: &reqwest::Client,
    base_url: &str,
    id: &CanonicalId,
    language: &str,
    kind: Option<&str>,
) -> Result<String, AcquisitionFailure> {
    let mut query = vec![("v", id.as_str()), ("lang", language), ("fmt", "json3")];
    if let Some(kind) = kind {
        query.push(("kind", kind));
    }

    let resp = http
        .get(base_url)
        .query(&query)
        .header("Accept-Language", format!("{language},en;q=0.5"))
        .send()
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))
        .map_err(|e| transport_failure(ORIGIN, e))?;

    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| transport_failure(ORIGIN, e))?;

    if status.as_u16() == 404 {
        return Ok(String::new());
    }
    if !status.is_success() {
        return Err(AcquisitionFailure::new(
            ORIGIN,
            classify_status(status, &body),
            format!("timedtext returned {status}"),
        ));
    }

    parse_document(&body).map(|doc| doc.plain_text())
}

/// An empty body is how the endpoint says "no such track".
pub fn parse_document(body: &str) -> Result<TimedTextDocument, AcquisitionFailure> {
    if body.trim().is_empty() {
        return Ok(TimedTextDocument::default());
    }
    serde_json::from_str(body).map_err(|e| {
        AcquisitionFailure::new(
            ORIGIN,
            AcquisitionFailureKind::MalformedResponse,
            format!("invalid timedtext json: {e}"),
        )
    })
}
