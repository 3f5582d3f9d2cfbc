//! # Reference resolver
//!
//! Turns the link a user pasted into the video id every caption source keys on.

use url::Url;

use crate::{error::PipelineError, types::CanonicalId};

const SHORT_LINK_HOST: &str = "youtu.be";
const ID_PATH_PREFIXES: [&str; 3] = ["shorts", "embed", "live"];

/// Extracts the video id from a watch URL (`?v=<id>`) or a short link
/// (`youtu.be/<id>`). Extra query parameters and fragments are ignored.
pub fn resolve(raw: &str) -> Result<CanonicalId, PipelineError> {
    let invalid = || PipelineError::InvalidReference(raw.to_string());

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let url = parse_lenient(trimmed).ok_or_else(invalid)?;

    let id = query_id(&url)
        .or_else(|| short_link_id(&url))
        .or_else(|| prefixed_path_id(&url))
        .ok_or_else(invalid)?;

    if !is_valid_id(&id) {
        return Err(invalid());
    }

    tracing::debug!(video_id = %id, "Resolved video reference");
    Ok(CanonicalId::new(id))
}

/// Accepts references pasted without a scheme, e.g. `youtu.be/abc123`.
fn parse_lenient(s: &str) -> Option<Url> {
    match Url::parse(s) {
        Ok(url) if url.has_host() => Some(url),
        Ok(_) => None,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{s}")).ok(),
        Err(_) => None,
    }
}

fn query_id(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == "v")
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn short_link_id(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    if !host.eq_ignore_ascii_case(SHORT_LINK_HOST) {
        return None;
    }

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let id = segments.next()?;
    // the id must be the sole path segment
    if segments.next().is_some() {
        return None;
    }
    Some(id.to_string())
}

fn prefixed_path_id(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;
    let prefix = segments.next()?;
    if !ID_PATH_PREFIXES.contains(&prefix) {
        return None;
    }
    segments
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
