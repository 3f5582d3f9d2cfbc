//! # Caption strategy chain
//!
//! Tries every enabled caption source, in priority order, for every preferred
//! language, in order, and stops at the first success.

use std::future::Future;

use crate::{
    error::AcquisitionFailure,
    types::{CanonicalId, CaptionResult, CaptionSource, CaptionSourceKind, LanguagePreference},
};

/// Something that can try one caption source for one language.
pub trait CaptionProvider {
    fn attempt(
        &self,
        source: &CaptionSource,
        id: &CanonicalId,
        language: &str,
    ) -> impl Future<Output = Result<CaptionResult, AcquisitionFailure>>;
}

impl<T: CaptionProvider> CaptionProvider for &T {
    async fn attempt(
        &self,
        source: &CaptionSource,
        id: &CanonicalId,
        language: &str,
    ) -> Result<CaptionResult, AcquisitionFailure> {
        (**self).attempt(source, id, language).await
    }
}

/// Returns the first caption track found. When every source fails for every
/// language, the most actionable recorded failure is returned.
///
/// An unauthorized or quota-exhausted source is recorded and skipped; the
/// remaining sources are still tried.
#[tracing::instrument(skip(provider, languages, sources), fields(video_id = %id))]
pub async fn acquire<P: CaptionProvider>(
    provider: &P,
    id: &CanonicalId,
    languages: &LanguagePreference,
    sources: &[CaptionSource],
) -> Result<CaptionResult, AcquisitionFailure> {
    let mut failures = Vec::new();

    for source in sources {
        let kind = source.kind();

        for language in languages.iter() {
            tracing::debug!(source = %kind, language, "Attempting caption source");

            match provider.attempt(source, id, language).await {
                Ok(result) => {
                    tracing::info!(
                        source = %result.source,
                        language = %result.language,
                        chars = result.text.chars().count(),
                        "Captions acquired"
                    );
                    return Ok(result);
                }
                Err(failure) => {
                    tracing::debug!(source = %kind, language, error = %failure, "Caption source failed");
                    let source_wide = failure.kind.is_source_wide();
                    failures.push(failure);
                    if source_wide {
                        tracing::warn!(source = %kind, "Skipping caption source for remaining languages");
                        break;
                    }
                }
            }
        }
    }

    let failure = AcquisitionFailure::most_specific(failures).unwrap_or_else(|| {
        AcquisitionFailure::not_found(
            sources
                .first()
                .map(CaptionSource::kind)
                .unwrap_or(CaptionSourceKind::EmbeddedTranscript),
            "no caption sources enabled",
        )
    });
    tracing::warn!(error = %failure, "All caption sources exhausted");
    Err(failure)
}
