use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use caption_digest::{
    types::{CanonicalId, CaptionResult, CaptionSource, CaptionSourceKind},
    AcquisitionFailure, AcquisitionFailureKind, CaptionProvider,
};

/// Matches every language of a source.
const ANY_LANGUAGE: &str = "*";

#[derive(Clone, Default)]
pub struct MockCaptionProvider {
    pub outcomes: HashMap<(CaptionSourceKind, String), Result<String, AcquisitionFailureKind>>,
    pub forbidden: HashSet<CaptionSourceKind>,
    pub calls: Arc<Mutex<Vec<(CaptionSourceKind, String)>>>,
}

impl MockCaptionProvider {
    pub fn with_captions(mut self, source: CaptionSourceKind, language: &str, text: &str) -> Self {
        self.outcomes
            .insert((source, language.to_string()), Ok(text.to_string()));
        self
    }

    /// Every attempt against `source` fails with `kind`.
    pub fn failing(mut self, source: CaptionSourceKind, kind: AcquisitionFailureKind) -> Self {
        self.outcomes
            .insert((source, ANY_LANGUAGE.to_string()), Err(kind));
        self
    }

    /// Panics if `source` is ever attempted.
    pub fn must_not_call(mut self, source: CaptionSourceKind) -> Self {
        self.forbidden.insert(source);
        self
    }

    pub fn recorded_calls(&self) -> Vec<(CaptionSourceKind, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl CaptionProvider for MockCaptionProvider {
    async fn attempt(
        &self,
        source: &CaptionSource,
        id: &CanonicalId,
        language: &str,
    ) -> Result<CaptionResult, AcquisitionFailure> {
        let kind = source.kind();
        self.calls
            .lock()
            .unwrap()
            .push((kind, language.to_string()));

        if self.forbidden.contains(&kind) {
            panic!("{kind} was attempted for {id} after an earlier source succeeded");
        }

        let outcome = self
            .outcomes
            .get(&(kind, language.to_string()))
            .or_else(|| self.outcomes.get(&(kind, ANY_LANGUAGE.to_string())));

        match outcome {
            Some(Ok(text)) => Ok(CaptionResult {
                text: text.clone(),
                language: language.to_string(),
                source: kind,
            }),
            Some(Err(failure_kind)) => Err(AcquisitionFailure::new(
                kind,
                *failure_kind,
                format!("scripted {failure_kind}"),
            )),
            None => Err(AcquisitionFailure::not_found(
                kind,
                format!("no {language} captions for {id}"),
            )),
        }
    }
}
