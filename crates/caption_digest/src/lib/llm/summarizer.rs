use std::future::Future;

use crate::error::SummarizationFailure;

/// A backend that condenses one piece of text.
pub trait Summarizer {
    fn summarize(
        &self,
        content: &str,
    ) -> impl Future<Output = Result<SummaryResponse, SummarizationFailure>>;
}

impl<T: Summarizer> Summarizer for &T {
    async fn summarize(&self, content: &str) -> Result<SummaryResponse, SummarizationFailure> {
        (**self).summarize(content).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryResponse {
    pub summary: String,
}
