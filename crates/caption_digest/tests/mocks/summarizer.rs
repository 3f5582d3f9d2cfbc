use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use caption_digest::{SummarizationFailure, Summarizer, SummaryResponse};

#[derive(Clone, Default)]
pub struct MockSummarizer {
    /// Fixed reply; when unset the content is echoed back as `summary of <content>`.
    pub summary: Option<String>,
    pub failures: HashMap<String, SummarizationFailure>,
    pub delays: HashMap<String, Duration>,
    pub default_delay: Option<Duration>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockSummarizer {
    pub fn new(summary: &str) -> Self {
        Self {
            summary: Some(summary.to_string()),
            ..Default::default()
        }
    }

    pub fn echo() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, content: &str, failure: SummarizationFailure) -> Self {
        self.failures.insert(content.to_string(), failure);
        self
    }

    pub fn delayed_on(mut self, content: &str, delay: Duration) -> Self {
        self.delays.insert(content.to_string(), delay);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Summarizer for MockSummarizer {
    async fn summarize(&self, content: &str) -> Result<SummaryResponse, SummarizationFailure> {
        self.calls.lock().unwrap().push(content.to_string());

        if let Some(delay) = self.delays.get(content).copied().or(self.default_delay) {
            tokio::time::sleep(delay).await;
        }

        if let Some(failure) = self.failures.get(content) {
            return Err(failure.clone());
        }

        let summary = match &self.summary {
            Some(summary) => summary.clone(),
            None => format!("summary of {content}"),
        };
        Ok(SummaryResponse { summary })
    }
}
