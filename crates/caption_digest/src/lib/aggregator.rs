use itertools::Itertools;

use crate::{
    error::{ChunkFailure, PartialFailure, PipelineError, SummarizationFailure},
    llm::summarizer::Summarizer,
    types::SummaryFragment,
};

/// The joined summary of a run, plus which chunks were missing from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedSummary {
    pub summary: String,
    pub partial_failure: Option<PartialFailure>,
}

pub struct Aggregator<'a, S> {
    summarizer: &'a S,
    resummarize_threshold: usize,
}

impl<'a, S: Summarizer> Aggregator<'a, S> {
    pub fn new(summarizer: &'a S, resummarize_threshold: usize) -> Self {
        Self {
            summarizer,
            resummarize_threshold,
        }
    }

    /// Joins fragments in chunk order. Fails only when no chunk succeeded.
    ///
    /// A joined summary longer than the threshold is condensed by one more
    /// summarization pass; if that pass fails the joined text is kept.
    #[tracing::instrument(skip_all, fields(fragments = fragments.len(), failures = failures.len()))]
    pub async fn aggregate(
        &self,
        fragments: Vec<SummaryFragment>,
        failures: Vec<ChunkFailure>,
        total_chunks: usize,
    ) -> Result<AggregatedSummary, PipelineError> {
        if fragments.is_empty() {
            let failure = SummarizationFailure::most_specific(
                failures.into_iter().map(|f| f.failure),
            )
            .unwrap_or_else(|| SummarizationFailure::malformed("no chunks to summarize"));
            return Err(failure.into());
        }

        let joined = join_fragments(fragments);
        let summary = if joined.chars().count() > self.resummarize_threshold {
            self.condense(joined).await
        } else {
            joined
        };

        let partial_failure = (!failures.is_empty()).then(|| {
            let failed = failures
                .into_iter()
                .sorted_by_key(|f| f.chunk_index)
                .collect::<Vec<_>>();
            tracing::warn!(
                failed = ?failed.iter().map(|f| f.chunk_index).collect::<Vec<_>>(),
                "Summary built from partial results"
            );
            PartialFailure {
                total_chunks,
                failed,
            }
        });

        Ok(AggregatedSummary {
            summary,
            partial_failure,
        })
    }

    async fn condense(&self, joined: String) -> String {
        tracing::info!(
            chars = joined.chars().count(),
            threshold = self.resummarize_threshold,
            "Condensing joined summary"
        );
        match self.summarizer.summarize(&joined).await {
            Ok(resp) if !resp.summary.trim().is_empty() => resp.summary,
            Ok(_) => joined,
            Err(e) => {
                tracing::warn!(error = %e, "Condensation pass failed, keeping joined summary");
                joined
            }
        }
    }
}

/// Orders fragments by chunk index, whatever order they completed in.
pub fn join_fragments(fragments: Vec<SummaryFragment>) -> String {
    fragments
        .into_iter()
        .sorted_by_key(|f| f.chunk_index)
        .map(|f| f.text)
        .join("\n")
}
