pub mod builder;
mod state;

use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;

pub use state::{IllegalTransition, PipelineStage, StageTracker};

use crate::{
    aggregator::Aggregator,
    chain::{self, CaptionProvider},
    chunker,
    config::PipelineConfig,
    error::{AcquisitionFailure, ChunkFailure, PipelineError, SummarizationFailure},
    normalizer::collapse_whitespace,
    resolver,
    types::{Chunk, Digest, SummaryFragment},
    Summarizer,
};

type ChunkSlot = Option<Result<SummaryFragment, SummarizationFailure>>;

// Turns one video reference into a digest of its captions
#[derive(Debug)]
pub struct DigestProcessor<C, S>
where
    C: CaptionProvider,
    S: Summarizer,
{
    config: PipelineConfig,
    captions: C,
    summarizer: S,
}

impl<C, S> DigestProcessor<C, S>
where
    C: CaptionProvider,
    S: Summarizer,
{
    pub fn new(config: PipelineConfig, captions: C, summarizer: S) -> Self {
        DigestProcessor {
            config,
            captions,
            summarizer,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn run(&self, raw_reference: &str) -> Result<Digest, PipelineError> {
        self.run_traced(raw_reference).await.0
    }

    /// Like [`run`](Self::run), also returning the stages the run went through.
    pub async fn run_traced(
        &self,
        raw_reference: &str,
    ) -> (Result<Digest, PipelineError>, StageTracker) {
        let token = CancellationToken::new();
        let mut tracker = StageTracker::default();
        let timeout = self.config.timeout;

        let result = tokio::select! {
            result = self.drive(raw_reference, &token, &mut tracker) => result,
            _ = tokio::time::sleep(timeout) => {
                token.cancel();
                Err(PipelineError::PipelineTimeout(timeout))
            }
        };

        match &result {
            Ok(digest) => tracing::info!(
                video_id = %digest.video_id,
                source = %digest.source,
                language = %digest.language,
                chunks = digest.chunk_count,
                partial = digest.is_partial(),
                "Digest ready"
            ),
            Err(e) => {
                tracing::error!(error = %e, kind = e.kind(), stage = %tracker.current(), "Pipeline failed");
                tracker.fail();
            }
        }

        (result, tracker)
    }

    async fn drive(
        &self,
        raw_reference: &str,
        token: &CancellationToken,
        tracker: &mut StageTracker,
    ) -> Result<Digest, PipelineError> {
        enter(tracker, PipelineStage::Resolving);
        let video_id = resolver::resolve(raw_reference)?;

        enter(tracker, PipelineStage::Acquiring);
        let captions = chain::acquire(
            &self.captions,
            &video_id,
            &self.config.languages,
            &self.config.sources,
        )
        .await?;

        enter(tracker, PipelineStage::Normalizing);
        let text = collapse_whitespace(&captions.text);
        if text.is_empty() {
            return Err(AcquisitionFailure::not_found(
                captions.source,
                format!("{} captions for {video_id} were empty", captions.language),
            )
            .into());
        }

        enter(tracker, PipelineStage::Chunking);
        let chunks = chunker::split(&text, self.config.max_chunk_chars);
        tracing::info!(
            chunks = chunks.len(),
            chars = text.chars().count(),
            max_chunk_chars = self.config.max_chunk_chars.get(),
            "Caption text chunked"
        );

        enter(tracker, PipelineStage::Summarizing);
        let (fragments, failures) = self.summarize_chunks(&chunks, token).await?;

        enter(tracker, PipelineStage::Aggregating);
        let aggregated = Aggregator::new(&self.summarizer, self.config.resummarize_threshold)
            .aggregate(fragments, failures, chunks.len())
            .await?;

        enter(tracker, PipelineStage::Done);
        Ok(Digest {
            video_id,
            language: captions.language,
            source: captions.source,
            summary: aggregated.summary,
            chunk_count: chunks.len(),
            partial_failure: aggregated.partial_failure,
        })
    }

    /// Summarizes every chunk with at most `concurrency` requests in flight.
    ///
    /// Per-chunk failures are returned as data. The run is cancelled once a
    /// strict majority of chunks failed with an unauthorized or quota error.
    #[tracing::instrument(skip_all, fields(chunks = chunks.len()))]
    async fn summarize_chunks(
        &self,
        chunks: &[Chunk],
        token: &CancellationToken,
    ) -> Result<(Vec<SummaryFragment>, Vec<ChunkFailure>), PipelineError> {
        let total = chunks.len();
        let mut slots: Vec<ChunkSlot> = (0..total).map(|_| None).collect();
        let mut fatal = Vec::new();

        let summarizer = &self.summarizer;
        let mut in_flight = stream::iter(chunks)
            .map(|chunk| async move {
                let outcome = tokio::select! {
                    _ = token.cancelled() => None,
                    outcome = summarizer.summarize(&chunk.text) => Some(outcome),
                };
                (chunk.index, outcome)
            })
            .buffer_unordered(self.config.concurrency.get());

        while let Some((index, outcome)) = in_flight.next().await {
            let Some(outcome) = outcome else {
                return Err(PipelineError::PipelineTimeout(self.config.timeout));
            };

            match outcome {
                Ok(resp) => {
                    tracing::debug!(chunk = index, "Chunk summarized");
                    slots[index] = Some(Ok(SummaryFragment {
                        chunk_index: index,
                        text: resp.summary,
                    }));
                }
                Err(failure) => {
                    tracing::warn!(chunk = index, error = %failure, "Chunk summarization failed");
                    if failure.kind.is_fatal() {
                        fatal.push(failure.clone());
                    }
                    slots[index] = Some(Err(failure));

                    if fatal.len() * 2 > total {
                        token.cancel();
                        tracing::error!(
                            fatal = fatal.len(),
                            total,
                            "Most chunks were rejected by the summarizer, cancelling run"
                        );
                        if let Some(failure) =
                            SummarizationFailure::most_specific(fatal.iter().cloned())
                        {
                            return Err(failure.into());
                        }
                    }
                }
            }
        }

        let mut fragments = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for (chunk_index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(fragment)) => fragments.push(fragment),
                Some(Err(failure)) => failures.push(ChunkFailure {
                    chunk_index,
                    failure,
                }),
                None => failures.push(ChunkFailure {
                    chunk_index,
                    failure: SummarizationFailure::transient("chunk produced no result"),
                }),
            }
        }

        Ok((fragments, failures))
    }
}

fn enter(tracker: &mut StageTracker, stage: PipelineStage) {
    if let Err(e) = tracker.advance(stage) {
        tracing::error!(error = %e, "Pipeline stage out of order");
    }
}
