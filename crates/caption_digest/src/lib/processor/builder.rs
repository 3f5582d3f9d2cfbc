use crate::{chain::CaptionProvider, config::PipelineConfig, DigestProcessor, Summarizer};

pub struct DigestProcessorBuilder<C = (), S = ()> {
    config: PipelineConfig,
    captions: C,
    summarizer: S,
}

impl DigestProcessorBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            captions: (),
            summarizer: (),
        }
    }
}

impl<C, S> DigestProcessorBuilder<C, S> {
    pub fn captions<C2: CaptionProvider>(self, captions: C2) -> DigestProcessorBuilder<C2, S> {
        DigestProcessorBuilder {
            config: self.config,
            captions,
            summarizer: self.summarizer,
        }
    }

    pub fn summarizer<S2: Summarizer>(self, summarizer: S2) -> DigestProcessorBuilder<C, S2> {
        DigestProcessorBuilder {
            config: self.config,
            captions: self.captions,
            summarizer,
        }
    }
}

impl<C, S> DigestProcessorBuilder<C, S>
where
    C: CaptionProvider,
    S: Summarizer,
{
    pub fn build(self) -> DigestProcessor<C, S> {
        DigestProcessor::new(self.config, self.captions, self.summarizer)
    }
}
