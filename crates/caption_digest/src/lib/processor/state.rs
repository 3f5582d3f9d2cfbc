use std::fmt;

/// Stages of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Resolving,
    Acquiring,
    Normalizing,
    Chunking,
    Summarizing,
    Aggregating,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Resolving),
            Self::Resolving => Some(Self::Acquiring),
            Self::Acquiring => Some(Self::Normalizing),
            Self::Normalizing => Some(Self::Chunking),
            Self::Chunking => Some(Self::Summarizing),
            Self::Summarizing => Some(Self::Aggregating),
            Self::Aggregating => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    /// Stages advance strictly in order; `Failed` is reachable from any
    /// non-terminal stage.
    pub fn can_transition_to(self, to: Self) -> bool {
        match to {
            Self::Failed => !self.is_terminal(),
            _ => self.next() == Some(to),
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal pipeline transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: PipelineStage,
    pub to: PipelineStage,
}

/// Records the stages a run went through.
#[derive(Debug, Clone)]
pub struct StageTracker {
    current: PipelineStage,
    history: Vec<PipelineStage>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self {
            current: PipelineStage::Idle,
            history: vec![PipelineStage::Idle],
        }
    }
}

impl StageTracker {
    pub fn current(&self) -> PipelineStage {
        self.current
    }

    pub fn history(&self) -> &[PipelineStage] {
        &self.history
    }

    pub fn advance(&mut self, to: PipelineStage) -> Result<(), IllegalTransition> {
        if !self.current.can_transition_to(to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }
        tracing::debug!(from = %self.current, %to, "Pipeline stage transition");
        self.current = to;
        self.history.push(to);
        Ok(())
    }

    /// Moves to `Failed` unless the run already finished.
    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            tracing::debug!(from = %self.current, "Pipeline failed");
            self.current = PipelineStage::Failed;
            self.history.push(PipelineStage::Failed);
        }
    }
}
