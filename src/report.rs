use std::sync::Arc;
use std::time::Duration;

use crate::resource_id::ResourceId;

/// Terminal result of one resource's close attempt.
#[derive(Debug, Clone)]
pub enum CloseOutcome {
    Closed,
    Failed(Arc<anyhow::Error>),
    /// No answer within the grace period. The close work may still finish
    /// later; the coordinator no longer listens.
    TimedOut(Duration),
}

impl CloseOutcome {
    pub fn is_closed(&self) -> bool {
        matches!(self, CloseOutcome::Closed)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CloseOutcome::TimedOut(_))
    }
}

impl std::fmt::Display for CloseOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseOutcome::Closed => write!(f, "closed"),
            CloseOutcome::Failed(err) => write!(f, "failed: {}", err),
            CloseOutcome::TimedOut(grace) => write!(f, "timed out after {:?}", grace),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceOutcome {
    pub id: ResourceId,
    pub name: String,
    pub level: usize,
    pub outcome: CloseOutcome,
}

/// Complete record of one shutdown run: level order, registration order
/// within a level. Immutable once the run has produced it.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    pub outcomes: Vec<ResourceOutcome>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|r| r.outcome.is_closed())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ResourceOutcome> {
        self.outcomes.iter().filter(|r| !r.outcome.is_closed())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
