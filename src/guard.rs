use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::closeable::DynCloseable;
use crate::report::CloseOutcome;
use crate::resource_id::ResourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Open,
    Closing,
    Closed,
    Failed,
}

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;
const FAILED: u8 = 3;

struct GuardShared {
    name: String,
    state: AtomicU8,
    outcome_tx: watch::Sender<Option<CloseOutcome>>,
}

/// Wraps one resource and makes its close logic run at most once.
///
/// The first caller to win the Open -> Closing transition starts the real
/// close work on its own task; every caller, including the winner and any
/// later ones, awaits the same published outcome.
pub struct CloseGuard {
    id: ResourceId,
    shared: Arc<GuardShared>,
    resource: DynCloseable,
    outcome_rx: watch::Receiver<Option<CloseOutcome>>,
}

impl CloseGuard {
    pub fn new(name: impl Into<String>, resource: DynCloseable) -> Self {
        let (outcome_tx, outcome_rx) = watch::channel(None);
        Self {
            id: ResourceId::new(),
            shared: Arc::new(GuardShared {
                name: name.into(),
                state: AtomicU8::new(OPEN),
                outcome_tx,
            }),
            resource,
            outcome_rx,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> LifecycleState {
        match self.shared.state.load(Ordering::Acquire) {
            OPEN => LifecycleState::Open,
            CLOSING => LifecycleState::Closing,
            CLOSED => LifecycleState::Closed,
            _ => LifecycleState::Failed,
        }
    }

    /// Outcome of the close work, if it has finished. Never blocks.
    pub fn outcome(&self) -> Option<CloseOutcome> {
        self.outcome_rx.borrow().clone()
    }

    /// Requests the close and waits for its outcome.
    ///
    /// Exactly one caller performs the Open -> Closing transition and starts
    /// the resource's close logic; all others observe the in-flight or
    /// already-resolved result. A panic inside the close body is captured as
    /// a failure outcome.
    pub async fn close(&self) -> CloseOutcome {
        if self
            .shared
            .state
            .compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            log::debug!("Resource {} closing", self.shared.name);
            let shared = Arc::clone(&self.shared);
            let resource = Arc::clone(&self.resource);
            tokio::spawn(async move {
                let result = tokio::spawn(async move { resource.close().await }).await;
                let outcome = match result {
                    Ok(Ok(())) => {
                        shared.state.store(CLOSED, Ordering::Release);
                        log::debug!("Resource {} closed", shared.name);
                        CloseOutcome::Closed
                    }
                    Ok(Err(err)) => {
                        shared.state.store(FAILED, Ordering::Release);
                        log::error!("Resource {} close returned error: {}", shared.name, err);
                        CloseOutcome::Failed(Arc::new(err))
                    }
                    Err(join_err) => {
                        shared.state.store(FAILED, Ordering::Release);
                        log::error!("Resource {} close panicked: {}", shared.name, join_err);
                        CloseOutcome::Failed(Arc::new(anyhow::anyhow!(
                            "close panicked: {}",
                            join_err
                        )))
                    }
                };
                let _ = shared.outcome_tx.send(Some(outcome));
            });
        }

        let mut rx = self.outcome_rx.clone();
        if let Ok(value) = rx.wait_for(|o| o.is_some()).await {
            if let Some(outcome) = value.clone() {
                return outcome;
            }
        }
        // The sender lives as long as the guard, so this is unreachable in
        // practice; report it as a failure rather than hanging a caller.
        CloseOutcome::Failed(Arc::new(anyhow::anyhow!(
            "close worker for {} vanished without reporting",
            self.shared.name
        )))
    }
}
