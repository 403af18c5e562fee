use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::closeable::Closeable;

/// Adapts a spawned background task to the close contract.
///
/// The task body receives a cancellation token; closing the adapter cancels
/// the token and waits for the task to wind down. The task also counts as
/// finished when its future completes on its own.
pub struct TaskCloser {
    name: String,
    cancel_token: CancellationToken,
    handle: Arc<JoinHandle<()>>,
    completion: StdMutex<Option<oneshot::Receiver<()>>>,
}

impl TaskCloser {
    pub fn spawn<F, Fut>(name: impl Into<String>, parent: &CancellationToken, task: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let task_token = parent.child_token();
        let run_token = task_token.clone();
        let future = task(task_token.clone());
        let (completion_tx, completion_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = run_token.cancelled() => {},
                _ = future => {},
            }
            let _ = completion_tx.send(());
        });

        Self {
            name,
            cancel_token: task_token,
            handle: Arc::new(handle),
            completion: StdMutex::new(Some(completion_rx)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Kills the task without waiting. A later close reports the task as
    /// terminated abnormally.
    pub fn abort(&self) {
        log::warn!("Task {} aborted", self.name);
        self.handle.abort();
    }
}

#[async_trait]
impl Closeable for TaskCloser {
    async fn close(&self) -> Result<()> {
        self.cancel_token.cancel();
        let completion = self
            .completion
            .lock()
            .expect("task completion poisoned")
            .take();
        match completion {
            Some(rx) => match rx.await {
                Ok(()) => {
                    log::debug!("Task {} finished cleanly", self.name);
                    Ok(())
                }
                Err(_) => Err(anyhow::anyhow!(
                    "task {} terminated without winding down",
                    self.name
                )),
            },
            None => Ok(()),
        }
    }
}
