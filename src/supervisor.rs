use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::config::ShutdownConfig;
use crate::guard::CloseGuard;
use crate::report::CloseOutcome;

/// Bounds the wall-clock wait for any single resource's close.
///
/// A resource that does not answer within its grace is recorded as timed out
/// and its level proceeds; the underlying close work is not cancelled, its
/// late completion is simply ignored.
#[derive(Debug, Clone)]
pub struct TimeoutSupervisor {
    grace: Duration,
    overrides: HashMap<String, Duration>,
}

impl TimeoutSupervisor {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            overrides: HashMap::new(),
        }
    }

    pub fn from_config(config: &ShutdownConfig) -> Self {
        Self {
            grace: config.grace(),
            overrides: config
                .resource_grace_ms
                .iter()
                .map(|(name, ms)| (name.clone(), Duration::from_millis(*ms)))
                .collect(),
        }
    }

    pub fn override_for(mut self, name: impl Into<String>, grace: Duration) -> Self {
        self.overrides.insert(name.into(), grace);
        self
    }

    pub fn grace_for(&self, name: &str) -> Duration {
        self.overrides.get(name).copied().unwrap_or(self.grace)
    }

    pub async fn supervise(&self, guard: Arc<CloseGuard>) -> CloseOutcome {
        let grace = self.grace_for(guard.name());
        match timeout(grace, guard.close()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                log::warn!(
                    "Resource {} did not close within {:?}, moving on",
                    guard.name(),
                    grace
                );
                CloseOutcome::TimedOut(grace)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closeable::{Closeable, DynCloseable};
    use anyhow::Result;
    use async_trait::async_trait;

    struct HangingResource;

    #[async_trait]
    impl Closeable for HangingResource {
        async fn close(&self) -> Result<()> {
            std::future::pending().await
        }
    }

    struct PromptResource;

    #[async_trait]
    impl Closeable for PromptResource {
        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hanging_close_becomes_timeout_outcome() {
        let supervisor = TimeoutSupervisor::new(Duration::from_millis(50));
        let guard = Arc::new(CloseGuard::new(
            "stuck",
            Arc::new(HangingResource) as DynCloseable,
        ));

        let started = tokio::time::Instant::now();
        let outcome = supervisor.supervise(guard).await;
        assert!(outcome.is_timeout());
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_override_beats_default_grace() {
        let supervisor =
            TimeoutSupervisor::new(Duration::from_secs(30)).override_for("stuck", Duration::from_millis(50));
        assert_eq!(supervisor.grace_for("stuck"), Duration::from_millis(50));
        assert_eq!(supervisor.grace_for("fine"), Duration::from_secs(30));

        let guard = Arc::new(CloseGuard::new(
            "stuck",
            Arc::new(HangingResource) as DynCloseable,
        ));
        let outcome = supervisor.supervise(guard).await;
        assert!(matches!(outcome, CloseOutcome::TimedOut(grace) if grace == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_prompt_close_passes_through() {
        let supervisor = TimeoutSupervisor::new(Duration::from_secs(5));
        let guard = Arc::new(CloseGuard::new(
            "quick",
            Arc::new(PromptResource) as DynCloseable,
        ));
        assert!(supervisor.supervise(guard).await.is_closed());
    }
}
