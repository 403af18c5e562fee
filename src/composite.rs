use std::sync::Arc;

use crate::closeable::{Closeable, DynCloseable};
use crate::error::GraphError;
use crate::guard::CloseGuard;
use crate::report::{CloseOutcome, ResourceOutcome, ShutdownReport};
use crate::resource_id::ResourceId;
use crate::supervisor::TimeoutSupervisor;

/// Closes a set of sibling resources with no ordering between them.
///
/// All members are closed concurrently and every member is waited for,
/// success or failure; the result preserves registration order no matter
/// which member finishes first.
#[derive(Default)]
pub struct CompositeCloser {
    members: Vec<Arc<CloseGuard>>,
}

impl CompositeCloser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C>(&mut self, name: impl Into<String>, resource: C) -> ResourceId
    where
        C: Closeable + 'static,
    {
        self.register_arc(name, Arc::new(resource))
    }

    pub fn register_arc(&mut self, name: impl Into<String>, resource: DynCloseable) -> ResourceId {
        let guard = Arc::new(CloseGuard::new(name, resource));
        let id = guard.id();
        self.members.push(guard);
        id
    }

    pub fn register_guard(&mut self, guard: Arc<CloseGuard>) -> ResourceId {
        let id = guard.id();
        self.members.push(guard);
        id
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Closes every member and reports each one's fate. Failures are data in
    /// the report, never short-circuits; closing an empty composite is a
    /// usage error.
    pub async fn close_all(
        &self,
        supervisor: &TimeoutSupervisor,
    ) -> Result<ShutdownReport, GraphError> {
        if self.members.is_empty() {
            return Err(GraphError::EmptyComposite);
        }
        Ok(ShutdownReport {
            outcomes: self.run(supervisor, 0).await,
        })
    }

    pub(crate) async fn run(
        &self,
        supervisor: &TimeoutSupervisor,
        level: usize,
    ) -> Vec<ResourceOutcome> {
        let mut handles = Vec::with_capacity(self.members.len());
        for guard in &self.members {
            let supervisor = supervisor.clone();
            let guard = Arc::clone(guard);
            handles.push(tokio::spawn(
                async move { supervisor.supervise(guard).await },
            ));
        }

        let mut outcomes = Vec::with_capacity(self.members.len());
        for (guard, handle) in self.members.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => CloseOutcome::Failed(Arc::new(anyhow::anyhow!(
                    "close supervision for {} panicked: {}",
                    guard.name(),
                    join_err
                ))),
            };
            if outcome.is_closed() {
                log::info!("Resource {} [level {}] closed", guard.name(), level);
            }
            outcomes.push(ResourceOutcome {
                id: guard.id(),
                name: guard.name().to_string(),
                level,
                outcome,
            });
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StubResource {
        fail: bool,
    }

    #[async_trait]
    impl Closeable for StubResource {
        async fn close(&self) -> Result<()> {
            if self.fail {
                Err(anyhow::anyhow!("flush failed"))
            } else {
                Ok(())
            }
        }
    }

    struct HangingResource;

    #[async_trait]
    impl Closeable for HangingResource {
        async fn close(&self) -> Result<()> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_one_failure_does_not_disturb_siblings() {
        let mut composite = CompositeCloser::new();
        composite.register("conn", StubResource { fail: false });
        composite.register("session", StubResource { fail: true });
        composite.register("writer", StubResource { fail: false });

        let supervisor = TimeoutSupervisor::new(Duration::from_secs(5));
        let report = composite.close_all(&supervisor).await.unwrap();

        assert_eq!(report.len(), 3);
        let names: Vec<&str> = report.outcomes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["conn", "session", "writer"]);
        assert!(report.outcomes[0].outcome.is_closed());
        assert!(matches!(
            report.outcomes[1].outcome,
            CloseOutcome::Failed(_)
        ));
        assert!(report.outcomes[2].outcome.is_closed());
        assert!(!report.is_clean());
        assert_eq!(report.failures().count(), 1);
    }

    #[tokio::test]
    async fn test_empty_composite_is_a_usage_error() {
        let composite = CompositeCloser::new();
        let supervisor = TimeoutSupervisor::new(Duration::from_secs(1));
        let err = composite.close_all(&supervisor).await.unwrap_err();
        assert!(matches!(err, GraphError::EmptyComposite));
    }

    #[tokio::test]
    async fn test_hanging_members_time_out_together() {
        let mut composite = CompositeCloser::new();
        composite.register("stuck_a", HangingResource);
        composite.register("stuck_b", HangingResource);
        composite.register("stuck_c", HangingResource);

        let grace = Duration::from_millis(100);
        let supervisor = TimeoutSupervisor::new(grace);

        let started = tokio::time::Instant::now();
        let report = composite.close_all(&supervisor).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report.len(), 3);
        assert!(report.outcomes.iter().all(|r| r.outcome.is_timeout()));
        // Members hang concurrently, so the whole set is bounded by one
        // grace period, not one per member.
        assert!(elapsed < grace * 2, "took {:?}", elapsed);
    }
}
