use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// A resource that can be asked to release what it holds.
///
/// The first effective call begins the actual release; the coordinator's
/// guard makes sure the body runs at most once no matter how many callers
/// request it. Closing a resource that was never opened must succeed as a
/// no-op.
#[async_trait]
pub trait Closeable: Send + Sync {
    async fn close(&self) -> Result<()>;
}

pub type DynCloseable = Arc<dyn Closeable>;
