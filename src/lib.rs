pub mod closeable;
pub mod composite;
pub mod config;
pub mod error;
pub mod graph;
pub mod guard;
pub mod report;
pub mod resource_id;
pub mod signal;
pub mod supervisor;
pub mod task;

pub use closeable::{Closeable, DynCloseable};
pub use composite::CompositeCloser;
pub use config::ShutdownConfig;
pub use error::GraphError;
pub use graph::{ShutdownGraph, ShutdownGraphBuilder};
pub use guard::{CloseGuard, LifecycleState};
pub use report::{CloseOutcome, ResourceOutcome, ShutdownReport};
pub use resource_id::ResourceId;
pub use signal::cancel_on_ctrl_c;
pub use supervisor::TimeoutSupervisor;
pub use task::TaskCloser;
