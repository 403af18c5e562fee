use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::closeable::{Closeable, DynCloseable};
use crate::composite::CompositeCloser;
use crate::config::ShutdownConfig;
use crate::error::GraphError;
use crate::guard::CloseGuard;
use crate::report::ShutdownReport;
use crate::resource_id::ResourceId;
use crate::supervisor::TimeoutSupervisor;

/// Registration phase of the shutdown graph.
///
/// Resources are registered with a display name; an edge
/// `(dependent, dependency)` means the dependent must finish closing before
/// the dependency's close begins. `build` validates the DAG and freezes the
/// topology, so a graph that can be shut down is always a built one.
pub struct ShutdownGraphBuilder {
    nodes: Vec<Arc<CloseGuard>>,
    index: HashMap<ResourceId, usize>,
    edges: HashSet<(usize, usize)>,
    root_token: CancellationToken,
}

impl ShutdownGraphBuilder {
    pub fn new() -> Self {
        Self::with_root_token(CancellationToken::new())
    }

    /// Builds on an externally owned token, so the graph's shutdown signal
    /// can be part of a wider token tree.
    pub fn with_root_token(root_token: CancellationToken) -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: HashSet::new(),
            root_token,
        }
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
        self.index.insert(id, self.nodes.len());
        self.nodes.push(guard);
        id
    }

    /// Declares that `dependent` must finish closing before `dependency`
    /// starts. Unknown ids and self-dependencies are rejected here; cycles
    /// are caught by `build`.
    pub fn register_dependency(
        &mut self,
        dependent: ResourceId,
        dependency: ResourceId,
    ) -> Result<(), GraphError> {
        if dependent == dependency {
            return Err(GraphError::SelfDependency(dependent));
        }
        let d = *self
            .index
            .get(&dependent)
            .ok_or(GraphError::UnknownResource(dependent))?;
        let p = *self
            .index
            .get(&dependency)
            .ok_or(GraphError::UnknownResource(dependency))?;
        self.edges.insert((d, p));
        Ok(())
    }

    /// Validates the edge set and computes topological levels.
    ///
    /// Kahn-style layering: level 0 holds the resources nothing depends on;
    /// a resource lands in the first level after all of its dependents.
    /// Leftover nodes mean a cycle, reported with the names involved and
    /// with zero resources closed.
    pub fn build(self) -> Result<ShutdownGraph, GraphError> {
        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for &(d, p) in &self.edges {
            successors[d].push(p);
            in_degree[p] += 1;
        }

        let mut levels: Vec<Vec<usize>> = Vec::new();
        let mut placed = vec![false; n];
        let mut current: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        while !current.is_empty() {
            for &i in &current {
                placed[i] = true;
            }
            let mut next = Vec::new();
            for &d in &current {
                for &p in &successors[d] {
                    in_degree[p] -= 1;
                    if in_degree[p] == 0 {
                        next.push(p);
                    }
                }
            }
            // Registration order within a level keeps reports deterministic.
            next.sort_unstable();
            levels.push(std::mem::take(&mut current));
            current = next;
        }

        if placed.iter().any(|done| !done) {
            let names = self
                .nodes
                .iter()
                .enumerate()
                .filter(|(i, _)| !placed[*i])
                .map(|(_, guard)| guard.name().to_string())
                .collect();
            return Err(GraphError::CycleDetected { names });
        }

        Ok(ShutdownGraph {
            nodes: self.nodes,
            levels,
            root_token: self.root_token,
        })
    }
}

impl Default for ShutdownGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Frozen shutdown topology. Once built, the edge set never changes and a
/// shutdown run always yields a complete report.
pub struct ShutdownGraph {
    nodes: Vec<Arc<CloseGuard>>,
    levels: Vec<Vec<usize>>,
    root_token: CancellationToken,
}

impl std::fmt::Debug for ShutdownGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownGraph")
            .field("len", &self.nodes.len())
            .field("levels", &self.levels)
            .finish()
    }
}

impl ShutdownGraph {
    /// Cancelled the moment a shutdown run begins.
    pub fn root_token(&self) -> &CancellationToken {
        &self.root_token
    }

    pub fn child_token(&self) -> CancellationToken {
        self.root_token.child_token()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Closes every resource, level by level, and reports each one's fate.
    ///
    /// Level k+1 does not begin until everything in level k has succeeded,
    /// failed or timed out; no failure stops the run. The report flattens
    /// levels in order, registration order within each level.
    pub async fn shutdown(&self, config: &ShutdownConfig) -> ShutdownReport {
        self.root_token.cancel();
        log::info!(
            "Shutdown started: {} resources across {} levels",
            self.nodes.len(),
            self.levels.len()
        );

        let supervisor = TimeoutSupervisor::from_config(config);
        let mut outcomes = Vec::with_capacity(self.nodes.len());
        for (level_idx, level) in self.levels.iter().enumerate() {
            let mut composite = CompositeCloser::new();
            for &node in level {
                composite.register_guard(Arc::clone(&self.nodes[node]));
            }
            outcomes.append(&mut composite.run(&supervisor, level_idx).await);
        }

        let report = ShutdownReport { outcomes };
        if report.is_clean() {
            log::info!("Shutdown completed cleanly");
        } else {
            log::warn!(
                "Shutdown completed with {} unresolved resources",
                report.failures().count()
            );
        }
        report
    }
}
