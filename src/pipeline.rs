//! Build-Step Graph
//!
//! Builds are modelled as a directed acyclic graph of steps. An edge from
//! step `a` to step `b` states that `b` may only start once `a` completed
//! successfully. Steps without a path between them are independent and run
//! concurrently.
//!
//! Execution proceeds in waves. Each wave runs every pending step whose
//! predecessors all completed, on a `rayon` thread-pool. A step whose
//! predecessor failed, or was skipped, is never run and is marked skipped.
//! By default a failure also stops all steps that have not started yet
//! (fail-fast). With `keep_going`, only steps depending on the failure are
//! skipped.

use petgraph;
use rayon::prelude::*;

/// Handle of a step in a `Graph`.
pub type StepId = petgraph::graph::NodeIndex;

/// Pipeline Errors
///
/// Errors preventing execution of a graph. Failures of individual steps are
/// not errors of the pipeline, they are reported via `Outcome`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The graph contains a cycle, so no valid execution order exists.
    #[error("build-step graph contains a cycle")]
    Cycle,
    /// The worker pool could not be created.
    #[error("cannot create worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Step Status
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    /// The step has not run, yet.
    Pending,
    /// The step ran and succeeded.
    Completed,
    /// The step ran and failed.
    Failed,
    /// The step was not run due to an earlier failure.
    Skipped,
}

/// Execution Options
#[derive(Clone, Debug, Default)]
pub struct Options {
    /// Keep running steps that do not depend on a failed step.
    pub keep_going: bool,
    /// Maximum number of concurrently running steps. Defaults to the number
    /// of available CPUs.
    pub jobs: Option<usize>,
}

/// Execution Outcome
///
/// Final status of every step of a graph, plus the errors of all failed
/// steps in the order they were observed.
#[derive(Debug)]
pub struct Outcome<E> {
    statuses: Vec<Status>,
    errors: Vec<(StepId, E)>,
}

impl<E> Outcome<E> {
    pub fn status(&self, id: StepId) -> Status {
        self.statuses[id.index()]
    }

    pub fn errors(&self) -> &[(StepId, E)] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<(StepId, E)> {
        self.errors
    }

    /// Whether every step completed.
    pub fn is_success(&self) -> bool {
        self.statuses.iter().all(|v| *v == Status::Completed)
    }
}

/// Build-Step Graph
#[derive(Debug)]
pub struct Graph<T> {
    graph: petgraph::graph::DiGraph<T, ()>,
}

impl<T> Default for Graph<T> {
    fn default() -> Self {
        Self {
            graph: petgraph::graph::DiGraph::new(),
        }
    }
}

impl<T> Graph<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step and return its handle.
    pub fn add_step(&mut self, step: T) -> StepId {
        self.graph.add_node(step)
    }

    /// Order two steps
    ///
    /// Declare that `after` must not start before `before` completed
    /// successfully.
    pub fn add_edge(&mut self, before: StepId, after: StepId) {
        self.graph.update_edge(before, after, ());
    }

    pub fn step(&self, id: StepId) -> &T {
        &self.graph[id]
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

impl<T> Graph<T>
where
    T: std::fmt::Display + Sync,
{
    /// Execute the graph
    ///
    /// Run every step through `run`, honoring the declared order. Returns
    /// the outcome of all steps, or an error if the graph cannot be
    /// executed at all. No step is run in the latter case.
    pub fn execute<E, F>(&self, options: &Options, run: F) -> Result<Outcome<E>, Error>
    where
        E: Send,
        F: Fn(&T) -> Result<(), E> + Sync,
    {
        let order = petgraph::algo::toposort(&self.graph, None)
            .map_err(|_| Error::Cycle)?;

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(jobs) = options.jobs {
            builder = builder.num_threads(jobs);
        }
        let pool = builder.build()?;

        let mut statuses = vec![Status::Pending; self.graph.node_count()];
        let mut errors = Vec::new();

        loop {
            // Walk the steps in topological order, so the status of all
            // predecessors is final (or pending) when a step is looked at.
            let mut ready = Vec::new();
            for &id in order.iter() {
                if statuses[id.index()] != Status::Pending {
                    continue;
                }

                let mut blocked = false;
                let mut waiting = false;
                for dep in self.graph.neighbors_directed(id, petgraph::Direction::Incoming) {
                    match statuses[dep.index()] {
                        Status::Completed => {},
                        Status::Pending => waiting = true,
                        Status::Failed | Status::Skipped => blocked = true,
                    }
                }

                if blocked {
                    tracing::warn!(step = %self.graph[id], "skipped due to failed dependency");
                    statuses[id.index()] = Status::Skipped;
                } else if !waiting {
                    ready.push(id);
                }
            }

            // The earliest pending step in topological order is always either
            // ready or skipped, so nothing is pending once no step is ready.
            if ready.is_empty() {
                break;
            }

            tracing::debug!(steps = ready.len(), "running wave");

            let results: Vec<(StepId, Result<(), E>)> = pool.install(|| {
                ready.par_iter()
                    .map(|&id| {
                        let step = &self.graph[id];
                        tracing::info!(step = %step, "running");
                        (id, run(step))
                    })
                    .collect()
            });

            let mut failed = false;
            for (id, result) in results {
                match result {
                    Ok(()) => {
                        statuses[id.index()] = Status::Completed;
                    },
                    Err(e) => {
                        tracing::error!(step = %self.graph[id], "failed");
                        statuses[id.index()] = Status::Failed;
                        errors.push((id, e));
                        failed = true;
                    },
                }
            }

            if failed && !options.keep_going {
                for v in statuses.iter_mut().filter(|v| **v == Status::Pending) {
                    *v = Status::Skipped;
                }
                break;
            }
        }

        Ok(Outcome {
            statuses: statuses,
            errors: errors,
        })
    }
}
