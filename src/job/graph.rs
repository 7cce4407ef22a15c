// src/job/graph.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use tracing::warn;

use crate::errors::{ProbeflowError, Result};
use crate::job::Job;

/// Which successor link an edge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
    Success,
    Failure,
}

impl Branch {
    fn field(&self) -> &'static str {
        match self {
            Branch::Success => "on_success",
            Branch::Failure => "on_failure",
        }
    }
}

/// Job names become directory names under the metadata store.
fn validate_job_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name.contains(['/', '\\']) || name.contains("..") {
        return Err(ProbeflowError::ConfigError(format!(
            "invalid job name '{name}': must be non-empty and contain no '/', '\\' or '..'"
        )));
    }
    Ok(())
}

/// Build the routine graph of a job.
///
/// Edge direction: routine -> successor. Successor names that do not exist
/// are still added as nodes so callers can report them.
fn build_graph(job: &Job) -> DiGraphMap<&str, Branch> {
    let mut graph: DiGraphMap<&str, Branch> = DiGraphMap::new();

    for name in job.routines.keys() {
        graph.add_node(name.as_str());
    }

    for (name, routine) in job.routines.iter() {
        for (branch, next) in [
            (Branch::Success, &routine.on_success),
            (Branch::Failure, &routine.on_failure),
        ] {
            if let Some(next) = next.as_deref().filter(|n| !n.is_empty()) {
                graph.add_edge(name.as_str(), next, branch);
            }
        }
    }

    graph
}

/// Check that a job's routine graph can be walked.
///
/// This checks:
/// - the job name is usable as a single path component
/// - `start` names an existing routine (or is empty)
/// - every `on_success` / `on_failure` refers to an existing routine
/// - the graph has no cycles
///
/// Routines unreachable from `start` are only warned about.
pub fn validate_job(job: &Job) -> Result<()> {
    validate_job_name(&job.name)?;

    if !job.start.is_empty() && !job.routines.contains_key(&job.start) {
        return Err(ProbeflowError::ConfigError(format!(
            "job '{}' starts at unknown routine '{}'",
            job.name, job.start
        )));
    }

    for (name, routine) in job.routines.iter() {
        for (branch, next) in [
            (Branch::Success, &routine.on_success),
            (Branch::Failure, &routine.on_failure),
        ] {
            if let Some(next) = next.as_deref().filter(|n| !n.is_empty()) {
                if !job.routines.contains_key(next) {
                    return Err(ProbeflowError::ConfigError(format!(
                        "routine '{}' of job '{}' has unknown routine '{}' in `{}`",
                        name,
                        job.name,
                        next,
                        branch.field()
                    )));
                }
            }
        }
    }

    let graph = build_graph(job);

    // A topological sort will fail if there is a cycle.
    if let Err(cycle) = toposort(&graph, None) {
        return Err(ProbeflowError::GraphCycle(format!(
            "cycle detected in routines of job '{}' involving routine '{}'",
            job.name,
            cycle.node_id()
        )));
    }

    let reachable = reachable_routines(job);
    for name in job.routines.keys() {
        if !reachable.iter().any(|r| r == name) {
            warn!(job = %job.name, routine = %name, "routine is unreachable from start");
        }
    }

    Ok(())
}

/// Routines reachable from `start`, in depth-first discovery order.
pub fn reachable_routines(job: &Job) -> Vec<String> {
    if job.start.is_empty() || !job.routines.contains_key(&job.start) {
        return Vec::new();
    }

    let graph = build_graph(job);
    let mut dfs = Dfs::new(&graph, job.start.as_str());
    let mut order = Vec::new();
    while let Some(node) = dfs.next(&graph) {
        if job.routines.contains_key(node) {
            order.push(node.to_string());
        }
    }
    order
}
