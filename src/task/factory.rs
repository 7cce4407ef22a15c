// src/task/factory.rs

use std::sync::Arc;
use std::time::Duration;

use crate::errors::{ProbeflowError, Result};
use crate::job::{ConditionSpec, Routine, TaskSpec};
use crate::task::condition::{
    AlwaysCondition, CommandCondition, CpuUsageCondition, FileExistsCondition,
};
use crate::task::command::CommandTask;
use crate::task::{Condition, ProbeRegistry, ProbeTask, TaskContract};

/// The condition and task built for one routine.
pub struct RoutineTasks {
    pub condition: Box<dyn Condition>,
    pub task: Box<dyn TaskContract>,
}

/// Turns routine specs into runnable capabilities.
///
/// The set of kinds is closed: every [`ConditionSpec`] and [`TaskSpec`]
/// variant maps to exactly one implementation here.
#[derive(Debug, Clone)]
pub struct TaskFactory {
    probes: Arc<ProbeRegistry>,
    grace: Duration,
}

impl TaskFactory {
    pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

    pub fn new(probes: ProbeRegistry) -> Self {
        Self {
            probes: Arc::new(probes),
            grace: Self::DEFAULT_GRACE,
        }
    }

    /// Extra time granted past a task's own deadline.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    pub fn build(&self, routine: &Routine) -> Result<RoutineTasks> {
        Ok(RoutineTasks {
            condition: self.build_condition(&routine.condition)?,
            task: self.build_task(&routine.task)?,
        })
    }

    fn build_condition(&self, spec: &ConditionSpec) -> Result<Box<dyn Condition>> {
        let condition: Box<dyn Condition> = match spec {
            ConditionSpec::Always => Box::new(AlwaysCondition),
            ConditionSpec::FileExists { path } => Box::new(FileExistsCondition::new(path.clone())),
            ConditionSpec::CpuUsage {
                threshold_percent,
                sample_ms,
            } => Box::new(CpuUsageCondition::new(
                *threshold_percent,
                Duration::from_millis(*sample_ms),
            )),
            ConditionSpec::Command { cmd, timeout_secs } => {
                Box::new(CommandCondition::new(cmd.clone(), non_zero_secs(*timeout_secs)?))
            }
        };
        Ok(condition)
    }

    fn build_task(&self, spec: &TaskSpec) -> Result<Box<dyn TaskContract>> {
        let task: Box<dyn TaskContract> = match spec {
            TaskSpec::Probe {
                probe,
                timeout_secs,
            } => {
                if !self.probes.contains(*probe) {
                    return Err(ProbeflowError::ConfigError(format!(
                        "no probe loader registered for '{probe}'"
                    )));
                }
                Box::new(ProbeTask::new(
                    *probe,
                    non_zero_secs(*timeout_secs)?,
                    self.grace,
                    Arc::clone(&self.probes),
                ))
            }
            TaskSpec::Command {
                cmd,
                timeout_secs,
                output,
                parser,
            } => Box::new(CommandTask::new(
                cmd.clone(),
                non_zero_secs(*timeout_secs)?,
                output.clone(),
                *parser,
            )),
        };
        Ok(task)
    }
}

fn non_zero_secs(secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(ProbeflowError::ConfigError(
            "timeout_secs must be >= 1".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}
