#![allow(dead_code)]

use std::path::PathBuf;

use probeflow::job::{ConditionSpec, Job, Routine, TaskSpec};
use probeflow::types::{ParserKind, ProbeKind};

/// Builder for `Job` to simplify test setup.
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            job: Job::new(name, ""),
        }
    }

    pub fn start(mut self, routine: &str) -> Self {
        self.job.start = routine.to_string();
        self
    }

    pub fn routine(mut self, name: &str, routine: Routine) -> Self {
        self.job.routines.insert(name.to_string(), routine);
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

/// Builder for `Routine`.
pub struct RoutineBuilder {
    routine: Routine,
}

impl RoutineBuilder {
    pub fn probe(probe: ProbeKind, timeout_secs: u64) -> Self {
        Self {
            routine: Routine::new(TaskSpec::Probe {
                probe,
                timeout_secs,
            }),
        }
    }

    pub fn command(cmd: &str, timeout_secs: u64) -> Self {
        Self {
            routine: Routine::new(TaskSpec::Command {
                cmd: cmd.to_string(),
                timeout_secs,
                output: "command.out".to_string(),
                parser: None,
            }),
        }
    }

    /// Set output file and parser of a command task.
    pub fn output(mut self, name: &str, parser: Option<ParserKind>) -> Self {
        if let TaskSpec::Command {
            output: o,
            parser: p,
            ..
        } = &mut self.routine.task
        {
            *o = name.to_string();
            *p = parser;
        }
        self
    }

    pub fn condition(mut self, condition: ConditionSpec) -> Self {
        self.routine.condition = condition;
        self
    }

    pub fn when_file_exists(self, path: impl Into<PathBuf>) -> Self {
        self.condition(ConditionSpec::FileExists { path: path.into() })
    }

    pub fn when_command(self, cmd: &str) -> Self {
        self.condition(ConditionSpec::Command {
            cmd: cmd.to_string(),
            timeout_secs: 5,
        })
    }

    pub fn on_success(mut self, next: &str) -> Self {
        self.routine.on_success = Some(next.to_string());
        self
    }

    pub fn on_failure(mut self, next: &str) -> Self {
        self.routine.on_failure = Some(next.to_string());
        self
    }

    pub fn build(self) -> Routine {
        self.routine
    }
}
