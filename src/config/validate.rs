// src/config/validate.rs

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::config::model::{ConfigFile, ProbeConfig, RawConfigFile};
use crate::errors::{ProbeflowError, Result};
use crate::job::{Job, TaskSpec, validate_job};
use crate::types::ProbeKind;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ProbeflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_jobs(&raw)?;
        validate_global_config(&raw)?;
        let probe = validate_probes(&raw)?;
        let job = name_jobs(raw.job);

        for job in job.values() {
            validate_job(job)?;
            validate_tasks(job, &probe)?;
        }

        Ok(ConfigFile::new_unchecked(raw.config, probe, job))
    }
}

fn ensure_has_jobs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(ProbeflowError::ConfigError(
            "config must contain at least one [job.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.interval_secs == 0 {
        return Err(ProbeflowError::ConfigError(
            "[config].interval_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_probes(cfg: &RawConfigFile) -> Result<BTreeMap<ProbeKind, ProbeConfig>> {
    let mut probes = BTreeMap::new();
    for (name, probe) in cfg.probe.iter() {
        let kind = ProbeKind::from_str(name)
            .map_err(|e| ProbeflowError::ConfigError(format!("[probe.{name}]: {e}")))?;
        if probe.cmd.trim().is_empty() {
            return Err(ProbeflowError::ConfigError(format!(
                "[probe.{name}].cmd must not be empty"
            )));
        }
        probes.insert(kind, probe.clone());
    }
    Ok(probes)
}

/// The job name is the table key; a `name` inside the table is ignored.
fn name_jobs(jobs: BTreeMap<String, Job>) -> BTreeMap<String, Job> {
    jobs.into_iter()
        .map(|(name, mut job)| {
            job.name = name.clone();
            (name, job)
        })
        .collect()
}

fn validate_tasks(job: &Job, probes: &BTreeMap<ProbeKind, ProbeConfig>) -> Result<()> {
    for (name, routine) in job.routines.iter() {
        if routine.task.timeout_secs() == 0 {
            return Err(ProbeflowError::ConfigError(format!(
                "routine '{}' of job '{}' must have timeout_secs >= 1",
                name, job.name
            )));
        }

        if let TaskSpec::Probe { probe, .. } = &routine.task {
            if !probes.contains_key(probe) {
                return Err(ProbeflowError::ConfigError(format!(
                    "routine '{}' of job '{}' uses probe '{}' but no [probe.{}] is configured",
                    name, job.name, probe, probe
                )));
            }
        }
    }
    Ok(())
}
