use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::{
    client::{RunApi, write_artifact},
    poll::{PollOptions, poll_until_terminal},
    runtime::Runtime,
    status::RunStatus,
    trigger::TriggerRun,
};

pub mod config;

/// Where an artifact is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactSource {
    /// Latest artifact of a job.
    Job(u64),
    /// Artifact of a specific run, optionally of one step.
    Run { run_id: u64, step: Option<u32> },
}

/// Triggers a job and, when `wait` is given, polls the new run to completion.
#[tracing::instrument(skip(api, runtime, request, out))]
pub async fn run<A, R>(
    api: &A,
    runtime: &R,
    job_id: u64,
    request: TriggerRun,
    wait: Option<PollOptions>,
    out: &mut dyn Write,
) -> Result<u64>
where
    A: RunApi + ?Sized,
    R: Runtime + ?Sized,
{
    let run_id = api
        .trigger_run(job_id, &request)
        .await
        .with_context(|| format!("Failed to trigger job {}", job_id))?;

    writeln!(out, "Run {} started: {}", run_id, api.status_link(run_id))?;

    if let Some(options) = wait {
        wait_for(api, runtime, run_id, &options, out).await?;
    }

    Ok(run_id)
}

#[tracing::instrument(skip(api, out))]
pub async fn status<A: RunApi + ?Sized>(api: &A, run_id: u64, out: &mut dyn Write) -> Result<()> {
    let status = api
        .get_run_status(run_id)
        .await
        .with_context(|| format!("Failed to get status of run {}", run_id))?;
    writeln!(out, "{}", status)?;
    Ok(())
}

/// Polls a run until it finishes and prints the final status.
#[tracing::instrument(skip(api, runtime, out))]
pub async fn wait_for<A, R>(
    api: &A,
    runtime: &R,
    run_id: u64,
    options: &PollOptions,
    out: &mut dyn Write,
) -> Result<RunStatus>
where
    A: RunApi + ?Sized,
    R: Runtime + ?Sized,
{
    info!("Waiting for run {} ({:?} between checks)", run_id, options.interval);

    let status = poll_until_terminal(api, runtime, run_id, options, |status| {
        debug!("Observed status {} for run {}", status, run_id)
    })
    .await?;

    writeln!(out, "Run {} finished: {}", run_id, status)?;
    Ok(status)
}

/// Cancels a run. Fails when the API does not report success.
#[tracing::instrument(skip(api, out))]
pub async fn cancel<A: RunApi + ?Sized>(api: &A, run_id: u64, out: &mut dyn Write) -> Result<()> {
    let cancelled = api
        .cancel_run(run_id)
        .await
        .with_context(|| format!("Failed to cancel run {}", run_id))?;

    if !cancelled {
        bail!("The API did not confirm cancellation of run {}", run_id);
    }

    writeln!(out, "Run {} cancelled", run_id)?;
    Ok(())
}

/// Fetches an artifact and writes it to `output`, or to `out` when no path is given.
#[tracing::instrument(skip(api, out))]
pub async fn artifact<A: RunApi + ?Sized>(
    api: &A,
    source: ArtifactSource,
    name: &str,
    output: Option<&Path>,
    out: &mut dyn Write,
) -> Result<()> {
    let content = match source {
        ArtifactSource::Job(job_id) => api
            .get_job_artifact(job_id, name)
            .await
            .with_context(|| format!("Failed to fetch artifact {} of job {}", name, job_id))?,
        ArtifactSource::Run { run_id, step } => api
            .get_run_artifact(run_id, name, step)
            .await
            .with_context(|| format!("Failed to fetch artifact {} of run {}", name, run_id))?,
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {:?}", parent))?;
            }
            let mut file =
                File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
            let bytes = write_artifact(&content, &mut file)
                .with_context(|| format!("Failed to write {:?}", path))?;
            info!("Saved {} ({} bytes) to {:?}", name, bytes, path);
        }
        None => {
            write_artifact(&content, out)?;
        }
    }

    Ok(())
}

pub fn link<A: RunApi + ?Sized>(api: &A, run_id: u64, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "{}", api.status_link(run_id))?;
    Ok(())
}
