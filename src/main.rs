use anyhow::Result;
use clap::Parser;
use dbt_runner::{
    PollOptions, TriggerRun,
    commands::{self, ArtifactSource, config::Config},
    config::DEFAULT_API_BASE,
    poll::DEFAULT_POLL_INTERVAL_SECS,
    runtime::RealRuntime,
    trigger::DEFAULT_CAUSE,
};
use std::path::PathBuf;
use std::time::Duration;

/// dbt-runner - trigger and monitor dbt Cloud job runs
///
/// Connection settings can also be given through the environment:
/// DBT_CLOUD_API_BASE, DBT_CLOUD_API_KEY, DBT_CLOUD_ACCOUNT_ID and
/// DBT_CLOUD_PROJECT_ID.
///
/// Examples:
///   dbt-runner run 1234 --git-branch refs/heads/main --wait
///   dbt-runner artifact manifest.json --run 5678 --output target/manifest.json
#[derive(Parser, Debug)]
#[command(author, version = env!("DBT_RUNNER_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the API
    #[arg(long, env = "DBT_CLOUD_API_BASE", default_value = DEFAULT_API_BASE, global = true)]
    api_base: String,

    /// API token
    #[arg(long, env = "DBT_CLOUD_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Account identifier
    #[arg(long, env = "DBT_CLOUD_ACCOUNT_ID", global = true)]
    account_id: Option<String>,

    /// Project identifier
    #[arg(long, env = "DBT_CLOUD_PROJECT_ID", global = true)]
    project_id: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    timeout: Option<u64>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Trigger a job run
    Run(RunArgs),

    /// Print the status of a run
    Status(RunIdArgs),

    /// Wait for a run to finish
    Wait(WaitArgs),

    /// Cancel a run
    Cancel(RunIdArgs),

    /// Fetch an artifact of a job or a run
    Artifact(ArtifactArgs),

    /// Print the browser link of a run
    Link(RunIdArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Job to run
    #[arg(value_name = "JOB_ID")]
    job_id: u64,

    /// Reason recorded on the run
    #[arg(long, default_value = DEFAULT_CAUSE)]
    cause: String,

    /// Git branch to run from (a leading refs/heads/ is removed)
    #[arg(long, conflicts_with = "git_sha")]
    git_branch: Option<String>,

    /// Git commit to run from
    #[arg(long)]
    git_sha: Option<String>,

    /// Target schema for the run (hyphens become underscores)
    #[arg(long)]
    schema_override: Option<String>,

    /// Command to run instead of the job's steps; repeat for several steps
    #[arg(long = "step", value_name = "COMMAND")]
    steps: Vec<String>,

    /// Azure DevOps pull request the run belongs to
    #[arg(long)]
    pull_request_id: Option<u64>,

    /// Wait for the run to finish
    #[arg(long)]
    wait: bool,

    #[command(flatten)]
    poll: PollArgs,
}

#[derive(clap::Args, Debug)]
struct RunIdArgs {
    #[arg(value_name = "RUN_ID")]
    run_id: u64,
}

#[derive(clap::Args, Debug)]
struct WaitArgs {
    #[arg(value_name = "RUN_ID")]
    run_id: u64,

    #[command(flatten)]
    poll: PollArgs,
}

#[derive(clap::Args, Debug)]
struct PollArgs {
    /// Seconds between status checks
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    poll_interval: u64,

    /// Give up waiting after this many seconds
    #[arg(long, value_name = "SECS")]
    max_wait: Option<u64>,
}

impl PollArgs {
    fn options(&self) -> PollOptions {
        let options = PollOptions::new(Duration::from_secs(self.poll_interval));
        match self.max_wait {
            Some(secs) => options.with_timeout(Duration::from_secs(secs)),
            None => options,
        }
    }
}

#[derive(clap::Args, Debug)]
struct ArtifactArgs {
    /// Artifact file name, e.g. manifest.json
    #[arg(value_name = "NAME")]
    name: String,

    /// Latest artifact of this job
    #[arg(long, conflicts_with_all = ["run", "step"], required_unless_present = "run")]
    job: Option<u64>,

    /// Artifact of this run
    #[arg(long)]
    run: Option<u64>,

    /// Step of the run that produced the artifact
    #[arg(long, requires = "run")]
    step: Option<u32>,

    /// Write to this file instead of stdout
    #[arg(long, short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,
}

impl ArtifactArgs {
    fn source(&self) -> ArtifactSource {
        match (self.job, self.run) {
            (Some(job_id), _) => ArtifactSource::Job(job_id),
            (None, Some(run_id)) => ArtifactSource::Run {
                run_id,
                step: self.step,
            },
            (None, None) => unreachable!("clap requires --job or --run"),
        }
    }
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            api_base: self.api_base.clone(),
            api_key: self.api_key.clone().unwrap_or_default(),
            account_id: self.account_id.clone().unwrap_or_default(),
            project_id: self.project_id.clone().unwrap_or_default(),
            timeout_secs: self.timeout,
        }
    }
}

fn trigger_request(args: &RunArgs) -> TriggerRun {
    let mut request = TriggerRun::new(args.cause.clone());
    if let Some(branch) = &args.git_branch {
        request = request.git_branch(branch.clone());
    }
    if let Some(sha) = &args.git_sha {
        request = request.git_sha(sha.clone());
    }
    if let Some(schema) = &args.schema_override {
        request = request.schema_override(schema.clone());
    }
    if !args.steps.is_empty() {
        request = request.steps_override(args.steps.clone());
    }
    if let Some(id) = args.pull_request_id {
        request = request.pull_request_id(id);
    }
    request
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("dbt_runner=info"))
        .init();
    let cli = Cli::parse();
    let client = cli.config().build_client()?;
    let runtime = RealRuntime;
    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Commands::Run(args) => {
            let wait = args.wait.then(|| args.poll.options());
            commands::run(
                &client,
                &runtime,
                args.job_id,
                trigger_request(args),
                wait,
                &mut stdout,
            )
            .await?;
        }
        Commands::Status(args) => commands::status(&client, args.run_id, &mut stdout).await?,
        Commands::Wait(args) => {
            commands::wait_for(
                &client,
                &runtime,
                args.run_id,
                &args.poll.options(),
                &mut stdout,
            )
            .await?;
        }
        Commands::Cancel(args) => commands::cancel(&client, args.run_id, &mut stdout).await?,
        Commands::Artifact(args) => {
            commands::artifact(
                &client,
                args.source(),
                &args.name,
                args.output.as_deref(),
                &mut stdout,
            )
            .await?
        }
        Commands::Link(args) => commands::link(&client, args.run_id, &mut stdout)?,
    }
    Ok(())
}
