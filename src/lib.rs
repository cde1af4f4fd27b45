//! Client for the dbt Cloud run API (v2).
//!
//! Triggers job runs, checks and waits on their status, cancels them and
//! fetches the artifacts they produce.
//!
//! ```no_run
//! use dbt_runner::{ClientConfig, PollOptions, RunApi, RunClient, TriggerRun};
//!
//! # async fn example() -> dbt_runner::Result<()> {
//! let client = RunClient::new(ClientConfig::new(
//!     "https://cloud.getdbt.com",
//!     "dbtc_api_key",
//!     "12345",
//!     "678",
//! ))?;
//!
//! let run_id = client
//!     .trigger_run(42, &TriggerRun::new("nightly").git_branch("refs/heads/main"))
//!     .await?;
//! client
//!     .poll_until_terminal(run_id, &PollOptions::default(), |_| {})
//!     .await?;
//! let manifest = client.get_run_artifact(run_id, "manifest.json", None).await?;
//! # let _ = manifest;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod poll;
pub mod runtime;
pub mod status;
pub mod trigger;

pub use client::{RunApi, RunClient, write_artifact};
pub use config::ClientConfig;
pub use error::{Result, RunError};
pub use poll::{PollOptions, poll_until_terminal};
pub use status::RunStatus;
pub use trigger::TriggerRun;
