//! `leadsync run` — run the sync job once and print its response object.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use leadsync_core::Config;
use leadsync_sync::{pipeline, JobResponse};

/// Arguments for `leadsync run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Query and diff only: no CRM writes and no snapshot update.
    #[arg(long)]
    pub dry_run: bool,

    /// Pretty-print the response object.
    #[arg(long)]
    pub pretty: bool,

    /// Override `LEADSYNC_DATA_DIR` for this run.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let mut config = Config::from_env().context("invalid configuration")?;
        if let Some(dir) = self.data_dir {
            config.snapshot.data_dir = dir;
        }
        tracing::debug!(?config, "loaded configuration");

        let result = pipeline::run(&config, self.dry_run);
        if let Err(err) = &result {
            tracing::error!(error = %err, "sync job failed");
        }

        let response = JobResponse::from(&result);
        let json = if self.pretty {
            serde_json::to_string_pretty(&response)
        } else {
            serde_json::to_string(&response)
        }
        .context("failed to serialize response")?;
        println!("{json}");

        if !response.is_success() {
            bail!("sync job finished with status {}", response.status_code);
        }
        Ok(())
    }
}
