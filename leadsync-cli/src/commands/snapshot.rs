//! `leadsync snapshot` — inspect or reset the stored snapshot.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use leadsync_core::SnapshotLocation;
use leadsync_sync::{pipeline, StorageError};

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// Print where the snapshot lives and how many rows it holds.
    Show {
        /// Print the stored rows as JSON instead of a summary.
        #[arg(long)]
        json: bool,

        /// Override `LEADSYNC_DATA_DIR`.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Delete the snapshot; the next run re-sends every row.
    Clear {
        /// Override `LEADSYNC_DATA_DIR`.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

pub fn run(command: SnapshotCommand) -> Result<()> {
    match command {
        SnapshotCommand::Show { json, data_dir } => show(location(data_dir)?, json),
        SnapshotCommand::Clear { data_dir } => clear(location(data_dir)?),
    }
}

fn location(data_dir: Option<PathBuf>) -> Result<SnapshotLocation> {
    let mut location = SnapshotLocation::from_env().context("invalid configuration")?;
    if let Some(dir) = data_dir {
        location.data_dir = dir;
    }
    Ok(location)
}

fn show(location: SnapshotLocation, json: bool) -> Result<()> {
    let store = pipeline::snapshot_store(&location);
    let path = store.blobs().blob_path(store.key());
    let snapshot = match store.load() {
        Ok(snapshot) => Some(snapshot),
        Err(StorageError::NotFound { .. }) => None,
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    if json {
        let records = snapshot.map(|s| s.records).unwrap_or_default();
        println!(
            "{}",
            serde_json::to_string_pretty(&records).context("failed to serialize snapshot")?
        );
        return Ok(());
    }

    match snapshot {
        Some(snapshot) => println!("{}: {} rows", path.display(), snapshot.len()),
        None => println!("{}: no snapshot yet", path.display()),
    }
    Ok(())
}

fn clear(location: SnapshotLocation) -> Result<()> {
    let store = pipeline::snapshot_store(&location);
    let path = store.blobs().blob_path(store.key());
    let removed = store
        .clear()
        .with_context(|| format!("failed to remove {}", path.display()))?;
    if removed {
        println!("removed {}", path.display());
    } else {
        println!("nothing to remove at {}", path.display());
    }
    Ok(())
}
