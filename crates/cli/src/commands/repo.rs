// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! `pm repo` - repository registration commands

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::client::DaemonClient;
use pm_core::RepoId;

#[derive(Args)]
pub struct RepoArgs {
    #[command(subcommand)]
    pub command: RepoCommand,
}

#[derive(Subcommand)]
pub enum RepoCommand {
    /// Register a repository
    Add {
        /// Display name
        name: String,

        /// Git remote to shallow-clone into each run's workspace
        #[arg(long)]
        git_url: Option<String>,
    },
    /// List registered repositories
    List,
    /// Show a single repository
    Show {
        /// Repo ID
        id: String,
    },
    /// Remove a repository (fails if it has an active run)
    Remove {
        /// Repo ID
        id: String,
    },
}

pub async fn run(client: &DaemonClient, args: RepoArgs) -> Result<()> {
    match args.command {
        RepoCommand::Add { name, git_url } => {
            let repo = client.create_repo(name, git_url).await?;
            println!("{}", serde_json::to_string_pretty(&repo)?);
        }
        RepoCommand::List => {
            let repos = client.list_repos().await?;
            println!("{}", serde_json::to_string_pretty(&repos)?);
        }
        RepoCommand::Show { id } => {
            let repo = client.get_repo(RepoId::from_string(id)).await?;
            println!("{}", serde_json::to_string_pretty(&repo)?);
        }
        RepoCommand::Remove { id } => {
            client.delete_repo(RepoId::from_string(id)).await?;
            println!("removed");
        }
    }
    Ok(())
}
