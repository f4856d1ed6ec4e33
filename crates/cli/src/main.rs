// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! `pm` entry point: parses arguments, builds a [`DaemonClient`], dispatches.

use anyhow::Result;
use clap::{Parser, Subcommand};

use pm::client::DaemonClient;
use pm::commands::{approval, device, repo, run};
use pm::env::PROTOCOL_VERSION;

#[derive(Parser)]
#[command(name = "pm", version = PROTOCOL_VERSION, about = "Operator CLI for the Project M control plane")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Repository registration
    Repo(repo::RepoArgs),
    /// Run lifecycle and event streaming
    Run(run::RunArgs),
    /// Approval review
    Approval(approval::ApprovalArgs),
    /// Push-notification device registration
    Device(device::DeviceArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = DaemonClient::new()?;

    match cli.command {
        Command::Repo(args) => repo::run(&client, args).await,
        Command::Run(args) => run::run(&client, args).await,
        Command::Approval(args) => approval::run(&client, args).await,
        Command::Device(args) => device::run(&client, args).await,
    }
}
