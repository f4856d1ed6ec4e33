// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! `pm run` - run lifecycle and event-stream commands

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use futures_util::StreamExt;
use pm_core::{RepoId, RunId};
use pm_wire::ServerFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::client::DaemonClient;

#[derive(Args)]
pub struct RunArgs {
    #[command(subcommand)]
    pub command: RunCommand,
}

#[derive(Subcommand)]
pub enum RunCommand {
    /// Start a run against a repository
    Start {
        /// Repo ID
        repo_id: String,
        /// Prompt handed to the agent
        prompt: String,
    },
    /// List runs for a repository
    List {
        /// Repo ID
        repo_id: String,
    },
    /// Show a single run
    Show {
        /// Run ID
        id: String,
    },
    /// Cancel a run
    Cancel {
        /// Run ID
        id: String,
    },
    /// Send free-form input to a run waiting on it
    Input {
        /// Run ID
        id: String,
        /// Text delivered to the blocked hook call
        text: String,
    },
    /// Tail a run's event stream (replay + live)
    Watch {
        /// Run ID
        id: String,
        /// Resume from this seq instead of the beginning
        #[arg(long, default_value = "0")]
        from_seq: u64,
    },
}

pub async fn run(client: &DaemonClient, args: RunArgs) -> Result<()> {
    match args.command {
        RunCommand::Start { repo_id, prompt } => {
            let run = client.start_run(RepoId::from_string(repo_id), prompt).await?;
            println!("{}", serde_json::to_string_pretty(&run)?);
        }
        RunCommand::List { repo_id } => {
            let runs = client.list_runs(RepoId::from_string(repo_id)).await?;
            println!("{}", serde_json::to_string_pretty(&runs)?);
        }
        RunCommand::Show { id } => {
            let run = client.get_run(RunId::from_string(id)).await?;
            println!("{}", serde_json::to_string_pretty(&run)?);
        }
        RunCommand::Cancel { id } => {
            client.cancel_run(RunId::from_string(id)).await?;
            println!("cancelled");
        }
        RunCommand::Input { id, text } => {
            client.send_input(RunId::from_string(id), text).await?;
            println!("sent");
        }
        RunCommand::Watch { id, from_seq } => {
            watch(client, RunId::from_string(id), from_seq).await?;
        }
    }
    Ok(())
}

async fn watch(client: &DaemonClient, run_id: RunId, from_seq: u64) -> Result<()> {
    let url = client.events_ws_url(run_id, from_seq);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url).await.context("connecting to event stream")?;
    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        let msg = msg.context("reading event frame")?;
        match msg {
            Message::Text(text) => match serde_json::from_str::<ServerFrame>(&text) {
                Ok(ServerFrame::Event { event }) => {
                    println!("[{:>6}] {:?} {}", event.seq, event.kind, event.data);
                }
                Ok(ServerFrame::State { state }) => {
                    println!("--- state: {state:?} ---");
                }
                Ok(ServerFrame::Ping) => {
                    use futures_util::SinkExt;
                    let pong = serde_json::json!({"type": "pong"}).to_string();
                    write.send(Message::Text(pong.into())).await.context("sending pong")?;
                }
                Err(_) => {}
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}
