// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! `pm approval` - approval review commands

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::client::DaemonClient;
use pm_core::ApprovalId;

#[derive(Args)]
pub struct ApprovalArgs {
    #[command(subcommand)]
    pub command: ApprovalCommand,
}

#[derive(Subcommand)]
pub enum ApprovalCommand {
    /// List approvals awaiting a decision
    Pending,
    /// Show a single approval
    Show {
        /// Approval ID
        id: String,
    },
    /// Approve a pending approval
    Approve {
        /// Approval ID
        id: String,
    },
    /// Reject a pending approval
    Reject {
        /// Approval ID
        id: String,
        /// Shown to the agent as the rejection reason
        #[arg(long)]
        reason: Option<String>,
    },
}

pub async fn run(client: &DaemonClient, args: ApprovalArgs) -> Result<()> {
    match args.command {
        ApprovalCommand::Pending => {
            let approvals = client.list_pending_approvals().await?;
            println!("{}", serde_json::to_string_pretty(&approvals)?);
        }
        ApprovalCommand::Show { id } => {
            let approval = client.get_approval(ApprovalId::from_string(id)).await?;
            println!("{}", serde_json::to_string_pretty(&approval)?);
        }
        ApprovalCommand::Approve { id } => {
            let approval = client.resolve_approval(ApprovalId::from_string(id), true, None).await?;
            println!("{}", serde_json::to_string_pretty(&approval)?);
        }
        ApprovalCommand::Reject { id, reason } => {
            let approval = client.resolve_approval(ApprovalId::from_string(id), false, reason).await?;
            println!("{}", serde_json::to_string_pretty(&approval)?);
        }
    }
    Ok(())
}
