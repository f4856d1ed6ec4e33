// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! `pm device` - push-notification device registration

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};

use crate::client::DaemonClient;
use pm_core::DevicePlatform;

#[derive(Args)]
pub struct DeviceArgs {
    #[command(subcommand)]
    pub command: DeviceCommand,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Platform {
    Ios,
    Android,
}

impl From<Platform> for DevicePlatform {
    fn from(p: Platform) -> Self {
        match p {
            Platform::Ios => DevicePlatform::Ios,
            Platform::Android => DevicePlatform::Android,
        }
    }
}

#[derive(Subcommand)]
pub enum DeviceCommand {
    /// Register a device token
    Register {
        /// Opaque push token
        token: String,
        /// Platform the token was issued by
        #[arg(value_enum)]
        platform: Platform,
    },
    /// Remove a device token
    Unregister {
        /// Opaque push token
        token: String,
    },
}

pub async fn run(client: &DaemonClient, args: DeviceArgs) -> Result<()> {
    match args.command {
        DeviceCommand::Register { token, platform } => {
            client.register_device(token, platform.into()).await?;
            println!("registered");
        }
        DeviceCommand::Unregister { token } => {
            client.unregister_device(&token).await?;
            println!("unregistered");
        }
    }
    Ok(())
}
