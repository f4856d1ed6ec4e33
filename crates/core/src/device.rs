// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Device token registration. Push delivery itself is an external collaborator's
//! concern (spec §1); this type only gives the Escalation Tracker a target set.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePlatform {
    Ios,
    Android,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub token: String,
    pub platform: DevicePlatform,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
