// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! A repository: the unit the "one active run at a time" invariant is scoped to.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a repository.
    pub struct RepoId("rep-");
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repo {
    pub id: RepoId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Repo {
    pub fn new(name: impl Into<String>, git_url: Option<String>, created_at: chrono::DateTime<chrono::Utc>) -> Self {
        Self { id: RepoId::new(), name: name.into(), git_url, created_at }
    }
}
