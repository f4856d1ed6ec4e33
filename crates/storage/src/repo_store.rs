// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Repository and device-token persistence. Neither is a named kernel
//! component, but the Kernel Façade table (spec §4.9) needs somewhere to
//! put them, and the Escalation Tracker needs a device target set.

use async_trait::async_trait;
use pm_core::{Device, Repo, RepoId};

use crate::error::StorageError;

#[async_trait]
pub trait RepoStore: Send + Sync + 'static {
    async fn insert(&self, repo: Repo) -> Result<(), StorageError>;
    async fn get(&self, id: RepoId) -> Result<Option<Repo>, StorageError>;
    async fn list(&self) -> Result<Vec<Repo>, StorageError>;
    async fn delete(&self, id: RepoId) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait DeviceStore: Send + Sync + 'static {
    async fn upsert(&self, device: Device) -> Result<(), StorageError>;
    async fn delete(&self, token: &str) -> Result<bool, StorageError>;
    async fn list(&self) -> Result<Vec<Device>, StorageError>;
}
