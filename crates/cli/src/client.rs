// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Thin HTTP client wrapping `pmd`'s REST surface (spec §6). One method per
//! operation; errors are decoded into [`pm_wire::ErrorBody`] and surfaced as
//! `anyhow::Error` with the daemon's message.

use anyhow::{bail, Context, Result};
use pm_core::{ApprovalId, RepoId, RunId};
use pm_wire::{
    ApprovalSummary, CreateRepoRequest, ErrorBody, RegisterDeviceRequest, ResolveApprovalRequest,
    RepoSummary, RunSummary, SendInputRequest, StartRunRequest,
};
use reqwest::Method;

use crate::env;

pub struct DaemonClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl DaemonClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder().timeout(env::request_timeout()).build().context("building HTTP client")?;
        Ok(Self { base_url: env::daemon_addr(), token: env::operator_token(), http })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send<T: serde::de::DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let resp = req.send().await.context("sending request to daemon")?;
        Self::decode(resp).await
    }

    async fn send_unit(&self, req: reqwest::RequestBuilder) -> Result<()> {
        let resp = req.send().await.context("sending request to daemon")?;
        if resp.status().is_success() {
            return Ok(());
        }
        Self::fail(resp).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        if resp.status().is_success() {
            return resp.json::<T>().await.context("decoding daemon response");
        }
        Self::fail(resp).await
    }

    async fn fail<T>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        match resp.json::<ErrorBody>().await {
            Ok(body) => bail!("{} ({}: {})", status, body.error.code, body.error.message),
            Err(_) => bail!("{status}"),
        }
    }

    pub async fn create_repo(&self, name: String, git_url: Option<String>) -> Result<RepoSummary> {
        let req = self.request(Method::POST, "/api/repos").json(&CreateRepoRequest { name, git_url });
        self.send(req).await
    }

    pub async fn list_repos(&self) -> Result<Vec<RepoSummary>> {
        self.send(self.request(Method::GET, "/api/repos")).await
    }

    pub async fn get_repo(&self, id: RepoId) -> Result<RepoSummary> {
        self.send(self.request(Method::GET, &format!("/api/repos/{id}"))).await
    }

    pub async fn delete_repo(&self, id: RepoId) -> Result<()> {
        self.send_unit(self.request(Method::DELETE, &format!("/api/repos/{id}"))).await
    }

    pub async fn start_run(&self, repo_id: RepoId, prompt: String) -> Result<RunSummary> {
        let req = self.request(Method::POST, &format!("/api/repos/{repo_id}/runs")).json(&StartRunRequest { prompt });
        self.send(req).await
    }

    pub async fn list_runs(&self, repo_id: RepoId) -> Result<Vec<RunSummary>> {
        self.send(self.request(Method::GET, &format!("/api/repos/{repo_id}/runs"))).await
    }

    pub async fn get_run(&self, id: RunId) -> Result<RunSummary> {
        self.send(self.request(Method::GET, &format!("/api/runs/{id}"))).await
    }

    pub async fn cancel_run(&self, id: RunId) -> Result<()> {
        self.send_unit(self.request(Method::POST, &format!("/api/runs/{id}/cancel"))).await
    }

    pub async fn send_input(&self, id: RunId, text: String) -> Result<()> {
        let req = self.request(Method::POST, &format!("/api/runs/{id}/input")).json(&SendInputRequest { text });
        self.send_unit(req).await
    }

    pub async fn list_pending_approvals(&self) -> Result<Vec<ApprovalSummary>> {
        self.send(self.request(Method::GET, "/api/approvals/pending")).await
    }

    pub async fn get_approval(&self, id: ApprovalId) -> Result<ApprovalSummary> {
        self.send(self.request(Method::GET, &format!("/api/approvals/{id}"))).await
    }

    pub async fn resolve_approval(&self, id: ApprovalId, approved: bool, reason: Option<String>) -> Result<ApprovalSummary> {
        let req = self
            .request(Method::POST, &format!("/api/approvals/{id}/resolve"))
            .json(&ResolveApprovalRequest { approved, reason });
        self.send(req).await
    }

    pub async fn register_device(&self, token: String, platform: pm_core::DevicePlatform) -> Result<()> {
        let req = self.request(Method::POST, "/api/devices").json(&RegisterDeviceRequest { token, platform });
        self.send_unit(req).await
    }

    pub async fn unregister_device(&self, token: &str) -> Result<()> {
        self.send_unit(self.request(Method::DELETE, &format!("/api/devices/{token}"))).await
    }

    /// Raw ws:// URL for the per-run event stream, for `pm run watch`.
    pub fn events_ws_url(&self, run_id: RunId, from_seq: u64) -> String {
        let base = self.base_url.replacen("http://", "ws://", 1).replacen("https://", "wss://", 1);
        format!("{base}/api/runs/{run_id}/events?from_seq={from_seq}")
    }

}
