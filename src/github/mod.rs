//! A client for the GitHub REST API that paces itself to stay within the rate limit.
//!
//! See: [`GithubClient`], [`Governor`]

use std::{collections::BTreeSet, fmt::Debug, path::Path};

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, header, redirect};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::{
    error::{Error, Result},
    workflow::{Artifact, Branch, NamedArtifact, Repository, Run, Workflow},
};

mod download_artifact;
mod fake;
mod fetch_artifacts;
mod fetch_default_branch;
mod fetch_latest_run;
mod governor;
mod message;

pub use download_artifact::*;
pub use fetch_artifacts::*;
pub use fetch_default_branch::*;
pub use fetch_latest_run::*;
pub use governor::*;

#[cfg(test)]
pub(crate) use fake::FakeApi;

/// The GitHub REST API version requested on every call.
pub const API_VERSION: &str = "2022-11-28";

/// What the caches need from GitHub.
#[async_trait]
pub trait ArtifactApi: Send + Sync + Debug {
    /// Finds the default branch of a repository.
    async fn default_branch(&self, repo: &Repository) -> Result<Branch>;

    /// Finds the most recent completed run of a workflow on a branch.
    async fn latest_run(&self, workflow: &Workflow, branch: &Branch) -> Result<Run>;

    /// Lists the artifacts produced by a run.
    async fn artifacts(&self, run: &Run) -> Result<BTreeSet<NamedArtifact>>;

    /// Downloads the zip of an artifact to `destination`. Nothing is left at `destination` on failure.
    async fn download_artifact(&self, artifact: &Artifact, destination: &Path) -> Result<()>;
}

/// Talks to the GitHub REST API.
///
/// Every API call goes through [`GithubClient::send`], which holds one lock over waiting for the [`Governor`], sending, and recording the rate-limit headers of the answer. Concurrent callers queue on that lock.
#[derive(Debug)]
pub struct GithubClient {
    api_host: String,
    auth_token: String,
    api: reqwest::Client,
    download: reqwest::Client,
    governor: Mutex<Governor>,
}

impl GithubClient {
    /// Creates a [`GithubClient`] for an API host such as `https://api.github.com`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be built.
    pub fn new(api_host: impl Into<String>, auth_token: impl Into<String>) -> Result<Self> {
        Self::with_governor(api_host, auth_token, Governor::new())
    }

    /// Creates a [`GithubClient`] paced by a specific [`Governor`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be built.
    pub fn with_governor(
        api_host: impl Into<String>,
        auth_token: impl Into<String>,
        governor: Governor,
    ) -> Result<Self> {
        let user_agent = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

        // The artifact endpoint answers with a redirect that must not be followed with our credentials
        let api = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| Error::Internal(anyhow!(e)))?;
        let download = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Internal(anyhow!(e)))?;

        Ok(Self {
            api_host: api_host.into().trim_end_matches('/').to_owned(),
            auth_token: auth_token.into(),
            api,
            download,
            governor: Mutex::new(governor),
        })
    }

    /// The current minimum duration between API calls.
    pub async fn call_interval(&self) -> std::time::Duration {
        self.governor.lock().await.interval()
    }

    /// Builds a `GET` request for an API path such as `/repos/owner/repo`.
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.api
            .get(format!("{}{path}", self.api_host))
            .header(header::ACCEPT, "application/vnd.github+json")
            .bearer_auth(&self.auth_token)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Sends an API request once the rate limit allows it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be built or sent.
    pub async fn send(&self, request: RequestBuilder) -> reqwest::Result<Response> {
        let request = request.build()?;

        let mut governor = self.governor.lock().await;
        governor.wait().await;

        debug!("sending {} {}…", request.method(), request.url());
        let response = self.api.execute(request).await?;
        debug!(
            "got {} {} from {}",
            response.status().as_u16(),
            response.status().canonical_reason().unwrap_or_default(),
            response.url()
        );

        governor.record(response.headers());
        Ok(response)
    }

    /// The client for the unauthenticated download leg, which does not count towards the rate limit.
    pub(crate) fn download_client(&self) -> &reqwest::Client {
        &self.download
    }
}

#[async_trait]
impl ArtifactApi for GithubClient {
    async fn default_branch(&self, repo: &Repository) -> Result<Branch> {
        fetch_default_branch(self, repo).await
    }

    async fn latest_run(&self, workflow: &Workflow, branch: &Branch) -> Result<Run> {
        fetch_latest_run(self, workflow, branch).await
    }

    async fn artifacts(&self, run: &Run) -> Result<BTreeSet<NamedArtifact>> {
        fetch_artifacts(self, run).await
    }

    async fn download_artifact(&self, artifact: &Artifact, destination: &Path) -> Result<()> {
        download_artifact(self, artifact, destination).await
    }
}

/// Encodes a value for use as one segment of an API path.
pub(crate) fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Sends an API request and parses the successful answer as JSON.
pub(crate) async fn fetch_json<T>(client: &GithubClient, url: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let response = client.send(client.get(url)).await.map_err(|err| {
        error!("failed to send request to {url}: {err}");
        Error::upstream(format!("failed to reach {url}"))
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(
            "unexpected response status {} from {url}: {body}",
            status.as_u16()
        );
        return Err(Error::upstream(format!(
            "unexpected response status {} from {url}",
            status.as_u16()
        )));
    }

    response.json::<T>().await.map_err(|err| {
        error!("failed to parse data from {url}: {err}");
        Error::upstream(format!("failed to parse data from {url}"))
    })
}
