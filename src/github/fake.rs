//! An in-memory [`ArtifactApi`] for tests.

#![cfg(test)]

use std::{
    collections::BTreeSet,
    path::Path,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::ArtifactApi;
use crate::{
    error::{Error, Result},
    workflow::{Artifact, Branch, NamedArtifact, Repository, Run, Workflow},
};

/// Counts calls and answers from canned data.
#[derive(Debug, Default)]
pub(crate) struct FakeApi {
    pub branch_calls: AtomicUsize,
    pub run_calls: AtomicUsize,
    pub artifact_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    pub artifacts: Mutex<BTreeSet<NamedArtifact>>,
    pub zip: Mutex<Option<Vec<u8>>>,
    pub fail_runs: AtomicBool,
    pub delay: Duration,
}

impl FakeApi {
    pub(crate) fn with_zip(bytes: &[u8]) -> Self {
        Self {
            zip: Mutex::new(Some(bytes.to_vec())),
            ..Self::default()
        }
    }

    pub(crate) fn chain_calls(&self) -> usize {
        self.branch_calls.load(Ordering::SeqCst)
            + self.run_calls.load(Ordering::SeqCst)
            + self.artifact_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactApi for FakeApi {
    async fn default_branch(&self, repo: &Repository) -> Result<Branch> {
        self.branch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Branch {
            repo: repo.clone(),
            name: String::from("main"),
        })
    }

    async fn latest_run(&self, workflow: &Workflow, _branch: &Branch) -> Result<Run> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_runs.load(Ordering::SeqCst) {
            return Err(Error::upstream("no runs"));
        }
        Ok(Run {
            workflow: workflow.clone(),
            id: String::from("7"),
        })
    }

    async fn artifacts(&self, _run: &Run) -> Result<BTreeSet<NamedArtifact>> {
        self.artifact_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.artifacts.lock().clone())
    }

    async fn download_artifact(&self, _artifact: &Artifact, destination: &Path) -> Result<()> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let Some(bytes) = self.zip.lock().clone() else {
            return Err(Error::not_found("No such artifact"));
        };
        tokio::fs::create_dir_all(destination.parent().unwrap()).await?;
        tokio::fs::write(destination, bytes).await?;
        Ok(())
    }
}
