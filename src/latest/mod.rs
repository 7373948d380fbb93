//! Resolves a workflow to the artifacts of its most recent completed run on the default branch.
//!
//! The latest run rarely changes, so resolutions are cached in memory for a short validity. Expired entries are pruned when a lookup happens, never in the background.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{
    error::Result,
    framework::SingleFlight,
    github::ArtifactApi,
    workflow::{NamedArtifact, Workflow},
};

/// The artifacts of a workflow's latest run, and until when they are trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The artifacts, ordered by name.
    pub artifacts: BTreeSet<NamedArtifact>,
    /// The instant this resolution stops being served.
    pub expiry: Instant,
}

impl Resolution {
    /// How long this resolution remains valid.
    pub fn remaining(&self) -> Duration {
        self.expiry.saturating_duration_since(Instant::now())
    }

    /// Finds an artifact by its name.
    pub fn find(&self, name: &str) -> Option<&NamedArtifact> {
        self.artifacts.iter().find(|artifact| artifact.name == name)
    }
}

/// Resolves and caches the latest artifacts of workflows.
#[derive(Debug)]
pub struct LatestResolver {
    api: Arc<dyn ArtifactApi>,
    validity: Duration,
    resolved: Mutex<HashMap<Workflow, Resolution>>,
    resolutions: SingleFlight<Workflow>,
}

impl LatestResolver {
    /// Creates a [`LatestResolver`] that trusts each resolution for `validity`.
    pub fn new(api: Arc<dyn ArtifactApi>, validity: Duration) -> Self {
        Self {
            api,
            validity,
            resolved: Mutex::new(HashMap::new()),
            resolutions: SingleFlight::new(),
        }
    }

    /// Resolves the latest artifacts of a workflow, from the cache when still valid.
    ///
    /// # Errors
    ///
    /// Returns the error of whichever lookup failed: the default branch, the latest run, or its artifacts. Nothing is cached then.
    pub async fn resolve(&self, workflow: &Workflow) -> Result<Resolution> {
        if let Some(cached) = self.cached(workflow) {
            return Ok(cached);
        }

        let _flight = self.resolutions.lock(workflow.clone()).await;
        if let Some(cached) = self.cached(workflow) {
            return Ok(cached);
        }

        debug!("resolving latest artifacts of {workflow}…");
        let branch = self.api.default_branch(&workflow.repo).await?;
        let run = self.api.latest_run(workflow, &branch).await?;
        let artifacts = self.api.artifacts(&run).await?;

        let resolution = Resolution {
            artifacts,
            expiry: Instant::now() + self.validity,
        };
        info!(
            "resolved {} artifacts of {run}, valid for {:?}",
            resolution.artifacts.len(),
            self.validity
        );
        self.resolved
            .lock()
            .insert(workflow.clone(), resolution.clone());

        Ok(resolution)
    }

    /// Prunes expired resolutions, then looks up a valid one.
    fn cached(&self, workflow: &Workflow) -> Option<Resolution> {
        let now = Instant::now();
        let mut resolved = self.resolved.lock();
        resolved.retain(|_, resolution| resolution.expiry > now);

        let cached = resolved.get(workflow).cloned();
        if let Some(cached) = &cached {
            debug!(
                "using cached artifacts of {workflow}, valid for {:?}",
                cached.expiry - now
            );
        }
        cached
    }
}
