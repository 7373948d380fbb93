use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use super::{GithubClient, fetch_json, message::Artifacts, segment};
use crate::{
    error::Result,
    workflow::{Artifact, NamedArtifact, Run},
};

/// Fetches the artifacts of a workflow run from GitHub.
///
/// # Errors
///
/// Returns an upstream error if the artifacts cannot be fetched.
pub async fn fetch_artifacts(client: &GithubClient, run: &Run) -> Result<BTreeSet<NamedArtifact>> {
    let repo = &run.workflow.repo;
    let url = format!(
        "/repos/{}/{}/actions/runs/{}/artifacts?per_page=100",
        segment(&repo.owner),
        segment(&repo.name),
        segment(&run.id),
    );
    debug!("fetching artifacts of {run}…");

    let listed: Artifacts = fetch_json(client, &url).await?;
    if listed.total_count > listed.artifacts.len() as u64 {
        warn!(
            "only {} of {} artifacts of {run} were listed",
            listed.artifacts.len(),
            listed.total_count
        );
    }

    let artifacts: BTreeSet<_> = listed
        .artifacts
        .into_iter()
        .map(|artifact| {
            debug!(
                "listed artifact {} of {run}: {} bytes{}",
                artifact.name,
                artifact.size_in_bytes,
                if artifact.expired { ", expired" } else { "" }
            );
            NamedArtifact::new(Artifact::new(repo.clone(), artifact.id.to_string()), artifact.name)
        })
        .collect();

    match artifacts.len() {
        1 => info!("fetched 1 artifact of {run}"),
        count => info!("fetched {count} artifacts of {run}"),
    }
    Ok(artifacts)
}
