use tracing::{debug, error, info};

use super::{GithubClient, fetch_json, message::WorkflowRuns, segment};
use crate::{
    error::{Error, Result},
    workflow::{Branch, Run, Workflow},
};

/// Fetches the most recent completed run of a workflow on a branch from GitHub.
///
/// # Errors
///
/// Returns an upstream error if the runs cannot be fetched, or there is no completed run.
pub async fn fetch_latest_run(
    client: &GithubClient,
    workflow: &Workflow,
    branch: &Branch,
) -> Result<Run> {
    let url = format!(
        "/repos/{}/{}/actions/workflows/{}/runs?branch={}&status=completed&per_page=1",
        segment(&workflow.repo.owner),
        segment(&workflow.repo.name),
        segment(&workflow.name),
        segment(&branch.name),
    );
    debug!("fetching latest run of {workflow} on {}…", branch.name);

    let runs: WorkflowRuns = fetch_json(client, &url).await?;
    match runs.workflow_runs.into_iter().next() {
        Some(run) => {
            info!(
                "latest run of {workflow} is {} ({} of {} runs, {})",
                run.id,
                run.head_branch.as_deref().unwrap_or("?"),
                runs.total_count,
                run.conclusion.as_deref().unwrap_or("no conclusion")
            );
            Ok(Run {
                workflow: workflow.clone(),
                id: run.id.to_string(),
            })
        }
        None => {
            error!("no completed runs of {workflow} on {}", branch.name);
            Err(Error::upstream(format!(
                "no completed runs of {} on {}",
                workflow.name, branch.name
            )))
        }
    }
}
