use tracing::{debug, info};

use super::{GithubClient, fetch_json, message::RepositoryResponse, segment};
use crate::{
    error::Result,
    workflow::{Branch, Repository},
};

/// Fetches the default branch of a repository from GitHub.
///
/// # Errors
///
/// Returns an upstream error if the repository details cannot be fetched.
pub async fn fetch_default_branch(client: &GithubClient, repo: &Repository) -> Result<Branch> {
    let url = format!("/repos/{}/{}", segment(&repo.owner), segment(&repo.name));
    debug!("fetching details of {repo}…");

    let details: RepositoryResponse = fetch_json(client, &url).await?;
    info!("default branch of {repo} is {}", details.default_branch);

    Ok(Branch {
        repo: repo.clone(),
        name: details.default_branch,
    })
}
