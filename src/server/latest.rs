//! `/latest/{owner}/{repo}/{workflow}/{name}/{path…}`: stable links to the artifacts of a workflow's latest run.
//!
//! Without a name, lists the artifacts to choose from. With one, redirects to the artifact it currently stands for.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::error;

use super::{AppState, encode_path, page, redirect};
use crate::{
    error::{Error, Result},
    workflow::{Repository, Workflow},
};

pub(super) async fn handle(state: &AppState, segments: &[String]) -> Result<Response> {
    let [owner, repo, workflow, rest @ ..] = segments else {
        return Err(Error::not_found("insufficient path"));
    };

    let repo = Repository::new(owner, repo);
    state.check_allowed(&repo)?;
    let workflow = Workflow::new(repo, workflow.as_str());

    let resolution = state.latest.resolve(&workflow).await.map_err(|err| {
        error!("failed to resolve latest artifacts of {workflow}: {err}");
        Error::upstream(format!("Failed to find latest artifacts of {workflow}"))
    })?;

    let Some((name, path)) = rest.split_first() else {
        return Ok(page::choices(
            state,
            StatusCode::MULTIPLE_CHOICES,
            &workflow,
            &resolution,
        ));
    };
    let Some(selected) = resolution.find(name) else {
        return Ok(page::choices(
            state,
            StatusCode::NOT_FOUND,
            &workflow,
            &resolution,
        ));
    };

    // Keeps the remaining path, so that a stable link can address a file within the latest artifact
    let artifact = &selected.artifact;
    let mut location = encode_path(
        [
            "artifacts",
            artifact.repo.owner.as_str(),
            artifact.repo.name.as_str(),
            artifact.id.as_str(),
        ]
        .into_iter()
        .chain(path.iter().map(String::as_str)),
    );
    if path.is_empty() {
        location.push('/');
    }

    // Browsers must not trust the redirect for longer than this server does
    let cache_control = HeaderValue::try_from(format!(
        "public, max-age={}",
        resolution.remaining().as_secs()
    ))
    .map_err(|e| Error::Internal(e.into()))?;
    Ok((
        [(header::CACHE_CONTROL, cache_control)],
        redirect(state, &location),
    )
        .into_response())
}
