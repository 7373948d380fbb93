//! `/artifacts/{owner}/{repo}/{id}/{path…}`: browses the content of one artifact.

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::{AppState, IMMUTABLE, page, redirect};
use crate::{
    archive::{self, Entry},
    error::{Error, Result},
    workflow::{Artifact, Repository},
};

pub(super) async fn handle(
    state: &AppState,
    raw_path: &str,
    segments: &[String],
) -> Result<Response> {
    let [owner, repo, id, internal @ ..] = segments else {
        return Err(Error::not_found("insufficient path"));
    };

    let repo = Repository::new(owner, repo);
    state.check_allowed(&repo)?;

    let artifact = Artifact::new(repo, id.as_str());
    let Some(zip) = state.cache.get(&artifact).await else {
        return Err(Error::not_found("No such artifact"));
    };

    match archive::open(&zip, internal).await? {
        Entry::File(file) => {
            let content_type = HeaderValue::try_from(file.content_type)
                .map_err(|e| Error::Internal(e.into()))?;
            let headers = [
                (header::CONTENT_TYPE, content_type),
                (header::CONTENT_LENGTH, HeaderValue::from(file.size)),
                (header::CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE)),
            ];
            Ok((StatusCode::OK, headers, Body::from_stream(file.body)).into_response())
        }
        // Relative links in the listing only resolve against a path ending in `/`
        Entry::Directory(_) if !raw_path.ends_with('/') => {
            Ok(redirect(state, &format!("{raw_path}/")))
        }
        Entry::Directory(children) => Ok(page::listing(state, &children, internal.is_empty())),
        Entry::Absent => Err(Error::not_found("No such file!")),
    }
}
