//! The HTTP surface: browse artifacts, follow stable links to the latest ones, and translate pasted GitHub links.
//!
//! All requests go through one fallback handler that picks a [`Route`] by path prefix, so every route shares the method check and the error page.

use std::{collections::HashSet, sync::Arc};

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Redirect, Response},
};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::{
    cache::ArtifactCache,
    config::Config,
    error::{Error, Result},
    github::ArtifactApi,
    latest::LatestResolver,
    workflow::Repository,
};

mod artifacts;
mod latest;
mod link;
mod page;

static FAVICON: &[u8] = include_bytes!("../../assets/favicon.svg");

/// The cache-control of content that never changes.
pub const IMMUTABLE: &str = "max-age=31536000, immutable";

/// What the request handlers share.
#[derive(Debug)]
pub struct AppState {
    repos: HashSet<Repository>,
    context_path: String,
    cache: ArtifactCache,
    latest: LatestResolver,
}

impl AppState {
    /// Creates an [`AppState`] whose caches talk to GitHub through `api`.
    pub fn new(config: &Config, api: Arc<dyn ArtifactApi>) -> Self {
        Self {
            repos: config.repos.clone(),
            context_path: config.context_path.clone(),
            cache: ArtifactCache::new(&config.cache_dir, config.artifact_validity, api.clone()),
            latest: LatestResolver::new(api, config.latest_validity),
        }
    }

    /// The artifact cache.
    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Ensures the allow-list, if any, contains `repo`.
    fn check_allowed(&self, repo: &Repository) -> Result<()> {
        if self.repos.is_empty() || self.repos.contains(repo) {
            Ok(())
        } else {
            debug!("refusing to serve from {repo}");
            Err(Error::Forbidden)
        }
    }

    /// Prefixes an absolute path with the context path.
    fn link(&self, path: &str) -> String {
        format!("{}{path}", self.context_path)
    }
}

/// Builds the router serving every route.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// The handler a request is routed to.
#[derive(Debug, PartialEq, Eq)]
enum Route {
    /// `/artifacts/{owner}/{repo}/{id}/{path…}`
    Artifact(Vec<String>),
    /// `/latest/{owner}/{repo}/{workflow}/{name}/{path…}`
    Latest(Vec<String>),
    /// `/favicon.ico`
    Favicon,
    /// `/` and anything else
    Link,
}

impl Route {
    /// Picks the route of a raw request path, decoding the segments after its prefix.
    fn of(path: &str) -> Result<Self> {
        if path == "/favicon.ico" {
            return Ok(Self::Favicon);
        }

        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let route: fn(Vec<String>) -> Self = match segments.next() {
            Some("artifacts") => Self::Artifact,
            Some("latest") => Self::Latest,
            _ => return Ok(Self::Link),
        };

        let decoded = segments.map(decode_segment).collect::<Result<Vec<_>>>()?;
        Ok(route(decoded))
    }
}

/// Decodes one path segment, refusing any that would address something outside of it once decoded.
fn decode_segment(segment: &str) -> Result<String> {
    match urlencoding::decode(segment) {
        Ok(decoded) if !decoded.contains('/') && decoded != "." && decoded != ".." => {
            Ok(decoded.into_owned())
        }
        _ => Err(Error::not_found("No such file!")),
    }
}

async fn dispatch(State(state): State<Arc<AppState>>, method: Method, uri: Uri) -> Response {
    match handle(&state, &method, &uri).await {
        Ok(response) => response,
        Err(err) => {
            if err.status() == StatusCode::INTERNAL_SERVER_ERROR {
                error!("failed to handle {method} {uri}: {err}");
            } else {
                debug!("failed to handle {method} {uri}: {err}");
            }
            page::link_form(&state, err.status(), Some(err.public_message().as_str()))
        }
    }
}

async fn handle(state: &AppState, method: &Method, uri: &Uri) -> Result<Response> {
    if *method != Method::GET {
        return Err(Error::BadMethod);
    }

    match Route::of(uri.path())? {
        Route::Artifact(segments) => artifacts::handle(state, uri.path(), &segments).await,
        Route::Latest(segments) => latest::handle(state, &segments).await,
        Route::Favicon => Ok(favicon()),
        Route::Link => Ok(link::handle(state, uri)),
    }
}

fn favicon() -> Response {
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("image/svg+xml")),
            (header::CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE)),
        ],
        FAVICON,
    )
        .into_response()
}

/// Redirects to an absolute path under the context path.
fn redirect(state: &AppState, path: &str) -> Response {
    let location = state.link(path);
    debug!("redirecting to {location}");
    Redirect::to(&location).into_response()
}

/// Joins segments into an absolute path, encoding each of them.
fn encode_path<S>(segments: impl IntoIterator<Item = S>) -> String
where
    S: AsRef<str>,
{
    segments
        .into_iter()
        .map(|segment| format!("/{}", urlencoding::encode(segment.as_ref())))
        .collect()
}
