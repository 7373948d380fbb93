//! `/?link=…`: translates a link pasted from GitHub into a path of this server.

use std::sync::LazyLock;

use axum::{
    extract::Query,
    http::{StatusCode, Uri},
    response::Response,
};
use regex::Regex;
use serde::Deserialize;

use super::{AppState, encode_path, page, redirect};

static ARTIFACT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://github\.com/([^/]+)/([^/]+)/actions/runs/\d+/artifacts/(\d+)")
        .expect("valid artifact link pattern")
});

static WORKFLOW_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://github\.com/([^/]+)/([^/]+)/actions/workflows/([^/?#]+)")
        .expect("valid workflow link pattern")
});

#[derive(Debug, Deserialize)]
struct LinkQuery {
    link: Option<String>,
}

pub(super) fn handle(state: &AppState, uri: &Uri) -> Response {
    let link = Query::<LinkQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(query)| query.link)
        .filter(|link| !link.is_empty());

    let Some(link) = link else {
        let status = if uri.path() == "/" {
            StatusCode::OK
        } else {
            StatusCode::NOT_FOUND
        };
        return page::link_form(state, status, None);
    };

    match translate(&link) {
        Some(path) => redirect(state, &path),
        None => {
            let message = format!("Failed to grok {link}");
            page::link_form(state, StatusCode::OK, Some(message.as_str()))
        }
    }
}

/// Maps a GitHub artifact link to `/artifacts/…` and a workflow link to `/latest/…`.
fn translate(link: &str) -> Option<String> {
    if let Some(captures) = ARTIFACT_LINK.captures(link) {
        return Some(encode_path([
            "artifacts",
            &captures[1],
            &captures[2],
            &captures[3],
        ]));
    }
    WORKFLOW_LINK.captures(link).map(|captures| {
        encode_path(["latest", &captures[1], &captures[2], &captures[3]])
    })
}
