//! Renders the HTML pages.

use std::fmt::Write as _;

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use tracing::warn;

use super::{AppState, encode_path};
use crate::{archive::Child, latest::Resolution, workflow::Workflow};

const TITLE: &str = env!("CARGO_PKG_NAME");

fn document(state: &AppState, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{TITLE}</title>\
         <link rel=\"icon\" href=\"{icon}\"></head>\
         <body><h1><a href=\"{home}\">{TITLE}</a></h1>{body}</body></html>\n",
        icon = escape(&state.link("/favicon.ico")),
        home = escape(&state.link("/")),
    )
}

/// The form to paste a GitHub link into, with an optional message below it.
pub(super) fn link_form(state: &AppState, status: StatusCode, message: Option<&str>) -> Response {
    let mut body = format!(
        "<form action=\"{}\">\
         <input type=\"text\" id=\"link_input\" name=\"link\" placeholder=\"github artifact link\">\
         <input type=\"submit\" id=\"submit_input\"></form>",
        escape(&state.link("/"))
    );
    if let Some(message) = message {
        let _ = write!(body, "<p>{}</p>", escape(message));
    }

    (status, Html(document(state, &body))).into_response()
}

/// The immediate children of a directory, as relative links.
pub(super) fn listing(state: &AppState, children: &[Child], at_root: bool) -> Response {
    let mut body = String::from("<ul>");
    if !at_root {
        body.push_str("<li><a href=\"../\">../</a></li>");
    }
    for child in children {
        let mut href = urlencoding::encode(&child.name).into_owned();
        if child.is_dir {
            href.push('/');
        }
        let _ = write!(
            body,
            "<li><a href=\"{}\">{}</a></li>",
            escape(&href),
            escape(&child.href())
        );
    }
    body.push_str("</ul>");

    Html(document(state, &body)).into_response()
}

/// Links to the stable paths of each artifact of a workflow's latest run, also announced as `link` headers.
pub(super) fn choices(
    state: &AppState,
    status: StatusCode,
    workflow: &Workflow,
    resolution: &Resolution,
) -> Response {
    let path_of = |name: &str| {
        state.link(&encode_path([
            "latest",
            workflow.repo.owner.as_str(),
            workflow.repo.name.as_str(),
            workflow.name.as_str(),
            name,
        ]))
    };

    let mut headers = HeaderMap::new();
    let mut body = String::new();
    if resolution.artifacts.is_empty() {
        let _ = write!(
            body,
            "<p>No artifacts found for {}</p>",
            escape(&workflow.name)
        );
    } else {
        let _ = write!(
            body,
            "<p>These stable links will redirect to the latest artifacts for the {} workflow on the default branch. \
             Feel free to append path components to address files within the artifacts.</p><ul>",
            escape(&workflow.name)
        );
        for artifact in &resolution.artifacts {
            let path = path_of(&artifact.name);
            match HeaderValue::try_from(format!("<{path}>; rel=alternate")) {
                Ok(value) => {
                    headers.append(header::LINK, value);
                }
                Err(err) => warn!("failed to announce {path} as a link header: {err}"),
            }
            let _ = write!(
                body,
                "<li><a href=\"{}\">{}</a></li>",
                escape(&path),
                escape(&artifact.name)
            );
        }
        body.push_str("</ul>");
    }

    (status, headers, Html(document(state, &body))).into_response()
}

/// Escapes text for use in HTML content and quoted attributes.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
