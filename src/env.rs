//! Defines the environment variables to use.

#![cfg(feature = "env")]

use crate::{config::parse_iso8601_duration, static_lazy_lock};

use std::{env, fmt::Debug, path::PathBuf, time::Duration};
use tracing::warn;

/// Parses an environment variable from [`String`] to something else, wrapping any error in [`anyhow::Error`].
#[macro_export]
macro_rules! parse_env {
    ($key:expr => |$var:ident| $expr:expr) => {
        std::env::var($key)
            .map_err(|e| anyhow::anyhow!(e))
            .and_then(|$var| $expr)
    };
    ($key:expr => |$var:ident| $expr:expr; anyhow) => {
        parse_env!($key => |$var| $expr.map_err(|e| anyhow::anyhow!(e)))
    };
}

pub use parse_env;

/// Falls back to `default` when a variable is absent, warning only when it was present but invalid.
fn or_default<T: Debug>(key: &str, parsed: anyhow::Result<T>, default: T) -> T {
    parsed.unwrap_or_else(|err| {
        if !matches!(
            err.downcast_ref::<env::VarError>(),
            Some(env::VarError::NotPresent)
        ) {
            warn!("invalid {key}: {err}, falling back to {default:?}");
        }
        default
    })
}

static_lazy_lock! {
    /// The port to serve artifact contents at.
    pub PORT: u16 = or_default(
        "ARTIFACT_BROWSER_PORT",
        parse_env!("ARTIFACT_BROWSER_PORT" => |s| s.parse::<u16>(); anyhow),
        56567,
    );
}

static_lazy_lock! {
    /// The directory to cache downloaded artifacts in.
    pub CACHE_DIR: PathBuf = env::var_os("ARTIFACT_BROWSER_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| env::temp_dir().join("artifact-browser"));
}

static_lazy_lock! {
    /// The GitHub API host to send requests to.
    pub GITHUB_API_HOST: String = env::var("ARTIFACT_BROWSER_GH_HOST")
        .unwrap_or_else(|_| String::from("https://api.github.com"));
}

static_lazy_lock! {
    /// The GitHub token to present on API requests.
    pub GITHUB_TOKEN: String = env::var("ARTIFACT_BROWSER_GH_AUTH_TOKEN").unwrap_or_default();
}

static_lazy_lock! {
    /// A comma-separated list of `owner/repo` pairs to serve artifacts from. Empty means all repositories.
    pub GITHUB_REPOS: String = env::var("ARTIFACT_BROWSER_GH_REPOS").unwrap_or_default();
}

static_lazy_lock! {
    /// How long the latest artifacts of a workflow are cached for.
    pub LATEST_VALIDITY: Duration = or_default(
        "ARTIFACT_BROWSER_LATEST_VALIDITY",
        parse_env!("ARTIFACT_BROWSER_LATEST_VALIDITY" => |s| parse_iso8601_duration(&s)),
        Duration::from_secs(10 * 60),
    );
}

static_lazy_lock! {
    /// How long a downloaded artifact is kept after its most recent access.
    pub ARTIFACT_VALIDITY: Duration = or_default(
        "ARTIFACT_BROWSER_ARTIFACT_VALIDITY",
        parse_env!("ARTIFACT_BROWSER_ARTIFACT_VALIDITY" => |s| parse_iso8601_duration(&s)),
        Duration::from_secs(3 * 24 * 60 * 60),
    );
}

static_lazy_lock! {
    /// The path prefix under which the server is reachable when reverse-proxied.
    pub CONTEXT_PATH: String = env::var("ARTIFACT_BROWSER_CONTEXT_PATH").unwrap_or_default();
}
