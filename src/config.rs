//! The configuration consumed by the artifact server.

use std::{collections::HashSet, path::PathBuf, sync::LazyLock, time::Duration};

use anyhow::{anyhow, bail};
use regex::Regex;
use tracing::warn;

use crate::workflow::Repository;

/// Everything the server needs to know about its surroundings.
#[derive(Debug, Clone)]
pub struct Config {
    /// The port to listen on.
    pub port: u16,
    /// The GitHub API host, e.g. `https://api.github.com`.
    pub api_host: String,
    /// The token presented on API requests.
    pub auth_token: String,
    /// The repositories artifacts may be served from. Empty means all of them.
    pub repos: HashSet<Repository>,
    /// The root directory of the artifact cache.
    pub cache_dir: PathBuf,
    /// How long the resolved artifacts of a workflow's latest run are trusted for.
    pub latest_validity: Duration,
    /// How long a downloaded artifact may go unread before being deleted.
    pub artifact_validity: Duration,
    /// The path prefix the server is reachable at, without a trailing `/`.
    pub context_path: String,
}

impl Config {
    /// Reads the configuration from the environment.
    ///
    /// See: [`crate::env`]
    #[cfg(feature = "env")]
    pub fn from_env() -> Self {
        use crate::env;

        Self {
            port: *env::PORT,
            api_host: env::GITHUB_API_HOST.clone(),
            auth_token: env::GITHUB_TOKEN.clone(),
            repos: parse_repos(&env::GITHUB_REPOS),
            cache_dir: env::CACHE_DIR.clone(),
            latest_validity: *env::LATEST_VALIDITY,
            artifact_validity: *env::ARTIFACT_VALIDITY,
            context_path: normalize_context_path(&env::CONTEXT_PATH),
        }
    }
}

static REPO_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w.-]+)/([\w.-]+)$").expect("valid repository pattern"));

/// Parses a comma-separated list of `owner/repo` pairs. Malformed entries are skipped.
pub fn parse_repos(list: &str) -> HashSet<Repository> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match REPO_PATTERN.captures(entry) {
            Some(captures) => Some(Repository::new(&captures[1], &captures[2])),
            None => {
                warn!("ignoring malformed repository {entry:?}, expected owner/repo");
                None
            }
        })
        .collect()
}

/// Ensures a context path either is empty or starts with `/` and has no trailing `/`.
pub fn normalize_context_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Parses the `PnDTnHnMnS` subset of ISO-8601 durations, e.g. `PT10M` or `P3D`.
///
/// # Errors
///
/// Returns an error if the text is not such a duration.
pub fn parse_iso8601_duration(text: &str) -> anyhow::Result<Duration> {
    let upper = text.trim().to_ascii_uppercase();
    let Some(body) = upper.strip_prefix('P') else {
        bail!("{text:?} does not start with 'P'");
    };
    let (date, time) = match body.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (body, None),
    };
    if date.is_empty() && time.is_none_or(str::is_empty) {
        bail!("{text:?} has no components");
    }

    let mut seconds = 0f64;
    seconds += sum_components(date, &[('D', 86_400.0)], text)?;
    if let Some(time) = time {
        if time.is_empty() {
            bail!("{text:?} has an empty time part");
        }
        seconds += sum_components(time, &[('H', 3_600.0), ('M', 60.0), ('S', 1.0)], text)?;
    }

    Duration::try_from_secs_f64(seconds).map_err(|e| anyhow!("{text:?}: {e}"))
}

fn sum_components(part: &str, units: &[(char, f64)], text: &str) -> anyhow::Result<f64> {
    let mut total = 0f64;
    let mut number = String::new();
    let mut allowed = units;

    for c in part.chars() {
        if c.is_ascii_digit() || c == '.' || c == ',' {
            number.push(if c == ',' { '.' } else { c });
            continue;
        }
        let Some(position) = allowed.iter().position(|(unit, _)| *unit == c) else {
            bail!("{text:?} has an unexpected or out-of-order designator '{c}'");
        };
        let value: f64 = number
            .parse()
            .map_err(|_| anyhow!("{text:?} has no number before '{c}'"))?;
        total += value * allowed[position].1;
        number.clear();
        allowed = &allowed[position + 1..];
    }

    if number.is_empty() {
        Ok(total)
    } else {
        bail!("{text:?} ends without a designator")
    }
}
