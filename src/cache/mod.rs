//! The on-disk cache of downloaded artifact zips.
//!
//! Artifact content never changes once published, so a zip at the path derived from an [`Artifact`] is always current. The only staleness signal is a file's last access time: every lookup first sweeps away files unread for longer than the configured validity.

use std::{
    ffi::OsStr,
    fs::FileTimes,
    io,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::{
    framework::SingleFlight,
    github::{ArtifactApi, PARTIAL_PREFIX},
    workflow::Artifact,
};

/// Maps artifacts to zip files on disk, downloading them on first use.
#[derive(Debug)]
pub struct ArtifactCache {
    root: PathBuf,
    validity: Duration,
    api: Arc<dyn ArtifactApi>,
    downloads: SingleFlight<Artifact>,
}

impl ArtifactCache {
    /// Creates an [`ArtifactCache`] rooted at `root`, deleting files unread for longer than `validity`.
    pub fn new(root: impl Into<PathBuf>, validity: Duration, api: Arc<dyn ArtifactApi>) -> Self {
        Self {
            root: root.into(),
            validity,
            api,
            downloads: SingleFlight::new(),
        }
    }

    /// The root directory of the cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The path an artifact's zip is stored at: `{root}/{owner}/{repo}/{id}.zip`.
    pub fn path_of(&self, artifact: &Artifact) -> PathBuf {
        self.root
            .join(sanitize_segment(&artifact.repo.owner))
            .join(sanitize_segment(&artifact.repo.name))
            .join(format!("{}.zip", sanitize_segment(&artifact.id)))
    }

    /// Gets the zip of an artifact, downloading it if necessary.
    ///
    /// Returns [`None`] if the artifact cannot be downloaded.
    pub async fn get(&self, artifact: &Artifact) -> Option<PathBuf> {
        self.purge_stale_files().await;

        let destination = self.path_of(artifact);
        if is_file(&destination).await {
            touch(&destination).await;
            return Some(destination);
        }

        // Concurrent misses on the same artifact wait for the first download instead of racing it
        let _flight = self.downloads.lock(artifact.clone()).await;
        if is_file(&destination).await {
            debug!("{artifact} was downloaded while waiting");
            touch(&destination).await;
            return Some(destination);
        }

        match self.api.download_artifact(artifact, &destination).await {
            Ok(()) => Some(destination),
            Err(err) => {
                error!("failed to fetch {artifact}: {err}");
                None
            }
        }
    }

    /// Deletes every file in the cache that has not been accessed within the validity. Returns how many were deleted.
    ///
    /// Failures on single files are logged and skipped. A missing cache root has nothing to purge.
    pub async fn purge_stale_files(&self) -> usize {
        let Some(threshold) = SystemTime::now().checked_sub(self.validity) else {
            return 0;
        };

        let root = self.root.clone();
        match tokio::task::spawn_blocking(move || purge(&root, threshold)).await {
            Ok(purged) => purged,
            Err(err) => {
                error!("failed to purge stale artifacts: {err}");
                0
            }
        }
    }
}

/// Walks `root`, deleting the files last read before `threshold`.
fn purge(root: &Path, threshold: SystemTime) -> usize {
    let mut purged = 0;
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.io_error().is_some_and(|e| e.kind() == io::ErrorKind::NotFound) => {
                continue;
            }
            Err(err) => {
                warn!("failed to walk the cache for stale artifacts: {err}");
                continue;
            }
        };
        // Downloads in progress own their partial files until they persist them
        if !entry.file_type().is_file() || is_partial(entry.file_name()) {
            continue;
        }

        let path = entry.path();
        let accessed = entry
            .metadata()
            .map_err(io::Error::from)
            .and_then(|metadata| metadata.accessed());
        match accessed {
            Ok(accessed) if accessed < threshold => match std::fs::remove_file(path) {
                Ok(()) => {
                    info!("purged stale artifact {}", path.display());
                    purged += 1;
                }
                Err(err) => error!("failed to purge stale artifact {}: {err}", path.display()),
            },
            Ok(_) => {}
            Err(err) => warn!(
                "failed to determine last access time of {}: {err}",
                path.display()
            ),
        }
    }
    purged
}

fn is_partial(name: &OsStr) -> bool {
    name.to_str()
        .is_some_and(|name| name.starts_with(PARTIAL_PREFIX))
}

/// Makes an untrusted value safe to use as one path component.
fn sanitize_segment(value: &str) -> String {
    let sanitized = sanitize_filename::sanitize(value);
    if sanitized.is_empty() {
        String::from("_")
    } else {
        sanitized
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_file())
}

/// Marks a file as read now, independent of how the filesystem tracks access times.
async fn touch(path: &Path) {
    let result = async {
        let file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
        let file = file.into_std().await;
        tokio::task::spawn_blocking(move || {
            file.set_times(FileTimes::new().set_accessed(SystemTime::now()))
        })
        .await
        .map_err(io::Error::other)?
    }
    .await;

    if let Err(err) = result {
        warn!("failed to refresh last access time of {path:?}: {err}");
    }
}
