//! Shared fixtures of the integration tests.

#![allow(dead_code)]

use std::{
    collections::{BTreeSet, HashSet},
    io::Write as _,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use artifact_browser::{
    Error, Result,
    config::Config,
    github::ArtifactApi,
    server::{self, AppState},
    workflow::{Artifact, Branch, NamedArtifact, Repository, Run, Workflow},
};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response},
};
use parking_lot::Mutex;
use tempfile::TempDir;
use tower::ServiceExt as _;
use zip::{ZipWriter, write::SimpleFileOptions};

pub const LATEST_VALIDITY: Duration = Duration::from_secs(600);

/// Counts every call and answers from canned data.
#[derive(Debug, Default)]
pub struct FakeApi {
    pub calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    pub artifacts: Mutex<BTreeSet<NamedArtifact>>,
    pub zip: Mutex<Option<Vec<u8>>>,
    pub fail: AtomicBool,
}

impl FakeApi {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn add_artifact(&self, repo: &Repository, id: &str, name: &str) {
        self.artifacts
            .lock()
            .insert(NamedArtifact::new(Artifact::new(repo.clone(), id), name));
    }
}

#[async_trait]
impl ArtifactApi for FakeApi {
    async fn default_branch(&self, repo: &Repository) -> Result<Branch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::upstream("unreachable"));
        }
        Ok(Branch {
            repo: repo.clone(),
            name: String::from("main"),
        })
    }

    async fn latest_run(&self, workflow: &Workflow, _branch: &Branch) -> Result<Run> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Run {
            workflow: workflow.clone(),
            id: String::from("99"),
        })
    }

    async fn artifacts(&self, _run: &Run) -> Result<BTreeSet<NamedArtifact>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.artifacts.lock().clone())
    }

    async fn download_artifact(&self, _artifact: &Artifact, destination: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let Some(bytes) = self.zip.lock().clone() else {
            return Err(Error::not_found("No such artifact"));
        };
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(destination, bytes).await?;
        Ok(())
    }
}

/// A zip holding `file.txt` and `subdir/subfile.txt`.
pub fn fixture_zip() -> Vec<u8> {
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer
        .start_file("file.txt", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"file content").unwrap();
    writer
        .start_file("subdir/subfile.txt", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"subfile content").unwrap();
    writer.finish().unwrap().into_inner()
}

/// A router over a [`FakeApi`] and a temporary cache directory.
pub struct TestApp {
    pub dir: TempDir,
    pub api: Arc<FakeApi>,
    pub router: Router,
}

impl TestApp {
    pub fn new(repos: &[&str], context_path: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeApi::default());
        *api.zip.lock() = Some(fixture_zip());

        let config = Config {
            port: 0,
            api_host: String::from("http://127.0.0.1:1"),
            auth_token: String::new(),
            repos: repos
                .iter()
                .map(|repo| {
                    let (owner, name) = repo.split_once('/').unwrap();
                    Repository::new(owner, name)
                })
                .collect::<HashSet<_>>(),
            cache_dir: dir.path().to_owned(),
            latest_validity: LATEST_VALIDITY,
            artifact_validity: Duration::from_secs(3 * 24 * 60 * 60),
            context_path: context_path.to_owned(),
        };
        let router = server::router(Arc::new(AppState::new(&config, api.clone())));

        Self { dir, api, router }
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.request(Method::GET, uri).await
    }

    pub async fn request(&self, method: Method, uri: &str) -> Response<Body> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn header<'a>(response: &'a Response<Body>, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing {name} header"))
        .to_str()
        .unwrap()
}

pub async fn text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
