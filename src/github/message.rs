//! Response bodies of the GitHub REST API, reduced to the fields in use.

use serde::Deserialize;

/// Represents a repository from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct RepositoryResponse {
    pub default_branch: String,
}

/// Represents a page of workflow runs from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowRuns {
    #[serde(default)]
    pub total_count: u64,
    pub workflow_runs: Vec<WorkflowRun>,
}

/// Represents a GitHub Actions workflow run from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
}

/// Represents artifacts from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct Artifacts {
    #[serde(default)]
    pub total_count: u64,
    pub artifacts: Vec<Artifact>,
}

/// Represents an artifact from GitHub REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct Artifact {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub size_in_bytes: u64,
    #[serde(default)]
    pub expired: bool,
}
