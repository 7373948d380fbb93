//! Typed identities of GitHub repositories, workflows and their runs.

use std::fmt::{self, Display};

pub mod artifact;

pub use artifact::{Artifact, NamedArtifact};

/// Identifies a single GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Repository {
    /// The owning user or organisation.
    pub owner: String,
    /// The repository name.
    pub name: String,
}

impl Repository {
    /// Creates a [`Repository`].
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Identifies a workflow, by its file name, within a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Workflow {
    /// The owning repository.
    pub repo: Repository,
    /// The workflow file name, e.g. `ci.yml`.
    pub name: String,
}

impl Workflow {
    /// Creates a [`Workflow`].
    pub fn new(repo: Repository, name: impl Into<String>) -> Self {
        Self {
            repo,
            name: name.into(),
        }
    }
}

impl Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repo, self.name)
    }
}

/// A branch of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Branch {
    /// The owning repository.
    pub repo: Repository,
    /// The branch name.
    pub name: String,
}

impl Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.repo, self.name)
    }
}

/// One completed execution of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Run {
    /// The workflow that was run.
    pub workflow: Workflow,
    /// The run ID.
    pub id: String,
}

impl Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.workflow, self.id)
    }
}
