//! Artifacts produced by workflow runs.

use std::{
    cmp::Ordering,
    fmt::{self, Display},
};

use super::Repository;

/// Identifies an artifact. Artifact content never changes once published, so this is all that is needed to fetch it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Artifact {
    /// The owning repository.
    pub repo: Repository,
    /// The opaque numeric artifact ID.
    pub id: String,
}

impl Artifact {
    /// Creates an [`Artifact`].
    pub fn new(repo: Repository, id: impl Into<String>) -> Self {
        Self {
            repo,
            id: id.into(),
        }
    }
}

impl Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.id)
    }
}

/// An [`Artifact`] together with its human-readable name within a run.
///
/// Ordered by name, then by ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedArtifact {
    /// The artifact.
    pub artifact: Artifact,
    /// The name given to it by the workflow.
    pub name: String,
}

impl NamedArtifact {
    /// Creates a [`NamedArtifact`].
    pub fn new(artifact: Artifact, name: impl Into<String>) -> Self {
        Self {
            artifact,
            name: name.into(),
        }
    }
}

impl Ord for NamedArtifact {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.artifact.id.cmp(&other.artifact.id))
            .then_with(|| self.artifact.repo.cmp(&other.artifact.repo))
    }
}

impl PartialOrd for NamedArtifact {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for NamedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.artifact)
    }
}
