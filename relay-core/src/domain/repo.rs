//! Repository domain types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Repository path in `owner/repo` form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoPath {
    full_name: String,
    split: usize,
}

impl RepoPath {
    /// Parses and validates an `owner/repo` path
    ///
    /// Both segments must be non-empty and consist of ASCII alphanumerics,
    /// `-`, `_` or `.`.
    pub fn parse(value: &str) -> Result<Self, String> {
        let (owner, name) = value
            .split_once('/')
            .ok_or_else(|| format!("Invalid repository path '{}': expected owner/repo", value))?;

        if !is_valid_segment(owner) || !is_valid_segment(name) {
            return Err(format!(
                "Invalid repository path '{}': expected owner/repo",
                value
            ));
        }

        Ok(Self {
            full_name: value.to_string(),
            split: owner.len(),
        })
    }

    pub fn is_valid(value: &str) -> bool {
        Self::parse(value).is_ok()
    }

    pub fn owner(&self) -> &str {
        &self.full_name[..self.split]
    }

    pub fn name(&self) -> &str {
        &self.full_name[self.split + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.full_name
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

impl TryFrom<String> for RepoPath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RepoPath> for String {
    fn from(path: RepoPath) -> Self {
        path.full_name
    }
}

/// Handle on the fork a job works in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkHandle {
    pub repo: RepoPath,
}

impl ForkHandle {
    pub fn new(repo: RepoPath) -> Self {
        Self { repo }
    }

    /// The fork a source repository gets under `owner` when forked with its own name
    pub fn expected(source: &RepoPath, owner: &str) -> Result<Self, String> {
        RepoPath::parse(&format!("{}/{}", owner, source.name())).map(Self::new)
    }

    pub fn owner(&self) -> &str {
        self.repo.owner()
    }
}

impl fmt::Display for ForkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.repo.fmt(f)
    }
}
