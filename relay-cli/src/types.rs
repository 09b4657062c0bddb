//! Common types used across CLI modules

use relay_core::domain::job::JobId;

/// Identifier that can be either a full job id or an unambiguous prefix
#[derive(Debug, Clone, PartialEq)]
pub enum IdOrPrefix {
    Full(JobId),
    /// Prefix that should uniquely identify a job
    Prefix(String),
}

impl IdOrPrefix {
    /// Parses as a full id first, otherwise treats the input as a prefix
    pub fn parse(input: &str) -> Self {
        match input.parse::<JobId>() {
            Ok(id) => IdOrPrefix::Full(id),
            Err(_) => IdOrPrefix::Prefix(input.trim().to_lowercase()),
        }
    }

    pub fn as_id(&self) -> Option<JobId> {
        match self {
            IdOrPrefix::Full(id) => Some(*id),
            IdOrPrefix::Prefix(_) => None,
        }
    }
}

impl std::fmt::Display for IdOrPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdOrPrefix::Full(id) => write!(f, "{}", id),
            IdOrPrefix::Prefix(prefix) => write!(f, "{}", prefix),
        }
    }
}
