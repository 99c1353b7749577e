//! Error types for a selection run.

use thiserror::Error;

use crate::types::Repo;

/// Failure reported by a [`Forge`](crate::Forge) implementation.
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error(transparent)]
    GitHub(#[from] octocrab::Error),

    #[error("{0}")]
    Other(String),
}

/// Why a run failed. Every variant aborts the run; nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid repository '{repository}': expected 'owner/name'")]
    InvalidRepository { repository: String },

    #[error("failed to list open pull requests in {repo}")]
    ListPullRequests {
        repo: Repo,
        #[source]
        source: ForgeError,
    },

    #[error("failed to list check runs for PR {number} at {head_sha}")]
    ListCheckRuns {
        number: u64,
        head_sha: String,
        #[source]
        source: ForgeError,
    },

    #[error("failed to post rebase comment on PR {number}")]
    CreateComment {
        number: u64,
        #[source]
        source: ForgeError,
    },
}

impl Error {
    /// Stable reason code for operators and workflow annotations.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidRepository { .. } => "configuration-invalid",
            Error::ListPullRequests { .. } => "listing-failed",
            Error::ListCheckRuns { .. } => "check-runs-failed",
            Error::CreateComment { .. } => "comment-failed",
        }
    }
}
