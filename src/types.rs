use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use crate::error::{Error, ForgeError};

/// Login GitHub reports for pull requests opened by Dependabot.
pub const DEPENDABOT_LOGIN: &str = "dependabot[bot]";

/// Comment body Dependabot watches for to rebase its own branch.
pub const REBASE_COMMENT: &str = "@dependabot rebase";

/// A repository identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repo {
    owner: String,
    name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, Error> {
        let owner = owner.into();
        let name = name.into();
        if owner.is_empty() || name.is_empty() || owner.contains('/') || name.contains('/') {
            return Err(Error::InvalidRepository {
                repository: format!("{owner}/{name}"),
            });
        }
        Ok(Self { owner, name })
    }

    /// Parses `owner/name`. Exactly one separator and two non-empty
    /// parts are required.
    pub fn parse(repository: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidRepository {
            repository: repository.to_string(),
        };
        let (owner, name) = repository.trim().split_once('/').ok_or_else(invalid)?;
        Self::new(owner, name).map_err(|_| invalid())
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// An open pull request as seen by the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub author_login: String,
    pub head_sha: String,
    /// Login of whoever enabled auto-merge; `None` when it is disabled.
    pub auto_merge_enabled_by: Option<String>,
}

impl PullRequest {
    pub fn is_authored_by(&self, login: &str) -> bool {
        self.author_login == login
    }

    pub fn has_auto_merge(&self) -> bool {
        self.auto_merge_enabled_by.is_some()
    }
}

impl fmt::Display for PullRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/\"{}\"", self.number, self.title)
    }
}

/// Final state of a completed check run, as reported by GitHub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Stale,
    Other(String),
}

impl CheckConclusion {
    pub fn as_str(&self) -> &str {
        match self {
            CheckConclusion::Success => "success",
            CheckConclusion::Failure => "failure",
            CheckConclusion::Neutral => "neutral",
            CheckConclusion::Cancelled => "cancelled",
            CheckConclusion::Skipped => "skipped",
            CheckConclusion::TimedOut => "timed_out",
            CheckConclusion::ActionRequired => "action_required",
            CheckConclusion::Stale => "stale",
            CheckConclusion::Other(s) => s,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, CheckConclusion::Failure)
    }
}

// Unknown values are kept rather than rejected; GitHub adds conclusions
// from time to time.
impl From<&str> for CheckConclusion {
    fn from(s: &str) -> Self {
        match s {
            "success" => CheckConclusion::Success,
            "failure" => CheckConclusion::Failure,
            "neutral" => CheckConclusion::Neutral,
            "cancelled" => CheckConclusion::Cancelled,
            "skipped" => CheckConclusion::Skipped,
            "timed_out" => CheckConclusion::TimedOut,
            "action_required" => CheckConclusion::ActionRequired,
            "stale" => CheckConclusion::Stale,
            other => CheckConclusion::Other(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for CheckConclusion {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(CheckConclusion::from(s.as_str()))
    }
}

impl fmt::Display for CheckConclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single CI result attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckRun {
    pub name: String,
    pub head_sha: String,
    /// `None` while the run has not completed.
    #[serde(default)]
    pub conclusion: Option<CheckConclusion>,
}

/// How a candidate pull request is treated for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    NoAutoMerge,
    Failing,
    Ready,
}

/// Why a pull request was picked for a rebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseReason {
    /// Auto-merge enabled and no failing check run.
    Ready,
    /// No ready PR existed; first PR with failing checks.
    FailingFallback,
}

impl RebaseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RebaseReason::Ready => "ready",
            RebaseReason::FailingFallback => "failing-fallback",
        }
    }
}

/// Outcome of one selection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No open pull request authored by the bot.
    NoCandidates,
    /// Candidates existed but none had auto-merge enabled.
    NothingToDo,
    Rebase {
        number: u64,
        title: String,
        reason: RebaseReason,
    },
}

impl Decision {
    pub fn rebased_pr(&self) -> Option<u64> {
        match self {
            Decision::Rebase { number, .. } => Some(*number),
            _ => None,
        }
    }
}

/// Everything a run decided, in encounter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub decision: Decision,
    /// Candidates skipped for lacking auto-merge.
    pub skipped: Vec<u64>,
    /// Candidates postponed for failing checks.
    pub postponed: Vec<u64>,
    /// Whether the rebase comment was actually created.
    pub commented: bool,
}

/// Validated run configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub repo: Repo,
    /// Explicit credential; resolved from the environment when absent.
    pub api_token: Option<String>,
    pub api_url: Option<String>,
    pub bot_login: String,
    pub comment_body: String,
    pub dry_run: bool,
}

impl Config {
    pub fn new(repo: Repo) -> Self {
        Self {
            repo,
            api_token: None,
            api_url: None,
            bot_login: DEPENDABOT_LOGIN.to_string(),
            comment_body: REBASE_COMMENT.to_string(),
            dry_run: false,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("repo", &self.repo)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("bot_login", &self.bot_login)
            .field("comment_body", &self.comment_body)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Abstraction over the hosting service's pull request API.
#[async_trait]
pub trait Forge: Send + Sync {
    /// All open pull requests, in the order the service lists them.
    async fn list_open_pull_requests(&self, repo: &Repo) -> Result<Vec<PullRequest>, ForgeError>;

    /// All check runs recorded for a commit.
    async fn list_check_runs(&self, repo: &Repo, head_sha: &str)
    -> Result<Vec<CheckRun>, ForgeError>;

    async fn create_comment(&self, repo: &Repo, number: u64, body: &str)
    -> Result<(), ForgeError>;
}
