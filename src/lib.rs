//! Dependabot rebase: nudge one open Dependabot pull request per run.
//!
//! Lists the open pull requests of a repository, keeps those authored by
//! Dependabot, and posts `@dependabot rebase` on the first one that has
//! auto-merge enabled and no failing check run. When every such PR has
//! failing checks, the first of them is rebased instead so that it picks
//! up fixes from the base branch.

pub mod cli;
pub mod error;
pub mod github;
pub mod select;
pub mod types;

pub use cli::{parse_args, parse_args_with_env};
pub use error::{Error, ForgeError};
pub use github::GitHub;
pub use select::{classify, select_and_rebase};
pub use types::{
    CheckConclusion, CheckRun, Classification, Config, DEPENDABOT_LOGIN, Decision, Forge,
    PullRequest, REBASE_COMMENT, RebaseReason, Repo, RunReport,
};
