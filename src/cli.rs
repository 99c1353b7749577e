use anyhow::Result;
use clap::Parser;

use crate::types::{Config, DEPENDABOT_LOGIN, REBASE_COMMENT, Repo};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

#[derive(Parser, Debug)]
#[command(
    about = "Ask Dependabot to rebase one of its open PRs, preferring PRs with auto-merge enabled and green checks"
)]
#[command(long_version = BUILD_INFO_HUMAN)]
struct CliArgs {
    /// Repository in format 'owner/name'
    #[arg(
        short = 'r',
        long,
        value_name = "OWNER/NAME",
        env = "INPUT_REPOSITORY"
    )]
    pub repository: Option<String>,

    /// API token (falls back to GITHUB_TOKEN, GH_TOKEN, then `gh auth token`)
    #[arg(long = "api-token", value_name = "TOKEN", env = "INPUT_API-TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// REST API root, for GitHub Enterprise
    #[arg(long = "api-url", value_name = "URL", env = "GITHUB_API_URL")]
    pub api_url: Option<String>,

    /// Author login whose PRs are considered
    #[arg(long = "bot-login", value_name = "LOGIN", default_value = DEPENDABOT_LOGIN)]
    pub bot_login: String,

    /// Comment body that triggers the rebase
    #[arg(long = "comment-body", value_name = "TEXT", default_value = REBASE_COMMENT)]
    pub comment_body: String,

    /// Decide and log, but do not post the comment
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,
}

/// Environment variable consulted when no repository flag or input is set.
const REPOSITORY_FALLBACK_VAR: &str = "GITHUB_REPOSITORY";

// GITHUB_REPOSITORY is set on every Actions runner, so it only backs up an
// explicit flag or action input.
fn build_config<E>(cli: CliArgs, env: E) -> Result<Config>
where
    E: Fn(&str) -> Option<String>,
{
    let repository = cli
        .repository
        .filter(|r| !r.trim().is_empty())
        .or_else(|| env(REPOSITORY_FALLBACK_VAR).filter(|r| !r.trim().is_empty()))
        .ok_or_else(|| {
            anyhow::anyhow!("Repository is required: pass --repository or set INPUT_REPOSITORY")
        })?;
    let repo = Repo::parse(&repository)?;

    Ok(Config {
        repo,
        api_token: cli.api_token.filter(|t| !t.trim().is_empty()),
        api_url: cli.api_url.filter(|u| !u.trim().is_empty()),
        bot_login: cli.bot_login,
        comment_body: cli.comment_body,
        dry_run: cli.dry_run,
    })
}

/// Parses command-line arguments and action inputs into a validated
/// [`Config`], reading the repository fallback from the process
/// environment.
///
/// The api token is carried through unresolved; environment and `gh`
/// fallbacks are applied when the client is built.
pub fn parse_args<I, T>(args: I) -> Result<Config>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    parse_args_with_env(args, |key| std::env::var(key).ok())
}

/// Like [`parse_args`], with the `GITHUB_REPOSITORY` fallback looked up
/// through `env`.
pub fn parse_args_with_env<I, T, E>(args: I, env: E) -> Result<Config>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    E: Fn(&str) -> Option<String>,
{
    let cli = CliArgs::try_parse_from(args)?;
    build_config(cli, env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn parses_explicit_flags() {
        let args = [
            "dependabot-rebase",
            "--repository",
            "octo-org/widgets",
            "--api-token",
            "ghp_x",
            "--dry-run",
        ];
        let config = parse_args_with_env(args, |_| None).unwrap();
        assert_eq!(config.repo, Repo::parse("octo-org/widgets").unwrap());
        assert_eq!(config.api_token.as_deref(), Some("ghp_x"));
        assert_eq!(config.bot_login, DEPENDABOT_LOGIN);
        assert_eq!(config.comment_body, REBASE_COMMENT);
        assert!(config.dry_run);
    }

    #[test]
    fn overrides_bot_identity_and_body() {
        let config = parse_args([
            "dependabot-rebase",
            "-r",
            "o/r",
            "--bot-login",
            "renovate[bot]",
            "--comment-body",
            "@renovate rebase",
        ])
        .unwrap();
        assert_eq!(config.bot_login, "renovate[bot]");
        assert_eq!(config.comment_body, "@renovate rebase");
        assert!(!config.dry_run);
    }

    #[test]
    fn malformed_repository_is_a_configuration_error() {
        let err = parse_args(["dependabot-rebase", "-r", "just-a-name"]).unwrap_err();
        let err = err.downcast::<Error>().unwrap();
        assert_eq!(err.code(), "configuration-invalid");
    }

    #[test]
    fn repository_is_required() {
        let err = parse_args_with_env(["dependabot-rebase"], |_| None).unwrap_err();
        assert!(err.to_string().contains("Repository is required"), "{err}");
        assert!(err.downcast_ref::<Error>().is_none());
    }

    #[test]
    fn falls_back_to_github_repository() {
        let config = parse_args_with_env(["dependabot-rebase"], |key| {
            (key == "GITHUB_REPOSITORY").then(|| "x/y".to_string())
        })
        .unwrap();
        assert_eq!(config.repo, Repo::parse("x/y").unwrap());
    }

    #[test]
    fn flag_takes_precedence_over_github_repository() {
        let config = parse_args_with_env(["dependabot-rebase", "-r", "octo-org/widgets"], |_| {
            Some("x/y".to_string())
        })
        .unwrap();
        assert_eq!(config.repo, Repo::parse("octo-org/widgets").unwrap());
    }

    #[test]
    fn blank_fallback_is_not_a_repository() {
        let err =
            parse_args_with_env(["dependabot-rebase"], |_| Some("  ".to_string())).unwrap_err();
        assert!(err.to_string().contains("Repository is required"), "{err}");
    }

    #[test]
    fn rejects_unknown_flags() {
        let err = parse_args(["dependabot-rebase", "-r", "o/r", "--merge"]).unwrap_err();
        assert!(err.downcast_ref::<clap::Error>().is_some());
    }
}
