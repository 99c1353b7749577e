use std::process::Command;

use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize, de::IgnoredAny};
use tracing::debug;

use crate::{
    error::ForgeError,
    types::{CheckRun, Forge, PullRequest, Repo},
};

const PER_PAGE: u8 = 100;

/// Resolves the API token: explicit value first, then `GITHUB_TOKEN`,
/// `GH_TOKEN`, and finally `gh auth token`.
pub fn get_github_token(explicit: Option<&str>) -> Result<String> {
    if let Some(token) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }

    // Prefer environment variables over gh CLI to avoid subprocess overhead.
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var)
            && !token.trim().is_empty()
        {
            return Ok(token.trim().to_string());
        }
    }

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("No api token given and the gh CLI is not available")?;

    if !output.status.success() {
        anyhow::bail!("Failed to get GitHub token from gh CLI. Please pass --api-token");
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();

    if token.is_empty() {
        anyhow::bail!("Empty token returned from gh CLI");
    }

    Ok(token)
}

/// Creates an authenticated client, optionally against a GitHub
/// Enterprise API root.
pub fn setup_github_client(token: String, api_url: Option<&str>) -> Result<Octocrab> {
    let mut builder = Octocrab::builder().personal_token(token);
    if let Some(url) = api_url {
        builder = builder
            .base_uri(url)
            .with_context(|| format!("Invalid API URL: '{url}'"))?;
    }
    builder.build().context("Failed to create GitHub client")
}

/// [`Forge`] backed by the GitHub REST API.
pub struct GitHub {
    client: Octocrab,
}

impl GitHub {
    pub fn new(client: Octocrab) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct PageParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'static str>,
    per_page: u8,
    page: u32,
}

impl PageParams {
    fn new(page: u32) -> Self {
        Self {
            state: None,
            per_page: PER_PAGE,
            page,
        }
    }
}

#[derive(Deserialize)]
struct CheckRunsPage {
    total_count: u64,
    check_runs: Vec<CheckRun>,
}

// octocrab's pull request model lacks `auto_merge`, so pull requests are
// decoded into these instead.
#[derive(Deserialize)]
struct WireUser {
    login: String,
}

#[derive(Deserialize)]
struct WireHead {
    sha: String,
}

#[derive(Deserialize)]
struct WireAutoMerge {
    #[serde(default)]
    enabled_by: Option<WireUser>,
}

#[derive(Deserialize)]
struct WirePullRequest {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    user: Option<WireUser>,
    head: WireHead,
    #[serde(default)]
    auto_merge: Option<WireAutoMerge>,
}

impl From<WirePullRequest> for PullRequest {
    fn from(pr: WirePullRequest) -> Self {
        Self {
            number: pr.number,
            title: pr.title.unwrap_or_default(),
            author_login: pr.user.map(|user| user.login).unwrap_or_default(),
            head_sha: pr.head.sha,
            auto_merge_enabled_by: pr
                .auto_merge
                .and_then(|auto_merge| auto_merge.enabled_by)
                .map(|user| user.login),
        }
    }
}

#[derive(Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

#[async_trait]
impl Forge for GitHub {
    async fn list_open_pull_requests(&self, repo: &Repo) -> Result<Vec<PullRequest>, ForgeError> {
        debug!(%repo, "listing open pull requests");
        let route = format!("/repos/{}/{}/pulls", repo.owner(), repo.name());

        let mut prs = Vec::new();
        let mut page = 1;
        loop {
            let params = PageParams {
                state: Some("open"),
                ..PageParams::new(page)
            };
            let batch: Vec<WirePullRequest> = self.client.get(&route, Some(&params)).await?;
            let received = batch.len();
            prs.extend(batch.into_iter().map(PullRequest::from));

            if received < usize::from(PER_PAGE) {
                break;
            }
            page += 1;
        }

        Ok(prs)
    }

    async fn list_check_runs(
        &self,
        repo: &Repo,
        head_sha: &str,
    ) -> Result<Vec<CheckRun>, ForgeError> {
        debug!(%repo, head_sha, "listing check runs");
        let route = format!(
            "/repos/{}/{}/commits/{head_sha}/check-runs",
            repo.owner(),
            repo.name()
        );

        let mut runs = Vec::new();
        let mut page = 1;
        loop {
            let batch: CheckRunsPage = self
                .client
                .get(&route, Some(&PageParams::new(page)))
                .await?;
            let received = batch.check_runs.len();
            runs.extend(batch.check_runs);

            if received == 0 || runs.len() as u64 >= batch.total_count {
                break;
            }
            page += 1;
        }

        Ok(runs)
    }

    async fn create_comment(&self, repo: &Repo, number: u64, body: &str) -> Result<(), ForgeError> {
        debug!(%repo, pr_number = number, "creating comment");
        let route = format!(
            "/repos/{}/{}/issues/{number}/comments",
            repo.owner(),
            repo.name()
        );
        let _: IgnoredAny = self
            .client
            .post(&route, Some(&CommentBody { body }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CheckConclusion;

    #[test]
    fn explicit_token_wins() {
        assert_eq!(get_github_token(Some("  ghp_x ")).unwrap(), "ghp_x");
    }

    #[test]
    fn check_runs_page_deserializes_github_payload() {
        let json = r#"{
            "total_count": 3,
            "check_runs": [
                {"id": 1, "name": "build", "head_sha": "abc", "status": "completed", "conclusion": "success"},
                {"id": 2, "name": "test", "head_sha": "abc", "status": "completed", "conclusion": "failure"},
                {"id": 3, "name": "lint", "head_sha": "abc", "status": "in_progress", "conclusion": null}
            ]
        }"#;
        let page: CheckRunsPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.total_count, 3);
        let conclusions: Vec<_> = page.check_runs.iter().map(|c| c.conclusion.clone()).collect();
        assert_eq!(
            conclusions,
            [
                Some(CheckConclusion::Success),
                Some(CheckConclusion::Failure),
                None
            ]
        );
        assert_eq!(page.check_runs[1].name, "test");
    }

    #[test]
    fn auto_merge_without_actor_counts_as_disabled() {
        let json = r#"[
            {"number": 1, "title": "a", "user": {"login": "dependabot[bot]"}, "head": {"sha": "s1"},
             "auto_merge": {"enabled_by": {"login": "octocat"}, "merge_method": "squash"}},
            {"number": 2, "title": "b", "user": {"login": "dependabot[bot]"}, "head": {"sha": "s2"},
             "auto_merge": null},
            {"number": 3, "title": "c", "user": {"login": "dependabot[bot]"}, "head": {"sha": "s3"},
             "auto_merge": {"enabled_by": null}},
            {"number": 4, "title": null, "user": null, "head": {"sha": "s4"}}
        ]"#;
        let wire: Vec<WirePullRequest> = serde_json::from_str(json).unwrap();
        let prs: Vec<PullRequest> = wire.into_iter().map(PullRequest::from).collect();
        let enabled_by: Vec<_> = prs.iter().map(|pr| pr.auto_merge_enabled_by.as_deref()).collect();
        assert_eq!(enabled_by, [Some("octocat"), None, None, None]);
        assert_eq!(prs[3].author_login, "");
        assert_eq!(prs[3].title, "");
        assert_eq!(prs[0].head_sha, "s1");
    }
}
