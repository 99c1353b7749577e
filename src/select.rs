use tracing::{debug, info};

use crate::{
    error::Error,
    types::{
        CheckRun, Classification, Config, Decision, Forge, PullRequest, RebaseReason, RunReport,
    },
};

/// Classifies a candidate from its auto-merge state and check runs.
///
/// Check runs are not consulted when auto-merge is disabled. Only a
/// `failure` conclusion counts as failing; in-progress, cancelled and
/// timed-out runs do not.
pub fn classify(pr: &PullRequest, checks: &[CheckRun]) -> Classification {
    if !pr.has_auto_merge() {
        return Classification::NoAutoMerge;
    }

    let failing = checks
        .iter()
        .any(|check| check.conclusion.as_ref().is_some_and(|c| c.is_failure()));

    if failing {
        Classification::Failing
    } else {
        Classification::Ready
    }
}

/// Picks at most one open bot pull request and asks the bot to rebase it.
///
/// Candidates are visited in listing order. The first one that is ready
/// (auto-merge enabled, no failing check) is commented on and the scan
/// stops there. When none is ready, the first candidate with failing
/// checks is used instead. Any forge error aborts the run.
pub async fn select_and_rebase<F>(forge: &F, config: &Config) -> Result<RunReport, Error>
where
    F: Forge + ?Sized,
{
    let repo = &config.repo;
    info!("Will check for Dependabot PRs in {repo}");

    let open_prs = forge
        .list_open_pull_requests(repo)
        .await
        .map_err(|source| Error::ListPullRequests {
            repo: repo.clone(),
            source,
        })?;
    debug!(count = open_prs.len(), "listed open pull requests");

    let candidates: Vec<PullRequest> = open_prs
        .into_iter()
        .filter(|pr| pr.is_authored_by(&config.bot_login))
        .collect();

    let mut report = RunReport {
        decision: Decision::NoCandidates,
        skipped: Vec::new(),
        postponed: Vec::new(),
        commented: false,
    };

    if candidates.is_empty() {
        info!("No open Dependabot PRs found");
        return Ok(report);
    }

    info!("Found {} open Dependabot PRs", candidates.len());

    let mut failing: Vec<&PullRequest> = Vec::new();
    for pr in &candidates {
        // Check runs only matter once auto-merge is on.
        let checks = if pr.has_auto_merge() {
            fetch_check_runs(forge, config, pr).await?
        } else {
            Vec::new()
        };

        match classify(pr, &checks) {
            Classification::NoAutoMerge => {
                info!("PR {pr} has no auto-merge enabled, skipping rebase");
                report.skipped.push(pr.number);
            }
            Classification::Failing => {
                info!("PR {pr} has failed checks, postponing rebase");
                report.postponed.push(pr.number);
                failing.push(pr);
            }
            Classification::Ready => {
                info!("PR {pr} looks good, rebasing");
                report.commented = request_rebase(forge, config, pr).await?;
                report.decision = rebase_decision(pr, RebaseReason::Ready);
                return Ok(report);
            }
        }
    }

    report.decision = match failing.first() {
        Some(pr) => {
            info!("Rebasing {pr}");
            report.commented = request_rebase(forge, config, pr).await?;
            rebase_decision(pr, RebaseReason::FailingFallback)
        }
        None => {
            info!("No Dependabot PR has auto-merge enabled, nothing to rebase");
            Decision::NothingToDo
        }
    };

    Ok(report)
}

async fn fetch_check_runs<F>(
    forge: &F,
    config: &Config,
    pr: &PullRequest,
) -> Result<Vec<CheckRun>, Error>
where
    F: Forge + ?Sized,
{
    let checks = forge
        .list_check_runs(&config.repo, &pr.head_sha)
        .await
        .map_err(|source| Error::ListCheckRuns {
            number: pr.number,
            head_sha: pr.head_sha.clone(),
            source,
        })?;
    debug!(
        pr_number = pr.number,
        head_sha = %pr.head_sha,
        count = checks.len(),
        "listed check runs"
    );
    Ok(checks)
}

fn rebase_decision(pr: &PullRequest, reason: RebaseReason) -> Decision {
    Decision::Rebase {
        number: pr.number,
        title: pr.title.clone(),
        reason,
    }
}

/// Returns whether a comment was created; `false` in dry-run mode.
async fn request_rebase<F>(forge: &F, config: &Config, pr: &PullRequest) -> Result<bool, Error>
where
    F: Forge + ?Sized,
{
    if config.dry_run {
        info!(
            "Dry run: would comment {:?} on PR {}",
            config.comment_body, pr.number
        );
        return Ok(false);
    }

    forge
        .create_comment(&config.repo, pr.number, &config.comment_body)
        .await
        .map_err(|source| Error::CreateComment {
            number: pr.number,
            source,
        })?;
    debug!(pr_number = pr.number, "posted rebase comment");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CheckConclusion;

    fn pr(auto_merge: bool) -> PullRequest {
        PullRequest {
            number: 1,
            title: "Bump tokio".to_string(),
            author_login: "dependabot[bot]".to_string(),
            head_sha: "deadbeef".to_string(),
            auto_merge_enabled_by: auto_merge.then(|| "octocat".to_string()),
        }
    }

    fn check(conclusion: Option<CheckConclusion>) -> CheckRun {
        CheckRun {
            name: "ci/test".to_string(),
            head_sha: "deadbeef".to_string(),
            conclusion,
        }
    }

    #[test]
    fn no_auto_merge_ignores_checks() {
        let checks = [check(Some(CheckConclusion::Success))];
        assert_eq!(classify(&pr(false), &checks), Classification::NoAutoMerge);
        let checks = [check(Some(CheckConclusion::Failure))];
        assert_eq!(classify(&pr(false), &checks), Classification::NoAutoMerge);
    }

    #[test]
    fn any_failure_makes_it_failing() {
        let checks = [
            check(Some(CheckConclusion::Success)),
            check(Some(CheckConclusion::Failure)),
            check(None),
        ];
        assert_eq!(classify(&pr(true), &checks), Classification::Failing);
    }

    #[test]
    fn non_failure_conclusions_are_ready() {
        let checks = [
            check(Some(CheckConclusion::Cancelled)),
            check(Some(CheckConclusion::TimedOut)),
            check(Some(CheckConclusion::Neutral)),
            check(Some(CheckConclusion::Other("startup_failure".into()))),
            check(None),
        ];
        assert_eq!(classify(&pr(true), &checks), Classification::Ready);
    }

    #[test]
    fn no_checks_is_ready() {
        assert_eq!(classify(&pr(true), &[]), Classification::Ready);
    }
}
