use std::process::ExitCode;

use anyhow::Context;
use dependabot_rebase::{
    Config, Decision, Error, GitHub, RunReport,
    github::{get_github_token, setup_github_client},
    parse_args, select_and_rebase,
};
use tracing::{error, info};

fn handle_clap_help_version(clap_err: &clap::Error) -> ExitCode {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            ExitCode::SUCCESS
        }
        _ => {
            eprint!("{clap_err}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Marks the workflow step failed with the reason code as its title.
fn report_failure(err: &anyhow::Error) {
    error!("{err:?}");

    if std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true") {
        let code = err
            .downcast_ref::<Error>()
            .map_or("setup-failed", Error::code);
        // Workflow commands are line based.
        let message = format!("{err:#}").replace('\n', "%0A");
        println!("::error title={code}::{message}");
    }
}

async fn run(config: &Config) -> anyhow::Result<RunReport> {
    let token = get_github_token(config.api_token.as_deref())
        .context("Failed to obtain GitHub authentication token")?;
    let client = setup_github_client(token, config.api_url.as_deref())?;
    let forge = GitHub::new(client);

    Ok(select_and_rebase(&forge, config).await?)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config = match parse_args(std::env::args()) {
        Ok(config) => config,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                return handle_clap_help_version(clap_err);
            }
            report_failure(&err);
            return ExitCode::FAILURE;
        }
    };

    match run(&config).await {
        Ok(report) => {
            if let Decision::Rebase { number, reason, .. } = &report.decision {
                info!(
                    pr_number = number,
                    reason = reason.as_str(),
                    commented = report.commented,
                    "run complete"
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            report_failure(&err);
            ExitCode::FAILURE
        }
    }
}
