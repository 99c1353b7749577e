//! Build script for dependabot-rebase - embeds version information.
//!
//! `BUILD_INFO_HUMAN` is composed of the crate version, a git description
//! and the rustc version. The git description is `git describe --tags
//! --always --dirty` when a tag is reachable, otherwise a pseudo-version
//! `v{CARGO_PKG_VERSION}-{timestamp}-{commit}[+dirty]`. The timestamp is
//! the commit time for clean trees and the build time for dirty ones.

use std::{env, process::Command};

use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

fn main() {
    ["src", "build.rs", "Cargo.toml", "Cargo.lock"]
        .iter()
        .for_each(|path| println!("cargo:rerun-if-changed={path}"));

    let build_info = [
        Some(env!("CARGO_PKG_VERSION").to_string()),
        Some(format!("({})", git_version())),
        rustc_version(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");

    println!("cargo:rustc-env=BUILD_INFO_HUMAN={build_info}");
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn rustc_version() -> Option<String> {
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    run(&rustc, &["--version"])
}

/// `None` when git is unavailable or this is not a checkout.
fn is_dirty() -> Option<bool> {
    run("git", &["status", "--porcelain"])
        .map(|out| out.lines().any(|line| line.get(3..) != Some(".cargo-ok")))
        .or_else(|| run("git", &["rev-parse", "HEAD"]).map(|_| false))
}

fn git_version() -> String {
    match run("git", &["describe", "--tags", "--always", "--dirty"]) {
        Some(desc) if desc.contains('v') || desc.contains("-g") => desc,
        _ => pseudo_version(),
    }
}

fn pseudo_version() -> String {
    let commit = run("git", &["rev-parse", "--short=12", "HEAD"])
        .unwrap_or_else(|| "unknown".to_string());
    let dirty = is_dirty();

    let timestamp = match dirty {
        Some(false) => run("git", &["log", "-1", "--format=%ct"])
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now),
        _ => Utc::now(),
    }
    .format(TIMESTAMP_FORMAT);

    let suffix = if dirty == Some(true) { "+dirty" } else { "" };
    format!(
        "v{}-{timestamp}-{commit}{suffix}",
        env!("CARGO_PKG_VERSION")
    )
}
