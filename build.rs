use std::env;
use std::fs;
use std::process::Command;

fn main() {
    // Read version from VERSION file or use Cargo.toml version
    let version = fs::read_to_string("VERSION")
        .unwrap_or_else(|_| env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "unknown".to_string()))
        .trim()
        .to_string();

    let git_hash = command_output("git", &["rev-parse", "--short", "HEAD"]);
    let git_branch = command_output("git", &["rev-parse", "--abbrev-ref", "HEAD"]);
    let git_dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .map(|output| output.status.success() && !output.stdout.is_empty())
        .unwrap_or(false);

    // Get build timestamp
    let build_date = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();

    // Get build profile (debug/release)
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    let rustc_version = command_output("rustc", &["--version"]);

    // Set environment variables for the build
    println!("cargo:rustc-env=POMOTRACK_VERSION={}", version);
    println!("cargo:rustc-env=POMOTRACK_GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=POMOTRACK_GIT_BRANCH={}", git_branch);
    println!("cargo:rustc-env=POMOTRACK_GIT_DIRTY={}", git_dirty);
    println!("cargo:rustc-env=POMOTRACK_BUILD_DATE={}", build_date);
    println!("cargo:rustc-env=POMOTRACK_BUILD_PROFILE={}", profile);
    println!("cargo:rustc-env=POMOTRACK_RUSTC_VERSION={}", rustc_version);

    // Tell Cargo to rerun if VERSION file or git state changes
    println!("cargo:rerun-if-changed=VERSION");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
}

/// Trimmed stdout of a successful command, or "unknown".
fn command_output(program: &str, args: &[&str]) -> String {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
