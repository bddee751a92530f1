use crate::common::redirect_temp_dir;
use assert_cmd::Command;
use assert_fs::TempDir;
use rstest::fixture;
use std::path::Path;

#[fixture]
pub fn repository_dir() -> TempDir {
    redirect_temp_dir();
    TempDir::new().expect("Failed to create temp dir")
}

pub fn run_shoal_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("shoal").expect("Failed to find shoal binary");
    cmd.env_remove("RUST_LOG");
    cmd.env("NO_COLOR", "1");
    cmd.current_dir(dir);
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

/// `shoal commit` with a fixed author; `minutes` spaces the commit dates
pub fn shoal_commit(dir: &Path, message: &str, files: &[&str], minutes: u32) -> Command {
    let mut cmd = run_shoal_command(dir, &["commit", "-m", message]);
    cmd.args(files);
    cmd.envs(vec![
        ("GIT_AUTHOR_NAME", "fake_user".to_string()),
        ("GIT_AUTHOR_EMAIL", "fake_email@email.com".to_string()),
        (
            "GIT_AUTHOR_DATE",
            format!("2023-01-01 12:{:02}:00 +0000", minutes % 60),
        ),
    ]);
    cmd
}

/// Read the commit a branch points at straight from the ref file
pub fn branch_tip(dir: &Path, ref_path: &str) -> String {
    std::fs::read_to_string(dir.join(".git").join(ref_path))
        .unwrap_or_else(|e| panic!("Failed to read {ref_path}: {e}"))
        .trim()
        .to_string()
}
