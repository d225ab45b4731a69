//! Real git fixtures: a bare repository standing in for the fork remote.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

pub const APP_JAVA: &str = "public class App {\n    public static void main(String[] args) {\n        System.out.println(\"hi\");\n    }\n}\n";

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=Fixture", "-c", "user.email=fixture@example.test"])
        .args(["-c", "commit.gpgsign=false", "-c", "init.defaultBranch=main"])
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("git is installed");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Bare remote at `<root>/remote.git` whose `main` holds `src/App.java`.
pub fn bare_remote(root: &Path) -> PathBuf {
    let remote = root.join("remote.git");
    std::fs::create_dir_all(&remote).unwrap();
    git(&remote, &["init", "--bare", "-q"]);
    git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"]);

    let seed = root.join("seed");
    std::fs::create_dir_all(seed.join("src")).unwrap();
    git(&seed, &["init", "-q"]);
    git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    std::fs::write(seed.join("src/App.java"), APP_JAVA).unwrap();
    git(&seed, &["add", "."]);
    git(&seed, &["commit", "-q", "-m", "Initial commit"]);
    git(&seed, &["remote", "add", "origin", remote.to_str().unwrap()]);
    git(&seed, &["push", "-q", "origin", "main"]);
    remote
}

/// Working copy of `remote` at `dest`.
pub fn clone_into(remote: &Path, dest: &Path) {
    std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
    git(
        dest.parent().unwrap(),
        &["clone", "-q", remote.to_str().unwrap(), dest.to_str().unwrap()],
    );
}

pub fn remote_has_branch(remote: &Path, branch: &str) -> bool {
    Command::new("git")
        .args(["rev-parse", "--verify", "--quiet", &format!("refs/heads/{branch}")])
        .current_dir(remote)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub fn remote_file(remote: &Path, branch: &str, path: &str) -> String {
    git(remote, &["show", &format!("{branch}:{path}")])
}
