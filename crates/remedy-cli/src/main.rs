//! Remedy CLI
//!
//! The `remedy` command runs automated static-analysis remediation against
//! a repository and exposes the individual building blocks for debugging.
//!
//! ## Commands
//!
//! - `run`: fork, analyse, patch, push and open a pull request
//! - `convert`: normalise an analysis report into JSON
//! - `issues`: show the issues the next attempt would work on
//! - `branch`: allocate a fresh remediation branch name for a working copy
//! - `doctor`: check the external tools and credentials

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use remedy_core::issues::{extract_first_file, issue_windows};
use markup_tree::ReportPaths;
use remedy_core::{
    cancel_pair, AttemptOutcome, AttemptReport, BranchAllocator, ChatCompletionsService,
    CredentialProvider, EnvCredentials, Pipeline, RemedyConfig, RepositoryReference,
    SuggestionService, Workspace,
};
use remedy_exec::{CommandSpec, ProcessGateway, TokioProcessGateway};
use serde::Serialize;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "remedy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated static-analysis remediation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "REMEDY_CONFIG")]
    config: Option<PathBuf>,

    /// Workspace root, overriding the configuration
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one remediation attempt against a repository
    Run {
        /// Repository URL, e.g. https://github.com/owner/name
        url: String,

        /// Print the attempt report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert a markup analysis report into normalized JSON
    Convert {
        /// Repository URL whose workspace report to convert
        #[arg(required_unless_present = "input", conflicts_with = "input")]
        repository: Option<String>,

        /// Markup file to convert
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output path (default: input with a .json extension)
        #[arg(short, long, requires = "input")]
        output: Option<PathBuf>,
    },

    /// Show the issues of the first reported file in a converted report
    Issues {
        /// Repository URL whose workspace report to read
        repository: String,
    },

    /// Allocate a fresh branch name for a working copy
    Branch {
        /// Path to the working copy
        repo_path: PathBuf,
    },

    /// Check external tools and credentials
    Doctor,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    remedy_core::init_tracing(cli.json_logs, level);

    match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let mut config = RemedyConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(workspace) = cli.workspace {
        config.workspace_root = workspace;
    }

    match cli.command {
        Commands::Run { url, json } => cmd_run(config, &url, json).await,
        Commands::Convert {
            repository,
            input,
            output,
        } => {
            cmd_convert(&config, repository.as_deref(), input.as_deref(), output.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Issues { repository } => {
            cmd_issues(&config, &repository)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Branch { repo_path } => {
            cmd_branch(&config, &repo_path)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Doctor => cmd_doctor(&config).await,
    }
}

async fn cmd_run(config: RemedyConfig, url: &str, json: bool) -> Result<ExitCode> {
    let pipeline = Pipeline::builder(config)
        .build()
        .context("Failed to assemble pipeline")?;

    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling attempt");
            handle.cancel();
        }
    });

    let report = pipeline.run_with_cancel(url, signal).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(if report.outcome.is_aborted() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_report(report: &AttemptReport) {
    println!("attempt   {}", report.attempt_id);
    println!("repo      {}", report.repository);
    println!("states    {}", report.state_trail().join(" -> "));
    if let Some(attempt) = &report.attempt {
        println!("branch    {}", attempt.branch_name);
    }
    match &report.outcome {
        AttemptOutcome::PullRequestOpened {
            url,
            already_existed,
        } => {
            let url = url.as_deref().unwrap_or("(url unavailable)");
            if *already_existed {
                println!("result    pull request already open: {url}");
            } else {
                println!("result    pull request opened: {url}");
            }
        }
        AttemptOutcome::NoChanges => println!("result    no changes to submit"),
        AttemptOutcome::NothingToDo { reason } => println!("result    nothing to do: {reason}"),
        AttemptOutcome::Aborted(failure) => {
            println!("result    {failure}");
            if !failure.diagnostics.is_empty() {
                println!("\n{}", failure.diagnostics);
            }
        }
    }
    println!("took      {} ms", report.duration_ms());
}

/// Workspace report paths of the repository at `url`.
fn workspace_reports(config: &RemedyConfig, url: &str) -> Result<ReportPaths> {
    let reference = RepositoryReference::parse(url)
        .with_context(|| format!("Not a repository URL: {url}"))?;
    Ok(Workspace::new(&config.workspace_root).report_paths(&reference))
}

/// `(markup, normalized)` paths for a repository's report or an explicit input file.
fn convert_paths(
    config: &RemedyConfig,
    repository: Option<&str>,
    input: Option<&Path>,
    output: Option<&Path>,
) -> Result<(PathBuf, PathBuf)> {
    match (repository, input) {
        (_, Some(input)) => {
            let output = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| input.with_extension("json"));
            Ok((input.to_path_buf(), output))
        }
        (Some(url), None) => {
            let reports = workspace_reports(config, url)?;
            Ok((reports.markup, reports.normalized))
        }
        (None, None) => bail!("either a repository URL or --input is required"),
    }
}

fn cmd_convert(
    config: &RemedyConfig,
    repository: Option<&str>,
    input: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let (markup, normalized) = convert_paths(config, repository, input, output)?;
    let document = markup_tree::convert_file(&markup, &normalized)
        .with_context(|| format!("Failed to convert {}", markup.display()))?;
    info!(root = %document.root_tag, output = %normalized.display(), "Converted report");
    println!("{}", normalized.display());
    Ok(())
}

#[derive(Serialize)]
struct IssuesView {
    path: String,
    issues: Vec<remedy_core::IssueRecord>,
    windows: Vec<remedy_core::IssueWindow>,
}

fn cmd_issues(config: &RemedyConfig, repository: &str) -> Result<()> {
    let reports = workspace_reports(config, repository)?;
    let document = if reports.normalized.is_file() {
        markup_tree::load_normalized(&reports.normalized)
    } else {
        markup_tree::convert_file(&reports.markup, &reports.normalized)
    }
    .with_context(|| format!("No usable report for {repository}"))?;

    match extract_first_file(&document, config.limits.issue_limit) {
        Some(file) => {
            let view = IssuesView {
                windows: issue_windows(&file.issues),
                path: file.path,
                issues: file.issues,
            };
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        None => println!("No issues reported for {repository}"),
    }
    Ok(())
}

fn cmd_branch(config: &RemedyConfig, repo_path: &Path) -> Result<()> {
    if !repo_path.is_dir() {
        bail!("{} is not a directory", repo_path.display());
    }
    let branch = BranchAllocator::new(config.branch_prefix.as_str())
        .allocate_blocking(repo_path)
        .context("Failed to allocate branch name")?;
    println!("{branch}");
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Check {
    Ok(String),
    Missing(String),
}

async fn tool_check(gateway: &dyn ProcessGateway, program: &str, version_arg: &str) -> Check {
    let spec = CommandSpec::new(program).arg(version_arg).timeout_secs(15);
    match gateway.run(&spec).await {
        Ok(out) if out.success() => {
            let first = out.stdout.lines().chain(out.stderr.lines()).next().unwrap_or("").trim();
            Check::Ok(first.to_string())
        }
        Ok(out) => Check::Missing(format!("exited with code {}", out.exit_code)),
        Err(err) => Check::Missing(err.to_string()),
    }
}

fn credential_check(value: Option<String>, name: &str) -> Check {
    match value {
        Some(_) => Check::Ok(format!("{name} is set")),
        None => Check::Missing(format!("{name} is not set")),
    }
}

async fn cmd_doctor(config: &RemedyConfig) -> Result<ExitCode> {
    let gateway = TokioProcessGateway::new();
    let credentials = EnvCredentials;

    let suggestion = match ChatCompletionsService::new(
        &config.suggestion,
        credentials.suggestion_key(),
        Duration::from_secs(config.timeouts.http_secs),
    ) {
        Ok(service) => {
            let service: Arc<dyn SuggestionService> = Arc::new(service);
            match service.probe().await {
                Ok(()) => Check::Ok(format!("{} answered", config.suggestion.model)),
                Err(err) => Check::Missing(err.to_string()),
            }
        }
        Err(err) => Check::Missing(err.to_string()),
    };

    let checks = [
        ("git", tool_check(&gateway, "git", "--version").await),
        (
            "analysis tool",
            tool_check(&gateway, &config.analysis.program, "--version").await,
        ),
        (
            "forge token",
            credential_check(credentials.forge_token(), remedy_core::credentials::ENV_FORGE_TOKEN),
        ),
        ("suggestion service", suggestion),
    ];

    let mut healthy = true;
    for (label, check) in &checks {
        match check {
            Check::Ok(detail) => println!("ok      {label:<20} {detail}"),
            Check::Missing(detail) => {
                healthy = false;
                println!("FAIL    {label:<20} {detail}");
            }
        }
    }

    Ok(if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use remedy_exec::fakes::ScriptedGateway;
    use remedy_exec::CommandOutput;

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["remedy", "run", "https://github.com/o/r", "--json", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Run { json: true, .. }));
    }

    #[test]
    fn test_convert_requires_repository_or_input() {
        assert!(Cli::try_parse_from(["remedy", "convert"]).is_err());
        assert!(Cli::try_parse_from([
            "remedy",
            "convert",
            "https://github.com/acme/demo",
            "--input",
            "a.xml"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["remedy", "convert", "--input", "a.xml"]).is_ok());
    }

    #[test]
    fn test_convert_paths() {
        let mut config = RemedyConfig::default();
        config.workspace_root = PathBuf::from("/ws");

        let (markup, normalized) =
            convert_paths(&config, Some("git@github.com:acme/demo.git"), None, None).unwrap();
        assert_eq!(markup, PathBuf::from("/ws/analysis/github.com/acme/demo.xml"));
        assert_eq!(normalized, PathBuf::from("/ws/analysis/github.com/acme/demo.json"));
        assert!(convert_paths(&config, Some("https://github.com/acme/.."), None, None).is_err());

        let (markup, normalized) =
            convert_paths(&config, None, Some(Path::new("/tmp/r.xml")), None).unwrap();
        assert_eq!(markup, PathBuf::from("/tmp/r.xml"));
        assert_eq!(normalized, PathBuf::from("/tmp/r.json"));
    }

    #[test]
    fn test_cmd_convert_with_explicit_paths() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("report.xml");
        let output = dir.path().join("out/report.json");
        std::fs::write(
            &input,
            r#"<checkstyle version="10"><file name="A.java"><error line="2"/></file></checkstyle>"#,
        )
        .unwrap();

        cmd_convert(&RemedyConfig::default(), None, Some(&input), Some(&output)).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert!(json.is_object());
    }

    #[test]
    fn test_cmd_branch_records_in_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("demo");
        std::fs::create_dir_all(&repo).unwrap();

        cmd_branch(&RemedyConfig::default(), &repo).unwrap();
        let ledger = std::fs::read_to_string(dir.path().join("demo.branches")).unwrap();
        assert!(ledger.starts_with("remedy-patch-"));
    }

    #[tokio::test]
    async fn test_tool_check() {
        let gateway = ScriptedGateway::new()
            .on("git", &["--version"], CommandOutput::ok("git version 2.43.0\n"))
            .on("checkstyle", &["--version"], CommandOutput::failed(127, "not found"));
        assert_eq!(
            tool_check(&gateway, "git", "--version").await,
            Check::Ok("git version 2.43.0".to_string())
        );
        assert!(matches!(
            tool_check(&gateway, "checkstyle", "--version").await,
            Check::Missing(_)
        ));
    }

    #[test]
    fn test_credential_check() {
        assert!(matches!(credential_check(None, "TOKEN"), Check::Missing(_)));
        assert!(matches!(credential_check(Some("x".into()), "TOKEN"), Check::Ok(_)));
    }
}
