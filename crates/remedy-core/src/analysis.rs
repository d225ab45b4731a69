//! Runs the external static-analysis tool for one working copy.

use std::sync::Arc;

use markup_tree::ReportPaths;
use remedy_exec::{CommandSpec, ProcessGateway};
use tracing::info;

use crate::config::AnalysisSettings;
use crate::domain::error::{RemedyError, Result};
use crate::domain::LocalRepoHandle;

/// Substitute `{repo}`, `{repo_path}` and `{report}` in each argument.
pub fn expand_args(args: &[String], repo: &str, repo_path: &str, report: &str) -> Vec<String> {
    args.iter()
        .map(|arg| {
            arg.replace("{repo_path}", repo_path)
                .replace("{report}", report)
                .replace("{repo}", repo)
        })
        .collect()
}

pub struct AnalysisRunner {
    gateway: Arc<dyn ProcessGateway>,
    settings: AnalysisSettings,
    timeout_secs: u64,
}

impl AnalysisRunner {
    pub fn new(gateway: Arc<dyn ProcessGateway>, settings: AnalysisSettings, timeout_secs: u64) -> Self {
        Self {
            gateway,
            settings,
            timeout_secs,
        }
    }

    pub fn command(&self, local: &LocalRepoHandle, reports: &ReportPaths) -> CommandSpec {
        let args = expand_args(
            &self.settings.args,
            &local.name,
            &local.path.to_string_lossy(),
            &reports.markup.to_string_lossy(),
        );
        CommandSpec::new(self.settings.program.as_str())
            .args(args)
            .current_dir(&local.path)
            .timeout_secs(self.timeout_secs)
    }

    /// Produce `reports.markup`. The report is the only output consumed;
    /// success needs exit code 0 and the file present afterwards.
    pub async fn run(&self, local: &LocalRepoHandle, reports: &ReportPaths) -> Result<()> {
        if let Some(dir) = reports.markup.parent() {
            std::fs::create_dir_all(dir).map_err(|e| RemedyError::io(dir, e))?;
        }
        match std::fs::remove_file(&reports.markup) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(RemedyError::io(&reports.markup, e)),
        }

        let spec = self.command(local, reports);
        info!(command = %spec.display_line(), "Running analysis");
        let output = self
            .gateway
            .run(&spec)
            .await
            .map_err(|e| RemedyError::AnalysisFailed {
                message: e.to_string(),
                diagnostics: e.diagnostics().to_string(),
            })?;

        if !output.success() {
            return Err(RemedyError::AnalysisFailed {
                message: format!("{} exited with code {}", spec.program, output.exit_code),
                diagnostics: output.diagnostics(),
            });
        }
        if !reports.markup.is_file() {
            return Err(RemedyError::AnalysisFailed {
                message: format!("no report written to {}", reports.markup.display()),
                diagnostics: output.diagnostics(),
            });
        }
        info!(report = %reports.markup.display(), duration_ms = output.duration_ms, "Analysis report ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use remedy_exec::fakes::ScriptedGateway;
    use remedy_exec::CommandOutput;

    fn local(dir: &std::path::Path) -> LocalRepoHandle {
        LocalRepoHandle {
            name: "demo".into(),
            path: dir.join("repos/demo"),
            default_branch: "main".into(),
        }
    }

    #[test]
    fn test_expand_args() {
        let args: Vec<String> = ["-o", "{report}", "{repo_path}", "--id={repo}"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            expand_args(&args, "demo", "/w/repos/demo", "/w/analysis/demo.xml"),
            vec!["-o", "/w/analysis/demo.xml", "/w/repos/demo", "--id=demo"]
        );
    }

    #[tokio::test]
    async fn test_success_requires_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let reports = ReportPaths::new(&dir.path().join("analysis"), "demo");
        let runner = AnalysisRunner::new(
            Arc::new(ScriptedGateway::new().on("checkstyle", &[], CommandOutput::ok("done"))),
            AnalysisSettings::default(),
            10,
        );
        let err = runner.run(&local(dir.path()), &reports).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AnalysisFailed);
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails_even_with_report() {
        let dir = tempfile::tempdir().unwrap();
        let reports = ReportPaths::new(&dir.path().join("analysis"), "demo");
        let markup = reports.markup.clone();
        let gateway = ScriptedGateway::new().on_fn("checkstyle", &[], move |_| {
            std::fs::write(&markup, "<checkstyle/>").unwrap();
            Ok(CommandOutput::failed(2, "config missing"))
        });
        let runner = AnalysisRunner::new(Arc::new(gateway), AnalysisSettings::default(), 10);
        let err = runner.run(&local(dir.path()), &reports).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AnalysisFailed);
        assert!(err.diagnostics().contains("config missing"));
    }

    #[tokio::test]
    async fn test_stale_report_is_removed_before_run() {
        let dir = tempfile::tempdir().unwrap();
        let reports = ReportPaths::new(&dir.path().join("analysis"), "demo");
        std::fs::create_dir_all(dir.path().join("analysis")).unwrap();
        std::fs::write(&reports.markup, "<checkstyle/>").unwrap();

        let runner = AnalysisRunner::new(
            Arc::new(ScriptedGateway::new()),
            AnalysisSettings::default(),
            10,
        );
        assert!(runner.run(&local(dir.path()), &reports).await.is_err());
        assert!(!reports.markup.exists());
    }

    #[tokio::test]
    async fn test_report_written_by_tool_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let reports = ReportPaths::new(&dir.path().join("analysis"), "demo");
        let gateway = ScriptedGateway::new().on_fn("checkstyle", &[], |spec| {
            let report = spec
                .args
                .iter()
                .position(|a| a == "-o")
                .map(|i| spec.args[i + 1].clone())
                .unwrap();
            std::fs::write(report, "<checkstyle/>").unwrap();
            Ok(CommandOutput::ok(""))
        });
        let runner = AnalysisRunner::new(Arc::new(gateway), AnalysisSettings::default(), 10);
        runner.run(&local(dir.path()), &reports).await.unwrap();
        assert!(reports.markup.is_file());
    }
}
