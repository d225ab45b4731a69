//! Pipeline orchestrator: sequences the stages of one remediation attempt,
//! maps the first failure to a [`StageFailure`], and always releases the
//! attempt's local state before returning.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use forge_client::{ForgeConfig, GitHubClient};
use futures::FutureExt;
use markup_tree::convert_file;
use remedy_exec::{ProcessGateway, TokioProcessGateway};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use super::guard::ResourceGuard;
use super::outcome::{AttemptOutcome, AttemptReport};
use super::state::{PipelineState, StageEvent};
use crate::analysis::AnalysisRunner;
use crate::cancel::CancelSignal;
use crate::config::RemedyConfig;
use crate::credentials::{CredentialProvider, EnvCredentials};
use crate::domain::error::{RemedyError, Result};
use crate::domain::{ErrorKind, FileIssues, RemediationAttempt, RepositoryReference, Stage, StageFailure};
use crate::forge::Forge;
use crate::history::snapshot_commits;
use crate::issues::{extract_first_file, issue_windows, resolve_target};
use crate::ledger::BranchAllocator;
use crate::obs;
use crate::patch::{PatchStage, PatchStep};
use crate::repo::RepoManager;
use crate::submit::{PrOutcome, PrSubmitter};
use crate::suggest::{ChatCompletionsService, SuggestionRequest, SuggestionService};
use crate::validate::{ForgeValidator, UrlValidator};
use crate::workspace::{WorkingCopyLock, Workspace};

/// Mutable per-attempt state shared by the stages.
struct AttemptContext {
    attempt_id: String,
    progress: Option<UnboundedSender<StageEvent>>,
    transitions: Mutex<Vec<StageEvent>>,
    stage: Mutex<Stage>,
    guard: Mutex<ResourceGuard>,
    working_copy: Mutex<Option<WorkingCopyLock>>,
    attempt: Mutex<Option<RemediationAttempt>>,
}

impl AttemptContext {
    fn new(attempt_id: String, progress: Option<UnboundedSender<StageEvent>>) -> Self {
        Self {
            attempt_id,
            progress,
            transitions: Mutex::new(Vec::new()),
            stage: Mutex::new(Stage::Validate),
            guard: Mutex::new(ResourceGuard::new()),
            working_copy: Mutex::new(None),
            attempt: Mutex::new(None),
        }
    }

    fn transition(&self, state: PipelineState) {
        let event = StageEvent {
            attempt_id: self.attempt_id.clone(),
            state,
            at: Utc::now(),
        };
        info!(event = "state.changed", state = %state);
        if let Some(tx) = &self.progress {
            let _ = tx.send(event.clone());
        }
        lock(&self.transitions).push(event);
    }

    fn enter(&self, stage: Stage) {
        *lock(&self.stage) = stage;
    }

    fn current_stage(&self) -> Stage {
        *lock(&self.stage)
    }

    fn track(&self, paths: Vec<PathBuf>) {
        let mut guard = lock(&self.guard);
        for path in paths {
            guard.track(path);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What the suggestion stage decided.
enum Suggestion {
    Replacement { target: PathBuf, content: String },
    Skipped { reason: String },
}

/// One configured pipeline; `run` may be called for many repositories.
pub struct Pipeline {
    config: RemedyConfig,
    workspace: Workspace,
    gateway: Arc<dyn ProcessGateway>,
    forge: Arc<dyn Forge>,
    validator: Arc<dyn UrlValidator>,
    suggester: Arc<dyn SuggestionService>,
    credentials: Arc<dyn CredentialProvider>,
    allocator: BranchAllocator,
    progress: Option<UnboundedSender<StageEvent>>,
}

impl Pipeline {
    pub fn builder(config: RemedyConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn config(&self) -> &RemedyConfig {
        &self.config
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run one attempt without external cancellation.
    pub async fn run(&self, url: &str) -> AttemptReport {
        self.run_with_cancel(url, CancelSignal::never()).await
    }

    /// Run one attempt; `cancel` aborts the current stage and skips to cleanup.
    pub async fn run_with_cancel(&self, url: &str, mut cancel: CancelSignal) -> AttemptReport {
        let attempt_id = Uuid::new_v4().to_string();
        let span = obs::attempt_span(&attempt_id, url);
        let started_at = Utc::now();
        let clock = Instant::now();
        let ctx = AttemptContext::new(attempt_id.clone(), self.progress.clone());

        let outcome = async {
            obs::emit_attempt_started(&attempt_id, url);
            ctx.transition(PipelineState::Init);

            let driven = AssertUnwindSafe(self.drive(url, &ctx, &mut cancel))
                .catch_unwind()
                .await;
            let outcome = match driven {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(failure)) => AttemptOutcome::Aborted(failure),
                Err(panic) => {
                    let stage = ctx.current_stage();
                    let message = panic_message(panic.as_ref());
                    obs::emit_stage_failed(stage, ErrorKind::Internal, &message);
                    AttemptOutcome::Aborted(StageFailure {
                        stage,
                        kind: ErrorKind::Internal,
                        message: format!("stage panicked: {message}"),
                        diagnostics: String::new(),
                    })
                }
            };

            if let AttemptOutcome::Aborted(failure) = &outcome {
                ctx.transition(PipelineState::Aborted {
                    stage: failure.stage,
                    kind: failure.kind,
                });
            }
            self.cleanup(&ctx).await;
            ctx.transition(PipelineState::Cleaned);
            obs::emit_attempt_finished(&attempt_id, outcome.label(), clock.elapsed().as_millis() as u64);
            outcome
        }
        .instrument(span)
        .await;

        let AttemptContext {
            transitions,
            attempt,
            ..
        } = ctx;
        AttemptReport {
            attempt_id,
            repository: url.to_string(),
            outcome,
            attempt: attempt.into_inner().unwrap_or_else(PoisonError::into_inner),
            transitions: transitions.into_inner().unwrap_or_else(PoisonError::into_inner),
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn cleanup(&self, ctx: &AttemptContext) {
        ctx.enter(Stage::Cleanup);
        obs::emit_stage_started(Stage::Cleanup);
        let clock = Instant::now();
        let mut guard = std::mem::take(&mut *lock(&ctx.guard));
        let failures = match tokio::task::spawn_blocking(move || guard.release()).await {
            Ok(failures) => failures,
            Err(e) => {
                warn!(error = %e, "Cleanup task failed");
                1
            }
        };
        // Only after the working copy is gone may another attempt claim it.
        drop(lock(&ctx.working_copy).take());
        if failures > 0 {
            obs::emit_stage_failed(
                Stage::Cleanup,
                ErrorKind::CleanupFailed,
                &format!("{failures} path(s) could not be removed"),
            );
        } else {
            obs::emit_stage_finished(Stage::Cleanup, clock.elapsed().as_millis() as u64);
        }
    }

    /// Run `work` as `stage`, racing it against cancellation.
    async fn stage<T, F>(
        &self,
        ctx: &AttemptContext,
        cancel: &mut CancelSignal,
        stage: Stage,
        work: F,
    ) -> std::result::Result<T, StageFailure>
    where
        F: Future<Output = Result<T>>,
    {
        ctx.enter(stage);
        obs::emit_stage_started(stage);
        let clock = Instant::now();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RemedyError::Cancelled),
            result = work => result,
        };

        match result {
            Ok(value) => {
                obs::emit_stage_finished(stage, clock.elapsed().as_millis() as u64);
                Ok(value)
            }
            Err(err) => {
                obs::emit_stage_failed(stage, err.kind(), &err);
                Err(StageFailure::new(stage, &err))
            }
        }
    }

    async fn drive(
        &self,
        url: &str,
        ctx: &AttemptContext,
        cancel: &mut CancelSignal,
    ) -> std::result::Result<AttemptOutcome, StageFailure> {
        let config = &self.config;

        let reference = self
            .stage(ctx, cancel, Stage::Validate, async {
                let reference = RepositoryReference::parse(url)?;
                if !self.validator.check(&reference).await {
                    return Err(RemedyError::Unreachable(reference.to_string()));
                }
                Ok::<_, RemedyError>(reference)
            })
            .await?;
        ctx.transition(PipelineState::Validated);

        let repos = RepoManager::new(self.forge.clone(), self.gateway.clone(), self.workspace.clone())
            .with_fork_owner(config.forge.fork_owner.clone())
            .with_timeouts(config.timeouts.clone_secs, config.timeouts.git_secs);

        let fork = self
            .stage(ctx, cancel, Stage::Fork, async {
                self.workspace.ensure()?;
                let claim = self.workspace.lock_working_copy(&reference).await?;
                *lock(&ctx.working_copy) = Some(claim);
                ctx.track(self.workspace.disposable_paths(&reference));
                repos.fork(&reference).await
            })
            .await?;
        ctx.transition(PipelineState::Forked);

        let local = self
            .stage(ctx, cancel, Stage::Clone, repos.clone_fork(&fork, &reference))
            .await?;
        ctx.transition(PipelineState::Cloned);

        let reports = self.workspace.report_paths(&reference);
        let analysis = AnalysisRunner::new(
            self.gateway.clone(),
            config.analysis.clone(),
            config.timeouts.analysis_secs,
        );
        self.stage(ctx, cancel, Stage::Analyze, analysis.run(&local, &reports))
            .await?;
        ctx.transition(PipelineState::Analyzed);

        let issue_limit = config.limits.issue_limit;
        let file_issues = self
            .stage(ctx, cancel, Stage::Convert, async {
                let (markup, normalized) = (reports.markup.clone(), reports.normalized.clone());
                let document = tokio::task::spawn_blocking(move || convert_file(&markup, &normalized))
                    .await
                    .map_err(|e| RemedyError::Internal(format!("conversion task failed: {e}")))??;
                snapshot_commits(
                    self.forge.as_ref(),
                    &reference,
                    config.limits.commit_history,
                    &self.workspace.commits_path(&reference),
                )
                .await;
                Ok::<_, RemedyError>(extract_first_file(&document, issue_limit))
            })
            .await?;
        ctx.transition(PipelineState::Converted);

        let Some(file_issues) = file_issues else {
            info!(repository = %reference, "Analysis reported no issues");
            return Ok(AttemptOutcome::NothingToDo {
                reason: "analysis reported no issues".to_string(),
            });
        };

        let suggestion = self
            .stage(ctx, cancel, Stage::Suggest, self.suggest(&local.path, file_issues))
            .await?;
        let (target, content) = match suggestion {
            Suggestion::Replacement { target, content } => (target, content),
            Suggestion::Skipped { reason } => {
                info!(repository = %reference, reason = %reason, "Skipping suggestion");
                return Ok(AttemptOutcome::NothingToDo { reason });
            }
        };

        let patch = PatchStage::new(
            self.gateway.clone(),
            self.allocator.clone(),
            self.credentials.clone(),
            config.commit.clone(),
            config.timeouts.git_secs,
        );
        let mut observe = |step: PatchStep| {
            ctx.transition(match step {
                PatchStep::Prepared { changed } => PipelineState::Patched { changed },
                PatchStep::Committed => PipelineState::Committed,
                PatchStep::Pushed => PipelineState::Pushed,
            })
        };
        let attempt = self
            .stage(
                ctx,
                cancel,
                Stage::Patch,
                patch.apply_observed(&local, &target, &content, &config.commit.message, &mut observe),
            )
            .await?;
        *lock(&ctx.attempt) = Some(attempt.clone());

        if !attempt.changed {
            return Ok(AttemptOutcome::NoChanges);
        }

        let submitter = PrSubmitter::new(self.forge.clone(), config.retry.clone());
        let submitted = self
            .stage(
                ctx,
                cancel,
                Stage::Submit,
                submitter.submit(
                    &fork,
                    &reference,
                    &attempt.branch_name,
                    &local.default_branch,
                    &config.pull_request.title,
                    &config.pull_request.body,
                ),
            )
            .await?;
        ctx.transition(PipelineState::PrSubmitted);

        let url = submitted.url().map(str::to_string);
        if let Some(recorded) = lock(&ctx.attempt).as_mut() {
            recorded.pr_url = url.clone();
        }
        Ok(AttemptOutcome::PullRequestOpened {
            url,
            already_existed: matches!(submitted, PrOutcome::AlreadyExists { .. }),
        })
    }

    async fn suggest(&self, repo_root: &std::path::Path, file: FileIssues) -> Result<Suggestion> {
        let target = resolve_target(repo_root, &file.path)?;
        let full = repo_root.join(&target);
        let content = tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| RemedyError::io(&full, e))?;

        let lines = content.lines().count();
        let max_lines = self.config.limits.max_file_lines;
        if lines > max_lines {
            return Ok(Suggestion::Skipped {
                reason: format!("{} has {lines} lines (limit {max_lines})", target.display()),
            });
        }

        let request = SuggestionRequest {
            path: target.to_string_lossy().into_owned(),
            windows: issue_windows(&file.issues),
            issues: file.issues,
            content,
        };
        let replacement = self.suggester.suggest(&request).await?;
        Ok(Suggestion::Replacement {
            target,
            content: replacement,
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Assembles a [`Pipeline`]; collaborators not supplied are built from the
/// configuration and the credential provider.
pub struct PipelineBuilder {
    config: RemedyConfig,
    gateway: Option<Arc<dyn ProcessGateway>>,
    forge: Option<Arc<dyn Forge>>,
    validator: Option<Arc<dyn UrlValidator>>,
    suggester: Option<Arc<dyn SuggestionService>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    allocator: Option<BranchAllocator>,
    progress: Option<UnboundedSender<StageEvent>>,
}

impl PipelineBuilder {
    pub fn new(config: RemedyConfig) -> Self {
        Self {
            config,
            gateway: None,
            forge: None,
            validator: None,
            suggester: None,
            credentials: None,
            allocator: None,
            progress: None,
        }
    }

    pub fn gateway(mut self, gateway: Arc<dyn ProcessGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn forge(mut self, forge: Arc<dyn Forge>) -> Self {
        self.forge = Some(forge);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn UrlValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn suggester(mut self, suggester: Arc<dyn SuggestionService>) -> Self {
        self.suggester = Some(suggester);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn allocator(mut self, allocator: BranchAllocator) -> Self {
        self.allocator = Some(allocator);
        self
    }

    /// Publish every state transition on `tx`.
    pub fn progress(mut self, tx: UnboundedSender<StageEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let config = self.config;
        let credentials: Arc<dyn CredentialProvider> = match self.credentials {
            Some(credentials) => credentials,
            None => Arc::new(EnvCredentials),
        };

        let forge: Arc<dyn Forge> = match self.forge {
            Some(forge) => forge,
            None => Arc::new(
                GitHubClient::new(ForgeConfig {
                    api_base_url: config.forge.api_base_url.clone(),
                    token: credentials.forge_token(),
                    user_agent: config.forge.user_agent.clone(),
                    timeout: Duration::from_secs(config.timeouts.http_secs),
                })
                .map_err(|e| RemedyError::Config(e.to_string()))?,
            ),
        };
        let validator: Arc<dyn UrlValidator> = match self.validator {
            Some(validator) => validator,
            None => Arc::new(ForgeValidator::new(forge.clone())),
        };
        let suggester: Arc<dyn SuggestionService> = match self.suggester {
            Some(suggester) => suggester,
            None => Arc::new(ChatCompletionsService::new(
                &config.suggestion,
                credentials.suggestion_key(),
                Duration::from_secs(config.timeouts.suggestion_secs),
            )?),
        };
        let gateway: Arc<dyn ProcessGateway> = match self.gateway {
            Some(gateway) => gateway,
            None => Arc::new(TokioProcessGateway::new()),
        };
        let allocator = self
            .allocator
            .unwrap_or_else(|| BranchAllocator::new(config.branch_prefix.clone()));

        Ok(Pipeline {
            workspace: Workspace::new(config.workspace_root.clone()),
            config,
            gateway,
            forge,
            validator,
            suggester,
            credentials,
            allocator,
            progress: self.progress,
        })
    }
}
