//! Scripted gateway for tests
//!
//! `ScriptedGateway` answers commands from first-match rules and records
//! every call. Unmatched commands go to an optional fallback gateway (for
//! example a real [`crate::TokioProcessGateway`] for git) or succeed with
//! empty output.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::command::{CommandOutput, CommandSpec};
use crate::error::ExecResult;
use crate::runner::ProcessGateway;

type Responder = Arc<dyn Fn(&CommandSpec) -> ExecResult<CommandOutput> + Send + Sync>;

struct Rule {
    program: String,
    prefix: Vec<String>,
    responder: Responder,
}

impl Rule {
    fn matches(&self, spec: &CommandSpec) -> bool {
        let prefix: Vec<&str> = self.prefix.iter().map(String::as_str).collect();
        self.program == spec.program && spec.args_start_with(&prefix)
    }
}

/// Gateway that replays canned results and records calls.
#[derive(Default)]
pub struct ScriptedGateway {
    rules: Vec<Rule>,
    fallback: Option<Arc<dyn ProcessGateway>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delegate unmatched commands to `gateway`.
    pub fn with_fallback(mut self, gateway: Arc<dyn ProcessGateway>) -> Self {
        self.fallback = Some(gateway);
        self
    }

    /// Answer `program <prefix...>` with a fixed output.
    pub fn on(self, program: &str, prefix: &[&str], output: CommandOutput) -> Self {
        self.on_fn(program, prefix, move |_| Ok(output.clone()))
    }

    /// Answer `program <prefix...>` by calling `responder`.
    pub fn on_fn<F>(mut self, program: &str, prefix: &[&str], responder: F) -> Self
    where
        F: Fn(&CommandSpec) -> ExecResult<CommandOutput> + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            program: program.to_string(),
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            responder: Arc::new(responder),
        });
        self
    }

    /// All calls seen so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls to `program` whose arguments start with `prefix`.
    pub fn count(&self, program: &str, prefix: &[&str]) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.program == program && c.args_start_with(prefix))
            .count()
    }
}

#[async_trait]
impl ProcessGateway for ScriptedGateway {
    async fn run(&self, spec: &CommandSpec) -> ExecResult<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());

        if let Some(rule) = self.rules.iter().find(|r| r.matches(spec)) {
            return (rule.responder)(spec);
        }
        match &self.fallback {
            Some(gateway) => gateway.run(spec).await,
            None => Ok(CommandOutput::ok("")),
        }
    }
}
