//! Remedy process gateway
//!
//! Every external program the pipeline runs (git, the static-analysis
//! tool) goes through [`ProcessGateway`]: captured stdout/stderr, exit
//! code, per-command timeout, and secret masking in logs and output.

pub mod command;
pub mod error;
pub mod fakes;
pub mod runner;

pub use command::{CommandOutput, CommandSpec};
pub use error::{ExecError, ExecResult};
pub use runner::{ProcessGateway, TokioProcessGateway};
