//! Remediation pipeline
//!
//! `Init → Validated → Forked → Cloned → Analyzed → Converted →
//! Patched(changed|unchanged) → Committed → Pushed → PrSubmitted → Cleaned`,
//! with `Aborted` recorded before `Cleaned` on any failure.

pub mod guard;
pub mod orchestrator;
pub mod outcome;
pub mod state;

pub use guard::ResourceGuard;
pub use orchestrator::{Pipeline, PipelineBuilder};
pub use outcome::{AttemptOutcome, AttemptReport};
pub use state::{PipelineState, StageEvent};
