//! Stage runners
//!
//! One module per pipeline stage plus the operator command set. Runners
//! are batch jobs: load the eligible leads, process each with per-lead
//! error isolation, report a summary.

pub mod dispatch;
pub mod draft_email;
pub mod followup_run;
pub mod generate_assets;
pub mod harvest;
pub mod manage;
pub mod refine;
pub mod upload;
