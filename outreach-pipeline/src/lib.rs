//! Creator outreach pipeline
//!
//! Batch stages that take a lead from keyword discovery through scoring,
//! asset generation, drafting, paced dispatch, and follow-up. The CLI in
//! `main.rs` wires these onto subcommands; everything stateful lives in
//! the shared lead store from `outreach-common`.

pub mod followup;
pub mod runners;
pub mod scheduler;
pub mod scoring;
pub mod services;
