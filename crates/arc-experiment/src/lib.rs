//! ARC Experiment: LLM-driven search over abstract reasoning grid tasks.
//!
//! This crate drives a chat model against ARC tasks and scores its answers
//! with `arc-kernel`:
//! - Hybrid single-chain revision over code or grid answers
//! - Evolutionary search over transformation programs
//! - Evolutionary transduction over directly predicted grids

pub mod chat_client;
pub mod config;
pub mod experiment;
pub mod population;
pub mod prompts;
pub mod results;
pub mod sampling;
pub mod transcript;
