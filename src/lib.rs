//! # paper-grader
//!
//! Grades student papers against a rubric. Two independent graders evaluate
//! each paper concurrently at different sampling temperatures, then a
//! moderator reconciles both evaluations into one final report.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Grader, coordinator and moderator agents
pub mod agent;
/// Environment-driven configuration
pub mod config;
/// Error types shared across the crate
pub mod error;
/// Single-paper and batch evaluation
pub mod pipeline;
/// Prompt templates and assembly
pub mod prompt;
/// Batch report rendering
pub mod report;
/// Generative-text service client
pub mod service;
/// Rubric and paper text extraction
pub mod source;
/// Utility functions for convenience
pub mod util;

pub use config::EvaluatorConfig;
pub use error::{ErrorKind, EvalError, GraderLabel, ServiceError};
pub use pipeline::{BatchFailure, BatchSummary, Evaluation, Evaluator};
pub use prompt::{PromptRole, Prompts, build_prompt};
pub use service::{OpenAiService, TextService};
pub use source::{FsTextSource, RubricFormat, TextSource, load_rubric};
