#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{path::PathBuf, time::Duration};

use bon::Builder;

use crate::error::EvalError;

/// Environment variable holding the service API key.
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// OpenAI-compatible endpoint used when no base URL is configured.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Grader A favours consistency.
pub const DEFAULT_GRADER_A_TEMPERATURE: f32 = 0.4;

/// Grader B favours diversity.
pub const DEFAULT_GRADER_B_TEMPERATURE: f32 = 0.8;

/// Default per-call timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Upper bound accepted for any sampling temperature.
const MAX_TEMPERATURE: f32 = 2.0;

/// Settings shared by every stage of an evaluation.
#[derive(Debug, Clone, Builder)]
#[builder(on(String, into))]
pub struct EvaluatorConfig {
    /// API key sent with every service request.
    api_key:               String,
    /// Base URL of the OpenAI-compatible endpoint.
    #[builder(default = DEFAULT_API_BASE.to_string())]
    api_base:              String,
    /// Model identifier for all three calls.
    #[builder(default = DEFAULT_MODEL.to_string())]
    model:                 String,
    /// Sampling temperature for grader A.
    #[builder(default = DEFAULT_GRADER_A_TEMPERATURE)]
    grader_a_temperature:  f32,
    /// Sampling temperature for grader B.
    #[builder(default = DEFAULT_GRADER_B_TEMPERATURE)]
    grader_b_temperature:  f32,
    /// Sampling temperature for the moderator; service default when unset.
    moderator_temperature: Option<f32>,
    /// Deadline for a single remote call.
    #[builder(default = Duration::from_secs(DEFAULT_TIMEOUT_SECS))]
    request_timeout:       Duration,
    /// Extra attempts allowed after a transient service failure.
    #[builder(default = 0)]
    max_retries:           u32,
    /// Delay before the first retry; doubles on each further attempt.
    #[builder(default = Duration::from_millis(1000))]
    retry_backoff:         Duration,
    /// How many papers a batch evaluates at once.
    #[builder(default = 1)]
    batch_concurrency:     usize,
    /// Directive prefixed to every prompt, if any.
    calibration:           Option<String>,
    /// File overriding the embedded grader template.
    grader_prompt_path:    Option<PathBuf>,
    /// File overriding the embedded moderator template.
    moderator_prompt_path: Option<PathBuf>,
}

impl EvaluatorConfig {
    /// Reads configuration from the process environment.
    ///
    /// Fails with a value error when the API key is missing or empty, or when
    /// a configured temperature is out of range.
    pub fn from_env() -> Result<Self, EvalError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EvalError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let api_key = get(API_KEY_VAR).ok_or_else(|| {
            EvalError::value(format!("{API_KEY_VAR} not found in environment variables."))
        })?;

        let parse_f32 = |key: &str| get(key).and_then(|s| s.parse::<f32>().ok());
        let parse_u64 = |key: &str| get(key).and_then(|s| s.parse::<u64>().ok());

        let config = Self::builder()
            .api_key(api_key)
            .api_base(get("PAPER_GRADER_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into()))
            .model(get("PAPER_GRADER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()))
            .grader_a_temperature(
                parse_f32("PAPER_GRADER_TEMPERATURE_A").unwrap_or(DEFAULT_GRADER_A_TEMPERATURE),
            )
            .grader_b_temperature(
                parse_f32("PAPER_GRADER_TEMPERATURE_B").unwrap_or(DEFAULT_GRADER_B_TEMPERATURE),
            )
            .maybe_moderator_temperature(parse_f32("PAPER_GRADER_MODERATOR_TEMPERATURE"))
            .request_timeout(Duration::from_secs(
                parse_u64("PAPER_GRADER_TIMEOUT_SECS").unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .max_retries(
                parse_u64("PAPER_GRADER_MAX_RETRIES")
                    .and_then(|n| u32::try_from(n).ok())
                    .unwrap_or(0),
            )
            .retry_backoff(Duration::from_millis(
                parse_u64("PAPER_GRADER_RETRY_BACKOFF_MS").unwrap_or(1000),
            ))
            .batch_concurrency(
                parse_u64("PAPER_GRADER_BATCH_CONCURRENCY")
                    .and_then(|n| usize::try_from(n).ok())
                    .unwrap_or(1),
            )
            .maybe_calibration(get("PAPER_GRADER_CALIBRATION"))
            .maybe_grader_prompt_path(get("PAPER_GRADER_GRADER_PROMPT").map(PathBuf::from))
            .maybe_moderator_prompt_path(get("PAPER_GRADER_MODERATOR_PROMPT").map(PathBuf::from))
            .build();

        config.validate()?;
        Ok(config)
    }

    /// Checks that every temperature lies in the accepted range and that
    /// calls get a non-zero time budget.
    pub fn validate(&self) -> Result<(), EvalError> {
        if self.request_timeout.is_zero() {
            return Err(EvalError::value("Request timeout must be greater than zero"));
        }
        let temps = [
            ("grader A", Some(self.grader_a_temperature)),
            ("grader B", Some(self.grader_b_temperature)),
            ("moderator", self.moderator_temperature),
        ];
        for (who, temp) in temps {
            if let Some(t) = temp
                && !(0.0..=MAX_TEMPERATURE).contains(&t)
            {
                return Err(EvalError::value(format!(
                    "Temperature for {who} must be between 0 and {MAX_TEMPERATURE}, got {t}"
                )));
            }
        }
        Ok(())
    }

    /// Returns the API key.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Returns the model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns grader A's temperature.
    pub fn grader_a_temperature(&self) -> f32 {
        self.grader_a_temperature
    }

    /// Returns grader B's temperature.
    pub fn grader_b_temperature(&self) -> f32 {
        self.grader_b_temperature
    }

    /// Returns the moderator's temperature, if configured.
    pub fn moderator_temperature(&self) -> Option<f32> {
        self.moderator_temperature
    }

    /// Returns the per-call timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the retry budget for transient failures.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the initial retry delay.
    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff
    }

    /// Returns the number of papers evaluated concurrently in batch mode
    /// (never zero).
    pub fn batch_concurrency(&self) -> usize {
        self.batch_concurrency.max(1)
    }

    /// Returns the calibration directive, if any.
    pub fn calibration(&self) -> Option<&str> {
        self.calibration.as_deref()
    }

    /// Returns the grader template override path, if any.
    pub fn grader_prompt_path(&self) -> Option<&PathBuf> {
        self.grader_prompt_path.as_ref()
    }

    /// Returns the moderator template override path, if any.
    pub fn moderator_prompt_path(&self) -> Option<&PathBuf> {
        self.moderator_prompt_path.as_ref()
    }

    /// Replaces the model identifier.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Replaces the calibration directive.
    pub fn set_calibration(&mut self, calibration: Option<String>) {
        self.calibration = calibration;
    }

    /// Replaces the batch concurrency.
    pub fn set_batch_concurrency(&mut self, n: usize) {
        self.batch_concurrency = n;
    }
}
