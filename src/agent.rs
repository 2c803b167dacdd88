#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The three service-backed roles: two graders and a moderator.

use std::{sync::Arc, time::Duration};

use tokio::{
    task::{JoinError, JoinHandle},
    time::{sleep, timeout},
};

use crate::{
    config::EvaluatorConfig,
    error::{EvalError, GraderLabel, ServiceError},
    prompt::{PromptRole, Prompts, build_prompt},
    service::TextService,
};

/// Timeout and retry rules applied to every remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Deadline for one attempt.
    pub timeout:     Duration,
    /// Extra attempts after a transient failure.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each later one.
    pub backoff:     Duration,
}

impl CallPolicy {
    /// Takes the call rules from `config`.
    pub fn from_config(config: &EvaluatorConfig) -> Self {
        Self {
            timeout:     config.request_timeout(),
            max_retries: config.max_retries(),
            backoff:     config.retry_backoff(),
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Calls `service` once under `policy`, retrying transient failures.
///
/// Each attempt is bounded by the policy timeout. A response that is empty
/// or only whitespace counts as a failure.
pub async fn call_service<S>(
    service: &S,
    prompt: &str,
    temperature: Option<f32>,
    policy: &CallPolicy,
) -> Result<String, ServiceError>
where
    S: TextService + ?Sized,
{
    let mut attempt = 0;
    loop {
        let outcome = match timeout(policy.timeout, service.generate(prompt, temperature)).await {
            Ok(Ok(text)) if text.trim().is_empty() => Err(ServiceError::EmptyResponse),
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(policy.timeout)),
        };

        match outcome {
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "Service call failed (attempt {}), retrying in {:?}: {}",
                    attempt + 1,
                    delay,
                    e
                );
                sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Inputs for one grader invocation. Never changes after construction.
#[derive(Debug, Clone)]
pub struct GradingRequest {
    /// Which grader this request is for.
    label:       GraderLabel,
    /// Template set the prompt is built from.
    prompts:     Arc<Prompts>,
    /// Optional directive prefixed to the prompt.
    calibration: Option<Arc<str>>,
    /// Sampling temperature.
    temperature: f32,
    /// Rubric text, shared read-only with the sibling request.
    rubric:      Arc<str>,
    /// Paper text, shared read-only with the sibling request.
    paper:       Arc<str>,
}

impl GradingRequest {
    /// Creates a request.
    pub fn new(
        label: GraderLabel,
        prompts: Arc<Prompts>,
        calibration: Option<Arc<str>>,
        temperature: f32,
        rubric: Arc<str>,
        paper: Arc<str>,
    ) -> Self {
        Self {
            label,
            prompts,
            calibration,
            temperature,
            rubric,
            paper,
        }
    }

    /// Returns the grader label.
    pub fn label(&self) -> GraderLabel {
        self.label
    }

    /// Returns the sampling temperature.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Builds the grader prompt for this request.
    pub fn prompt(&self) -> String {
        build_prompt(
            &self.prompts,
            PromptRole::Grader,
            &self.rubric,
            &self.paper,
            self.calibration.as_deref(),
        )
    }
}

/// Runs one grader request against the service.
pub struct GradingAgent<S: ?Sized> {
    /// Service every grader call goes to.
    service: Arc<S>,
    /// Timeout and retry rules.
    policy:  CallPolicy,
}

impl<S: ?Sized> Clone for GradingAgent<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            policy:  self.policy,
        }
    }
}

impl<S: TextService + ?Sized> GradingAgent<S> {
    /// Creates an agent.
    pub fn new(service: Arc<S>, policy: CallPolicy) -> Self {
        Self { service, policy }
    }

    /// Returns the service's raw evaluation text, unmodified.
    pub async fn grade(&self, request: &GradingRequest) -> Result<String, ServiceError> {
        tracing::info!(
            "{} grading at temperature {}",
            request.label(),
            request.temperature()
        );
        let prompt = request.prompt();
        let text =
            call_service(&*self.service, &prompt, Some(request.temperature()), &self.policy)
                .await?;
        tracing::info!("{} finished ({} chars)", request.label(), text.len());
        Ok(text)
    }
}

/// Aborts the wrapped task if it is dropped before completion.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Turns a join outcome into a service result.
fn flatten_join(
    joined: Result<Result<String, ServiceError>, JoinError>,
) -> Result<String, ServiceError> {
    joined.unwrap_or_else(|e| Err(ServiceError::Aborted(e.to_string())))
}

/// Runs both graders concurrently and waits for both.
pub struct DualGraderCoordinator<S: ?Sized> {
    /// Agent shared by both graders.
    agent:         GradingAgent<S>,
    /// Template set for grader prompts.
    prompts:       Arc<Prompts>,
    /// Optional directive prefixed to each prompt.
    calibration:   Option<Arc<str>>,
    /// Grader A's temperature.
    temperature_a: f32,
    /// Grader B's temperature.
    temperature_b: f32,
}

impl<S: TextService + ?Sized> DualGraderCoordinator<S> {
    /// Creates a coordinator.
    pub fn new(
        agent: GradingAgent<S>,
        prompts: Arc<Prompts>,
        calibration: Option<Arc<str>>,
        temperature_a: f32,
        temperature_b: f32,
    ) -> Self {
        Self {
            agent,
            prompts,
            calibration,
            temperature_a,
            temperature_b,
        }
    }

    /// Builds the request for one grader.
    fn request(&self, label: GraderLabel, rubric: &Arc<str>, paper: &Arc<str>) -> GradingRequest {
        let temperature = match label {
            GraderLabel::A => self.temperature_a,
            GraderLabel::B => self.temperature_b,
        };
        GradingRequest::new(
            label,
            Arc::clone(&self.prompts),
            self.calibration.clone(),
            temperature,
            Arc::clone(rubric),
            Arc::clone(paper),
        )
    }

    /// Spawns one grader task.
    fn spawn(&self, request: GradingRequest) -> AbortOnDrop<Result<String, ServiceError>> {
        let agent = self.agent.clone();
        AbortOnDrop(tokio::spawn(async move { agent.grade(&request).await }))
    }

    /// Grades the paper twice in parallel and returns `(A, B)`.
    ///
    /// Both tasks are always awaited before either result is inspected. If
    /// either grader fails the whole call fails; when both fail, grader A's
    /// error is returned.
    pub async fn coordinate(
        &self,
        rubric: Arc<str>,
        paper: Arc<str>,
    ) -> Result<(String, String), EvalError> {
        let mut task_a = self.spawn(self.request(GraderLabel::A, &rubric, &paper));
        let mut task_b = self.spawn(self.request(GraderLabel::B, &rubric, &paper));

        let (joined_a, joined_b) = tokio::join!(&mut task_a.0, &mut task_b.0);

        match (flatten_join(joined_a), flatten_join(joined_b)) {
            (Ok(a), Ok(b)) => Ok((a, b)),
            (Err(source), other) => {
                if let Err(e) = other {
                    tracing::warn!("{} also failed: {}", GraderLabel::B, e);
                }
                Err(EvalError::Grader {
                    grader: GraderLabel::A,
                    source,
                })
            }
            (Ok(_), Err(source)) => Err(EvalError::Grader {
                grader: GraderLabel::B,
                source,
            }),
        }
    }
}

/// Reconciles two grader evaluations into one final report.
pub struct ModeratorAgent<S: ?Sized> {
    /// Service the moderator call goes to.
    service:     Arc<S>,
    /// Template set for the moderator prompt.
    prompts:     Arc<Prompts>,
    /// Optional directive prefixed to the prompt.
    calibration: Option<Arc<str>>,
    /// Moderator temperature; service default when `None`.
    temperature: Option<f32>,
    /// Timeout and retry rules.
    policy:      CallPolicy,
}

impl<S: TextService + ?Sized> ModeratorAgent<S> {
    /// Creates a moderator.
    pub fn new(
        service: Arc<S>,
        prompts: Arc<Prompts>,
        calibration: Option<Arc<str>>,
        temperature: Option<f32>,
        policy: CallPolicy,
    ) -> Self {
        Self {
            service,
            prompts,
            calibration,
            temperature,
            policy,
        }
    }

    /// Produces the final evaluation from both completed grader outputs.
    pub async fn moderate(
        &self,
        grader_a: &str,
        grader_b: &str,
        rubric: &str,
        paper: &str,
    ) -> Result<String, ServiceError> {
        tracing::info!("Moderating evaluations");
        let prompt = build_prompt(
            &self.prompts,
            PromptRole::Moderator { grader_a, grader_b },
            rubric,
            paper,
            self.calibration.as_deref(),
        );
        call_service(&*self.service, &prompt, self.temperature, &self.policy).await
    }
}
