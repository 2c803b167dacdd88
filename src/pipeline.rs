#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Single-paper and batch evaluation.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::{StreamExt, stream};
use serde::Serialize;

use crate::{
    agent::{CallPolicy, DualGraderCoordinator, GradingAgent, ModeratorAgent},
    config::EvaluatorConfig,
    error::{ErrorKind, EvalError},
    prompt::Prompts,
    report::{render_report, report_path, write_report},
    service::TextService,
    source::{TextSource, load_rubric},
    util::find_files,
};

/// Outcome of one successful evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    /// Grader A's raw evaluation.
    pub grader_a:         String,
    /// Grader B's raw evaluation.
    pub grader_b:         String,
    /// The moderator's consolidated evaluation.
    pub final_evaluation: String,
}

/// A paper the batch could not evaluate.
#[derive(Debug)]
pub struct BatchFailure {
    /// The paper that failed.
    pub paper: PathBuf,
    /// Failure class.
    pub kind:  ErrorKind,
    /// Failure message.
    pub error: String,
}

/// Per-paper results of a batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Report files written, one per successful paper.
    pub succeeded: Vec<PathBuf>,
    /// Papers that failed.
    pub failed:    Vec<BatchFailure>,
}

impl BatchSummary {
    /// Number of papers attempted.
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Runs the two-graders-plus-moderator workflow.
pub struct Evaluator<S: ?Sized, T: ?Sized> {
    /// Runs the two graders.
    coordinator:       DualGraderCoordinator<S>,
    /// Reconciles their evaluations.
    moderator:         ModeratorAgent<S>,
    /// Reads rubric and paper files.
    source:            Arc<T>,
    /// Papers evaluated at once in batch mode.
    batch_concurrency: usize,
}

impl<S, T> Evaluator<S, T>
where
    S: TextService + ?Sized,
    T: TextSource + ?Sized,
{
    /// Wires the graders and moderator to `service` using `config`.
    pub fn new(service: Arc<S>, source: Arc<T>, prompts: Prompts, config: &EvaluatorConfig) -> Self {
        let policy = CallPolicy::from_config(config);
        let prompts = Arc::new(prompts);
        let calibration: Option<Arc<str>> = config.calibration().map(Arc::from);

        let coordinator = DualGraderCoordinator::new(
            GradingAgent::new(Arc::clone(&service), policy),
            Arc::clone(&prompts),
            calibration.clone(),
            config.grader_a_temperature(),
            config.grader_b_temperature(),
        );
        let moderator = ModeratorAgent::new(
            service,
            prompts,
            calibration,
            config.moderator_temperature(),
            policy,
        );

        Self {
            coordinator,
            moderator,
            source,
            batch_concurrency: config.batch_concurrency(),
        }
    }

    /// Evaluates one paper against a rubric.
    ///
    /// Both graders finish before the moderator starts. Any failure aborts
    /// the evaluation and nothing partial is returned.
    pub async fn evaluate(&self, rubric: &str, paper: &str) -> Result<Evaluation, EvalError> {
        self.evaluate_shared(Arc::from(rubric), Arc::from(paper))
            .await
    }

    /// Loads both files and evaluates the paper.
    pub async fn evaluate_files(
        &self,
        rubric_path: &Path,
        paper_path: &Path,
    ) -> Result<Evaluation, EvalError> {
        let rubric = self.load_rubric(rubric_path).await?;
        let paper = self.load_paper(paper_path).await?;
        self.evaluate(&rubric, &paper).await
    }

    /// Reads rubric text, dispatching on the file extension.
    pub async fn load_rubric(&self, path: &Path) -> Result<String, EvalError> {
        let source = Arc::clone(&self.source);
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || load_rubric(&*source, &owned))
            .await
            .map_err(|e| EvalError::io(path, format!("rubric loading task failed: {e}")))?
    }

    /// Reads the text of a paper PDF.
    pub async fn load_paper(&self, path: &Path) -> Result<String, EvalError> {
        let source = Arc::clone(&self.source);
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || source.extract_pdf_text(&owned))
            .await
            .map_err(|e| EvalError::io(path, format!("extraction task failed: {e}")))?
    }

    /// Grades and moderates with texts already shared.
    async fn evaluate_shared(
        &self,
        rubric: Arc<str>,
        paper: Arc<str>,
    ) -> Result<Evaluation, EvalError> {
        let (grader_a, grader_b) = self
            .coordinator
            .coordinate(Arc::clone(&rubric), Arc::clone(&paper))
            .await?;

        let final_evaluation = self
            .moderator
            .moderate(&grader_a, &grader_b, &rubric, &paper)
            .await?;

        Ok(Evaluation {
            grader_a,
            grader_b,
            final_evaluation,
        })
    }

    /// Evaluates one batch paper and writes its report.
    async fn process_paper(
        &self,
        rubric: Arc<str>,
        paper_path: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, EvalError> {
        tracing::info!("Evaluating {}", paper_path.display());
        let paper = self.load_paper(paper_path).await?;
        let evaluation = self.evaluate_shared(rubric, Arc::from(paper)).await?;

        let name = paper_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let out = report_path(output_dir, paper_path);
        write_report(&out, &render_report(&name, &evaluation))?;
        Ok(out)
    }

    /// Evaluates every `.pdf` in `input_dir` against one rubric and writes a
    /// report per paper into `output_dir`, creating it if needed.
    ///
    /// A paper that fails is logged and recorded in the summary; the batch
    /// carries on. Only problems with the directories themselves are
    /// returned as errors.
    ///
    /// Papers whose names differ only in extension case map to the same
    /// report. The first in path order is evaluated; the others are recorded
    /// as failures without being evaluated, so no report is overwritten.
    pub async fn evaluate_batch(
        &self,
        rubric: &str,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Result<BatchSummary, EvalError> {
        if !input_dir.is_dir() {
            return Err(EvalError::NotFound(input_dir.to_path_buf()));
        }
        std::fs::create_dir_all(output_dir).map_err(|e| EvalError::io(output_dir, e))?;

        let papers = find_files("pdf", input_dir)?;
        if papers.is_empty() {
            tracing::warn!("No PDF files found in {}", input_dir.display());
        }

        let mut claimed = HashSet::new();
        let mut collisions = Vec::new();
        let papers: Vec<PathBuf> = papers
            .into_iter()
            .filter(|paper| {
                let target = report_path(output_dir, paper);
                if claimed.insert(target.clone()) {
                    true
                } else {
                    collisions.push((paper.clone(), target));
                    false
                }
            })
            .collect();

        let rubric: Arc<str> = Arc::from(rubric);
        let mut outcomes: Vec<(PathBuf, Result<PathBuf, EvalError>)> = stream::iter(papers)
            .map(|paper| {
                let rubric = Arc::clone(&rubric);
                async move {
                    let outcome = self.process_paper(rubric, &paper, output_dir).await;
                    (paper, outcome)
                }
            })
            .buffer_unordered(self.batch_concurrency)
            .collect()
            .await;
        outcomes.extend(collisions.into_iter().map(|(paper, target)| {
            let err = EvalError::value(format!(
                "Report '{}' is already written by another paper in this batch",
                target.display()
            ));
            (paper, Err(err))
        }));
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));

        let mut summary = BatchSummary::default();
        for (paper, outcome) in outcomes {
            match outcome {
                Ok(report) => {
                    tracing::info!("Wrote {}", report.display());
                    summary.succeeded.push(report);
                }
                Err(e) => {
                    tracing::error!("Failed to evaluate {}: {}", paper.display(), e);
                    summary.failed.push(BatchFailure {
                        paper,
                        kind: e.kind(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Batch finished: {} succeeded, {} failed",
            summary.succeeded.len(),
            summary.failed.len()
        );
        Ok(summary)
    }
}
