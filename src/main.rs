#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # evaluate
//!
//! Grades a student paper (or a directory of papers) against a rubric.
//!
//! ```text
//! evaluate <rubric_file> <paper_pdf>
//! evaluate --batch <rubric_file> <input_dir> <output_dir>
//! ```
//!
//! `GEMINI_API_KEY` must be set, either in the environment or in a `.env`
//! file.

use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use bpaf::*;
use dotenvy::dotenv;
use paper_grader::{
    EvalError, Evaluation, Evaluator, EvaluatorConfig, FsTextSource, OpenAiService, Prompts,
};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Parsed command line.
#[derive(Debug, Clone)]
struct Opts {
    /// Evaluate a directory of papers.
    batch:       bool,
    /// Print the evaluation as JSON.
    json:        bool,
    /// Calibration directive override.
    calibration: Option<String>,
    /// Model override.
    model:       Option<String>,
    /// Papers evaluated at once in batch mode.
    concurrency: Option<usize>,
    /// Rubric file (.pdf or .json).
    rubric:      PathBuf,
    /// Paper PDF, or input directory in batch mode.
    target:      PathBuf,
    /// Output directory (batch mode only).
    output:      Option<PathBuf>,
}

/// Command-line parser.
fn parser() -> OptionParser<Opts> {
    let batch = long("batch")
        .help("Evaluate every PDF in a directory and write one report per paper")
        .switch();
    let json = long("json")
        .help("Print the evaluation as JSON instead of labelled sections")
        .switch();
    let calibration = long("calibration")
        .help("Directive placed before every prompt to steer scoring")
        .argument::<String>("TEXT")
        .optional();
    let model = long("model")
        .help("Model identifier to use for all calls")
        .argument::<String>("NAME")
        .optional();
    let concurrency = long("concurrency")
        .help("Number of papers evaluated at once in batch mode")
        .argument::<usize>("N")
        .optional();
    let rubric = positional::<PathBuf>("RUBRIC").help("Rubric file (.pdf or .json)");
    let target = positional::<PathBuf>("PAPER|INPUT_DIR")
        .help("Student paper PDF, or directory of PDFs with --batch");
    let output = positional::<PathBuf>("OUTPUT_DIR")
        .help("Directory for reports (required with --batch)")
        .optional();

    construct!(Opts {
        batch,
        json,
        calibration,
        model,
        concurrency,
        rubric,
        target,
        output,
    })
    .to_options()
    .descr("Evaluate a student paper against a rubric")
}

/// What to run once the arguments check out.
#[derive(Debug, PartialEq, Eq)]
enum Mode {
    /// Evaluate one paper and print the result.
    Single,
    /// Evaluate a directory of papers into `output_dir`.
    Batch {
        /// Where reports go.
        output_dir: PathBuf,
    },
}

/// Checks argument combinations. Runs before configuration is read.
fn mode(opts: &Opts) -> Result<Mode> {
    match (opts.batch, &opts.output) {
        (true, None) => Err(EvalError::value("--batch requires an output directory").into()),
        (true, Some(output_dir)) => {
            if !opts.target.is_dir() {
                bail!("Input directory '{}' does not exist.", opts.target.display());
            }
            Ok(Mode::Batch {
                output_dir: output_dir.clone(),
            })
        }
        (false, output) => {
            if output.is_some() {
                tracing::warn!("OUTPUT_DIR is only used with --batch; ignoring it");
            }
            Ok(Mode::Single)
        }
    }
}

/// Reads configuration through `lookup` and applies command-line overrides.
fn load_config<F>(opts: &Opts, lookup: F) -> Result<EvaluatorConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = EvaluatorConfig::from_lookup(lookup)?;
    if let Some(model) = &opts.model {
        config.set_model(model.clone());
    }
    if opts.calibration.is_some() {
        config.set_calibration(opts.calibration.clone());
    }
    if let Some(n) = opts.concurrency {
        config.set_batch_concurrency(n);
    }
    Ok(config)
}

/// Writes one labelled section.
fn write_section(out: &mut impl Write, label: &str, body: &str) -> io::Result<()> {
    writeln!(out, "\n--- {label} ---")?;
    writeln!(out, "{body}")?;
    writeln!(out, "--- End of {label} ---")
}

/// Writes a single evaluation, as labelled sections or as JSON.
fn write_evaluation(out: &mut impl Write, evaluation: &Evaluation, json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(evaluation)?)?;
    } else {
        write_section(out, "Agent 1 Evaluation", &evaluation.grader_a)?;
        write_section(out, "Agent 2 Evaluation", &evaluation.grader_b)?;
        write_section(out, "Final Evaluation", &evaluation.final_evaluation)?;
        writeln!(out)?;
    }
    Ok(())
}

/// Runs the requested evaluation.
async fn run(opts: Opts) -> Result<()> {
    let mode = mode(&opts)?;
    let config = load_config(&opts, |key| std::env::var(key).ok())?;

    let prompts = Prompts::from_config(&config)?;
    let service = Arc::new(OpenAiService::new(&config));
    tracing::info!("Using model {}", service.model());
    let evaluator = Evaluator::new(service, Arc::new(FsTextSource), prompts, &config);

    match mode {
        Mode::Batch { output_dir } => {
            let rubric = evaluator.load_rubric(&opts.rubric).await?;
            let summary = evaluator
                .evaluate_batch(&rubric, &opts.target, &output_dir)
                .await
                .context("Batch evaluation failed")?;
            eprintln!(
                "Processed {} papers: {} succeeded, {} failed.",
                summary.total(),
                summary.succeeded.len(),
                summary.failed.len()
            );
        }
        Mode::Single => {
            let evaluation = evaluator.evaluate_files(&opts.rubric, &opts.target).await?;
            write_evaluation(&mut io::stdout().lock(), &evaluation, opts.json)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    let fmt = fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let opts = parser().run();

    match run(opts).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("An error occurred: {e:#}");
            ExitCode::from(1)
        }
    }
}
