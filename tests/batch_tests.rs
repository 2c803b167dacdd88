//! Batch mode: one rubric, a directory of papers, per-paper isolation.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use mock_support::{MockSource, Reply, Role, ScriptedService, temp_root, test_config};
use paper_grader::{ErrorKind, Evaluator, EvaluatorConfig, Prompts};


/// Creates `input/` holding empty files with the given names and an
/// `output/` path that does not exist yet.
fn layout(tag: &str, names: &[&str]) -> (PathBuf, PathBuf, PathBuf) {
    let root = temp_root(tag);
    let input = root.join("input");
    fs::create_dir_all(&input).unwrap();
    for name in names {
        fs::write(input.join(name), b"%PDF-stub").unwrap();
    }
    (root.clone(), input, root.join("output"))
}

fn report_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn one_bad_pdf_does_not_stop_the_batch() {
    let (root, input, output) = layout("batch-iso", &["a.pdf", "b.pdf", "c.pdf"]);
    let source = MockSource::new()
        .with_text("a.pdf", "Paper A")
        .with_failure("b.pdf", "corrupt xref table")
        .with_text("c.pdf", "Paper C");
    let service = Arc::new(ScriptedService::fixed("a", "b", "Final verdict"));
    let evaluator = Evaluator::new(
        Arc::clone(&service),
        Arc::new(source),
        Prompts::load(),
        &test_config(),
    );

    let summary = evaluator
        .evaluate_batch("rubric", &input, &output)
        .await
        .expect("batch itself succeeds");

    assert_eq!(summary.total(), 3);
    assert_eq!(summary.succeeded.len(), 2);
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].paper.ends_with("b.pdf"));
    assert_eq!(summary.failed[0].kind, ErrorKind::Io);
    assert!(summary.failed[0].error.contains("corrupt xref table"));

    assert_eq!(report_names(&output), vec!["a.md", "c.md"]);
    let report = fs::read_to_string(output.join("a.md")).unwrap();
    assert!(report.contains("Final verdict"));
    assert!(report.contains("a.pdf"));

    // Two papers graded twice and moderated once each.
    assert_eq!(service.calls().len(), 6);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn service_failure_on_one_paper_is_isolated() {
    let (root, input, output) = layout("batch-svc", &["good.pdf", "bad.pdf"]);
    let source = MockSource::new()
        .with_text("good.pdf", "fine essay")
        .with_text("bad.pdf", "TRIGGER essay");
    let service = Arc::new(ScriptedService::new(|role, prompt| match role {
        Role::B if prompt.contains("TRIGGER") => Reply::fail("rate limited"),
        Role::Moderator => Reply::ok("final"),
        _ => Reply::ok("verdict"),
    }));
    let evaluator = Evaluator::new(service, Arc::new(source), Prompts::load(), &test_config());

    let summary = evaluator
        .evaluate_batch("rubric", &input, &output)
        .await
        .unwrap();

    assert_eq!(summary.succeeded.len(), 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].kind, ErrorKind::Service);
    assert_eq!(report_names(&output), vec!["good.md"]);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn non_pdf_files_are_skipped() {
    let (root, input, output) = layout("batch-skip", &["essay.pdf", "notes.txt"]);
    let source = MockSource::new().with_text("essay.pdf", "text");
    let service = Arc::new(ScriptedService::fixed("a", "b", "final"));
    let evaluator = Evaluator::new(service, Arc::new(source), Prompts::load(), &test_config());

    let summary = evaluator
        .evaluate_batch("rubric", &input, &output)
        .await
        .unwrap();

    assert_eq!(summary.total(), 1);
    assert_eq!(report_names(&output), vec!["essay.md"]);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn parallel_batch_matches_sequential_outcome() {
    let names = ["p1.pdf", "p2.pdf", "p3.pdf", "p4.pdf"];
    let (root, input, output) = layout("batch-par", &names);
    let mut source = MockSource::new().with_failure("p3.pdf", "unreadable");
    for name in ["p1.pdf", "p2.pdf", "p4.pdf"] {
        source = source.with_text(name, name);
    }
    let service = Arc::new(ScriptedService::fixed("a", "b", "final"));
    let config = EvaluatorConfig::builder()
        .api_key("k")
        .batch_concurrency(3)
        .build();
    let evaluator = Evaluator::new(service, Arc::new(source), Prompts::load(), &config);

    let summary = evaluator
        .evaluate_batch("rubric", &input, &output)
        .await
        .unwrap();

    let succeeded: Vec<String> = summary
        .succeeded
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(succeeded, vec!["p1.md", "p2.md", "p4.md"]);
    assert_eq!(summary.failed.len(), 1);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn missing_input_dir_fails_the_batch() {
    let root = temp_root("batch-missing");
    let service = Arc::new(ScriptedService::fixed("a", "b", "final"));
    let evaluator = Evaluator::new(
        Arc::clone(&service),
        Arc::new(MockSource::new()),
        Prompts::load(),
        &test_config(),
    );

    let err = evaluator
        .evaluate_batch("rubric", &root.join("nope"), &root.join("out"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(service.calls().is_empty());
    assert!(!root.join("out").exists());

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn empty_input_dir_still_creates_output() {
    let (root, input, output) = layout("batch-empty", &[]);
    let evaluator = Evaluator::new(
        Arc::new(ScriptedService::fixed("a", "b", "final")),
        Arc::new(MockSource::new()),
        Prompts::load(),
        &test_config(),
    );

    let summary = evaluator
        .evaluate_batch("rubric", &input, &output)
        .await
        .unwrap();

    assert_eq!(summary.total(), 0);
    assert!(output.is_dir());

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn extension_case_collision_keeps_the_first_report() {
    let (root, input, output) = layout("batch-case", &["essay.PDF", "essay.pdf"]);
    if fs::read_dir(&input).unwrap().count() < 2 {
        // Case-insensitive filesystem: both names are one file.
        let _ = fs::remove_dir_all(root);
        return;
    }
    let source = MockSource::new()
        .with_text("essay.PDF", "upper")
        .with_text("essay.pdf", "lower");
    let service = Arc::new(ScriptedService::fixed("a", "b", "final"));
    let evaluator = Evaluator::new(
        Arc::clone(&service),
        Arc::new(source),
        Prompts::load(),
        &test_config(),
    );

    let summary = evaluator
        .evaluate_batch("rubric", &input, &output)
        .await
        .unwrap();

    assert_eq!(summary.total(), 2);
    assert_eq!(summary.succeeded, vec![output.join("essay.md")]);
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].paper.ends_with("essay.pdf"));
    assert_eq!(summary.failed[0].kind, ErrorKind::Value);
    assert!(summary.failed[0].error.contains("essay.md"));

    assert_eq!(report_names(&output), vec!["essay.md"]);
    let report = fs::read_to_string(output.join("essay.md")).unwrap();
    assert!(report.contains("essay.PDF"));
    // Only the first paper reached the service.
    assert_eq!(service.calls().len(), 3);

    let _ = fs::remove_dir_all(root);
}
