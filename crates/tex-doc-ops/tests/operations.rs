use std::fs;
use std::path::Path;
use std::time::Duration;

use tex_doc_config::{Config, LoadOptions};
use tex_doc_ops::{
    CompileStatus, Engine, OperationError, Operations, PassOutput, PassRunner, Severity, Template,
    TemplateParams, WriteOptions,
};
use tempfile::TempDir;

fn load_ops(temp: &TempDir) -> Operations {
    let config =
        Config::load(LoadOptions::default().with_working_dir(temp.path())).expect("load config");
    Operations::new(config).expect("operations")
}

struct FixedRunner {
    output: PassOutput,
}

impl PassRunner for FixedRunner {
    fn run_pass(&self, _document: &Path) -> Result<PassOutput, OperationError> {
        Ok(self.output.clone())
    }
}

#[test]
fn create_from_template_then_read_back() {
    let temp = TempDir::new().expect("tempdir");
    let ops = load_ops(&temp);

    let params = TemplateParams {
        title: Some("Quarterly Report".to_string()),
        author: Some("R. Lew".to_string()),
        ..TemplateParams::default()
    };
    ops.create_document(Path::new("report/main.tex"), Some(Template::Report), &params, false)
        .expect("create");

    let content = ops.read_document(Path::new("report/main.tex")).expect("read");
    assert!(content.contains("\\documentclass[11pt,a4paper]{report}"));
    assert!(content.contains("\\title{Quarterly Report}"));
    assert!(content.contains("\\author{R. Lew}"));
}

#[test]
fn create_without_overwrite_preserves_existing_content() {
    let temp = TempDir::new().expect("tempdir");
    let ops = load_ops(&temp);

    ops.write_document(Path::new("main.tex"), "original", WriteOptions::default())
        .expect("write");
    let err = ops
        .create_document(
            Path::new("main.tex"),
            Some(Template::Article),
            &TemplateParams::default(),
            false,
        )
        .expect_err("must not clobber");
    assert!(matches!(err, OperationError::AlreadyExists { .. }));
    assert_eq!(ops.read_document(Path::new("main.tex")).unwrap(), "original");
}

#[test]
fn compile_and_clean_round_trip() {
    let temp = TempDir::new().expect("tempdir");
    let ops = load_ops(&temp);

    ops.write_document(
        Path::new("main.tex"),
        "\\documentclass{article}\\begin{document}x\\end{document}",
        WriteOptions::default(),
    )
    .expect("write");
    // Artifacts a real pass would have left behind.
    fs::write(temp.path().join("main.aux"), "").unwrap();
    fs::write(temp.path().join("main.log"), "").unwrap();

    let runner = FixedRunner {
        output: PassOutput {
            exit_ok: true,
            timed_out: false,
            log: "Output written on main.pdf.".to_string(),
        },
    };
    let request = ops
        .request_for("main.tex", Some(Engine::Pdflatex), None, None)
        .expect("request");
    let outcome = ops.compile_with(&runner, &request).expect("compile");

    assert_eq!(outcome.status, CompileStatus::Succeeded);
    assert_eq!(outcome.artifacts.len(), 2);

    let removed = ops.clean(Path::new("main.tex")).expect("clean");
    assert_eq!(removed.len(), 2);
    let removed_again = ops.clean(Path::new("main.tex")).expect("clean again");
    assert!(removed_again.is_empty());
}

#[test]
fn compile_failure_reports_error_diagnostics_as_data() {
    let temp = TempDir::new().expect("tempdir");
    let ops = load_ops(&temp);
    ops.write_document(Path::new("main.tex"), "x", WriteOptions::default())
        .expect("write");

    let runner = FixedRunner {
        output: PassOutput {
            exit_ok: false,
            timed_out: false,
            log: "(./main.tex\n! Undefined control sequence.\nl.1 \\nope\n".to_string(),
        },
    };
    let request = ops
        .request_for("main.tex", Some(Engine::Pdflatex), None, None)
        .expect("request");

    let outcome = ops.compile_with(&runner, &request).expect("call completes");
    assert!(!outcome.success);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].severity, Severity::Error);
    assert_eq!(outcome.diagnostics[0].file.as_deref(), Some("main.tex"));
}

#[test]
fn request_defaults_come_from_config() {
    let temp = TempDir::new().expect("tempdir");
    fs::write(
        temp.path().join(".tex-doc.toml"),
        "[compile]\nengine = \"lualatex\"\nmax-passes = 4\ntimeout-secs = 30\n",
    )
    .expect("write config");
    let ops = load_ops(&temp);

    let request = ops.request_for("main.tex", None, None, None).expect("request");
    assert_eq!(request.engine, Engine::Lualatex);
    assert_eq!(request.max_passes, 4);
    assert_eq!(request.timeout, Duration::from_secs(30));
}

#[test]
fn set_workspace_root_is_atomic() {
    let temp = TempDir::new().expect("tempdir");
    let mut ops = load_ops(&temp);
    let before = ops.workspace_root().to_path_buf();

    let err = ops
        .set_workspace_root(&temp.path().join("missing"))
        .expect_err("missing target");
    assert!(matches!(err, OperationError::NotFound { .. }));
    assert_eq!(ops.workspace_root(), before);

    let next = temp.path().join("next");
    fs::create_dir_all(&next).unwrap();
    ops.set_workspace_root(&next).expect("swap");
    assert_eq!(ops.workspace_root(), fs::canonicalize(&next).unwrap());
}

#[test]
fn operations_refuse_escaping_paths() {
    let temp = TempDir::new().expect("tempdir");
    let ops = load_ops(&temp);

    for result in [
        ops.read_document(Path::new("../../etc/passwd")).err(),
        ops.delete_document(Path::new("../../etc/passwd"), true).err(),
        ops.clean(Path::new("../../etc/passwd")).err(),
        ops.list_directory(Path::new(".."), false).err(),
    ] {
        assert!(matches!(result, Some(OperationError::PathEscape { .. })));
    }
}

#[test]
fn structural_check_flags_incomplete_documents() {
    let temp = TempDir::new().expect("tempdir");
    let ops = load_ops(&temp);
    ops.write_document(
        Path::new("draft.tex"),
        "\\documentclass{article}\n\\begin{document}\nSee \\ref{fig:missing}\n",
        WriteOptions::default(),
    )
    .expect("write");

    let report = ops.check(Path::new("draft.tex")).expect("check");
    assert!(!report.structure_complete);
    assert!(!report.is_valid());
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.message.contains("\\end{document}")));
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Warning && d.message.contains("fig:missing")));
}

#[test]
fn move_document_creates_destination_directories() {
    let temp = TempDir::new().expect("tempdir");
    let ops = load_ops(&temp);
    ops.write_document(Path::new("main.tex"), "x", WriteOptions::default())
        .expect("write");

    let to = ops
        .move_document(Path::new("main.tex"), Path::new("archive/2026/main.tex"), false)
        .expect("move");
    assert!(to.ends_with("archive/2026/main.tex"));
    assert_eq!(
        ops.read_document(Path::new("archive/2026/main.tex")).unwrap(),
        "x"
    );
}
