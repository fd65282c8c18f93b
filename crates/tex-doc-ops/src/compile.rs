//! Multi-pass compilation pipeline.
//!
//! One pass is a single invocation of the external engine from the
//! document's containing directory. The pipeline reruns the engine (up to a
//! cap) while the previous pass's log carries a rerun marker, parses every
//! pass's output for diagnostics, and assembles a structured outcome. The
//! subprocess mechanics live behind the [`PassRunner`] seam so the rerun
//! heuristic and the result assembly can be exercised against captured log
//! fixtures without a TeX installation.

use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::clean;
use crate::diagnostics::{self, Diagnostic};
use crate::workspace::Workspace;
use crate::OperationError;

/// Markers an engine emits when another pass would change the output.
const RERUN_MARKERS: [&str; 6] = [
    "Rerun to get cross-references right",
    "Rerun to get citations correct",
    "Rerun to get outlines right",
    "There were undefined references",
    "Table widths have changed. Rerun LaTeX",
    "Please rerun LaTeX",
];

/// Poll interval while waiting on a running pass.
const WAIT_POLL: Duration = Duration::from_millis(25);

/// Supported TeX engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Pdflatex,
    Xelatex,
    Lualatex,
}

impl Engine {
    /// Binary name looked up on `$PATH` when no explicit path is configured.
    pub fn command(&self) -> &'static str {
        match self {
            Engine::Pdflatex => "pdflatex",
            Engine::Xelatex => "xelatex",
            Engine::Lualatex => "lualatex",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

impl FromStr for Engine {
    type Err = OperationError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "pdflatex" => Ok(Engine::Pdflatex),
            "xelatex" => Ok(Engine::Xelatex),
            "lualatex" => Ok(Engine::Lualatex),
            other => Err(OperationError::UnknownEngine {
                name: other.to_string(),
            }),
        }
    }
}

/// Parameters for one compilation call.
#[derive(Clone, Debug)]
pub struct CompileRequest {
    pub path: PathBuf,
    pub engine: Engine,
    pub max_passes: u32,
    pub timeout: Duration,
}

/// Raw result of a single engine invocation.
#[derive(Clone, Debug)]
pub struct PassOutput {
    pub exit_ok: bool,
    pub timed_out: bool,
    pub log: String,
}

/// Seam between the pipeline and the external process.
pub trait PassRunner {
    fn run_pass(&self, document: &Path) -> Result<PassOutput, OperationError>;
}

/// Report for one completed (or terminated) pass.
#[derive(Clone, Debug, Serialize)]
pub struct PassReport {
    /// 1-based pass number.
    pub number: u32,
    pub exit_ok: bool,
    pub timed_out: bool,
    /// Combined stdout/stderr (falling back to the on-disk `.log`).
    pub log: String,
}

/// Terminal state of a compilation call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompileStatus {
    Succeeded,
    Failed,
    TimedOut,
}

/// Structured result of a compilation call. Engine-reported failures are
/// carried here as data; `compile` returns `Err` only for genuinely
/// exceptional conditions (escape, missing target, missing engine).
#[derive(Clone, Debug, Serialize)]
pub struct CompileOutcome {
    pub status: CompileStatus,
    /// True only when the final pass exited cleanly and no error-severity
    /// diagnostic was extracted from any pass. Warnings never matter here.
    pub success: bool,
    pub passes: Vec<PassReport>,
    pub diagnostics: Vec<Diagnostic>,
    /// Auxiliary files present after the final pass.
    pub artifacts: Vec<PathBuf>,
    /// Produced document output (PDF), when the engine wrote one.
    pub output: Option<PathBuf>,
}

/// Drive up to `request.max_passes` engine invocations over the target.
pub fn compile(
    workspace: &Workspace,
    runner: &dyn PassRunner,
    request: &CompileRequest,
) -> Result<CompileOutcome, OperationError> {
    let resolved = workspace.resolve_existing(&request.path)?;
    if resolved.extension().and_then(|e| e.to_str()) != Some("tex") {
        return Err(OperationError::InvalidTarget {
            reason: format!("not a .tex file: {}", request.path.display()),
        });
    }

    let max_passes = request.max_passes.max(1);
    let mut passes = Vec::new();
    let mut all_diagnostics = Vec::new();
    let mut timed_out = false;

    for number in 1..=max_passes {
        tracing::info!(document = %request.path.display(), engine = %request.engine, pass = number, "running pass");
        let output = runner.run_pass(&resolved)?;
        let mut pass_diagnostics = diagnostics::parse(&output.log);

        if output.timed_out {
            pass_diagnostics.push(Diagnostic::error(format!(
                "pass {number} terminated after exceeding its {}s budget",
                request.timeout.as_secs()
            )));
        }

        let rerun = !output.timed_out && output.exit_ok && needs_rerun(&output.log);
        timed_out = output.timed_out;
        let exit_ok = output.exit_ok;

        passes.push(PassReport {
            number,
            exit_ok: output.exit_ok,
            timed_out: output.timed_out,
            log: output.log,
        });
        all_diagnostics.extend(pass_diagnostics);

        if timed_out || !exit_ok {
            break;
        }
        if !(rerun && number < max_passes) {
            break;
        }
    }

    let final_exit_ok = passes.last().map(|p| p.exit_ok).unwrap_or(false);
    let success =
        !timed_out && final_exit_ok && diagnostics::error_count(&all_diagnostics) == 0;
    let status = if timed_out {
        CompileStatus::TimedOut
    } else if success {
        CompileStatus::Succeeded
    } else {
        CompileStatus::Failed
    };

    let artifacts = clean::artifacts_for(&resolved)?;
    let pdf = resolved.with_extension("pdf");
    let output = pdf.is_file().then_some(pdf);

    tracing::info!(?status, passes = passes.len(), "compilation finished");
    Ok(CompileOutcome {
        status,
        success,
        passes,
        diagnostics: all_diagnostics,
        artifacts,
        output,
    })
}

/// Single dry-run pass; auxiliary files produced along the way are removed
/// and the outcome reports none retained.
pub fn validate(
    workspace: &Workspace,
    runner: &dyn PassRunner,
    request: &CompileRequest,
) -> Result<CompileOutcome, OperationError> {
    let single = CompileRequest {
        max_passes: 1,
        ..request.clone()
    };
    let mut outcome = compile(workspace, runner, &single)?;

    for artifact in &outcome.artifacts {
        // Already-gone files are fine here.
        let _ = fs::remove_file(artifact);
    }
    outcome.artifacts.clear();
    Ok(outcome)
}

/// Whether the log asks for another pass.
fn needs_rerun(log: &str) -> bool {
    RERUN_MARKERS.iter().any(|marker| log.contains(marker))
}

/// [`PassRunner`] backed by a real engine subprocess. Each pass runs from
/// the document's containing directory so relative `\input` and
/// bibliography lookups resolve.
pub struct EngineRunner {
    program: PathBuf,
    engine: Engine,
    timeout: Duration,
}

impl EngineRunner {
    pub fn new(engine: Engine, program: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.unwrap_or_else(|| PathBuf::from(engine.command())),
            engine,
            timeout,
        }
    }
}

impl PassRunner for EngineRunner {
    fn run_pass(&self, document: &Path) -> Result<PassOutput, OperationError> {
        let directory = document.parent().ok_or_else(|| OperationError::InvalidTarget {
            reason: format!("no containing directory: {}", document.display()),
        })?;
        let file_name = document.file_name().ok_or_else(|| OperationError::InvalidTarget {
            reason: format!("no file name: {}", document.display()),
        })?;

        let mut child = Command::new(&self.program)
            .arg("-interaction=nonstopmode")
            .arg("-file-line-error")
            .arg(file_name)
            .current_dir(directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                if err.kind() == io::ErrorKind::NotFound {
                    OperationError::EngineUnavailable {
                        engine: self.engine.command().to_string(),
                    }
                } else {
                    OperationError::Io(err)
                }
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let (status, timed_out) = wait_with_timeout(&mut child, self.timeout)?;

        let mut log = stdout.join().unwrap_or_default();
        let err_text = stderr.join().unwrap_or_default();
        if !err_text.is_empty() {
            if !log.is_empty() {
                log.push('\n');
            }
            log.push_str(&err_text);
        }

        // Some engines write rich detail only to the on-disk log.
        if log.trim().is_empty() {
            let log_file = document.with_extension("log");
            if let Ok(contents) = fs::read_to_string(log_file) {
                log = contents;
            }
        }

        Ok(PassOutput {
            exit_ok: status.map(|s| s.success()).unwrap_or(false),
            timed_out,
            log,
        })
    }
}

/// Collect a child stream on a helper thread so the child never blocks on a
/// full pipe while we poll for exit.
fn drain<R: Read + Send + 'static>(stream: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut stream) = stream {
            let mut bytes = Vec::new();
            if stream.read_to_end(&mut bytes).is_ok() {
                text = String::from_utf8_lossy(&bytes).into_owned();
            }
        }
        text
    })
}

/// Poll the child until it exits or the deadline passes; on timeout the
/// child is killed and reaped. Returns the exit status when the child
/// finished on its own.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Result<(Option<std::process::ExitStatus>, bool), OperationError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((Some(status), false));
        }
        if Instant::now() >= deadline {
            child.kill()?;
            child.wait()?;
            return Ok((None, true));
        }
        thread::sleep(WAIT_POLL);
    }
}
