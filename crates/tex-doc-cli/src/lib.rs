use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tex_doc_config::{Config, LoadOptions, CONFIG_FILE_NAME};
use tex_doc_core::TexDoc;
use tex_doc_ops::{
    CompileOutcome, Engine, OperationError, Operations, Severity, Template, TemplateParams,
    WriteOptions,
};

/// Entry point for CLI execution. Returns the desired exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let mut load = LoadOptions::default();
    if let Some(path) = cli.config.clone() {
        load = load.with_override_path(path);
    }
    let config = Config::load(load)?;
    let mut engine = TexDoc::bootstrap(config)?;
    tracing::info!(root = %engine.operations().workspace_root().display(), "workspace ready");

    match cli.command {
        Command::New(args) => handle_new(engine.operations(), args),
        Command::Read(args) => handle_read(engine.operations(), args),
        Command::Write(args) => handle_write(engine.operations(), args),
        Command::Ls(args) => handle_ls(engine.operations(), args),
        Command::Mv(args) => handle_mv(engine.operations(), args),
        Command::Rm(args) => handle_rm(engine.operations(), args),
        Command::Compile(args) => handle_compile(engine.operations(), args),
        Command::Validate(args) => handle_validate(engine.operations(), args),
        Command::Check(args) => handle_check(engine.operations(), args),
        Command::Clean(args) => handle_clean(engine.operations(), args),
        Command::Workspace(args) => handle_workspace(engine.operations_mut(), args, cli.config),
    }
}

fn init_logging(level: LogLevel) {
    let filter = match level {
        LogLevel::Off => "off",
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_new(ops: &Operations, args: NewArgs) -> Result<i32> {
    let NewArgs {
        path,
        template,
        title,
        author,
        class_option,
        overwrite,
        json,
    } = args;

    let template = template
        .as_deref()
        .map(str::parse::<Template>)
        .transpose()?;
    let params = TemplateParams {
        title,
        author,
        class_options: class_option,
    };

    let created = ops.create_document(&path, template, &params, overwrite)?;
    if json {
        print_json(&json!({
            "path": created,
            "template": template.map(|t| t.as_str()),
        }))?;
    } else {
        println!("created {}", created.display());
    }
    Ok(0)
}

fn handle_read(ops: &Operations, args: ReadArgs) -> Result<i32> {
    let content = ops.read_document(&args.path)?;
    if args.json {
        print_json(&json!({
            "path": args.path,
            "content": content,
            "lines": content.lines().count(),
        }))?;
    } else {
        print!("{content}");
    }
    Ok(0)
}

fn handle_write(ops: &Operations, args: WriteArgs) -> Result<i32> {
    let WriteArgs {
        path,
        content,
        from_file,
        no_overwrite,
    } = args;

    let text = match (content, from_file) {
        (Some(text), None) => text,
        (None, Some(file)) => {
            fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?
        }
        _ => anyhow::bail!("provide exactly one of CONTENT or --from-file"),
    };

    let written = ops.write_document(
        &path,
        &text,
        WriteOptions {
            overwrite: !no_overwrite,
        },
    )?;
    println!("wrote {}", written.display());
    Ok(0)
}

fn handle_ls(ops: &Operations, args: LsArgs) -> Result<i32> {
    let entries = ops.list_directory(&args.path, args.recursive)?;
    if args.json {
        print_json(&json!({ "path": args.path, "entries": entries }))?;
    } else {
        for entry in &entries {
            println!(
                "{:>9}  {:<9}  {}",
                entry.size,
                format!("{:?}", entry.kind).to_lowercase(),
                entry.path.display()
            );
        }
    }
    Ok(0)
}

fn handle_mv(ops: &Operations, args: MvArgs) -> Result<i32> {
    let moved = ops.move_document(&args.source, &args.destination, args.force)?;
    println!("moved {} -> {}", args.source.display(), moved.display());
    Ok(0)
}

fn handle_rm(ops: &Operations, args: RmArgs) -> Result<i32> {
    let removed = ops.delete_document(&args.path, args.missing_ok)?;
    if removed {
        println!("removed {}", args.path.display());
    } else {
        println!("already absent {}", args.path.display());
    }
    Ok(0)
}

fn handle_compile(ops: &Operations, args: CompileArgs) -> Result<i32> {
    let request = build_request(ops, &args)?;
    let outcome = ops.compile(&request)?;
    report_outcome(&args.path, &outcome, args.json)?;
    Ok(if outcome.success { 0 } else { 1 })
}

fn handle_validate(ops: &Operations, args: CompileArgs) -> Result<i32> {
    let request = build_request(ops, &args)?;
    let outcome = ops.validate(&request)?;
    report_outcome(&args.path, &outcome, args.json)?;
    Ok(if outcome.success { 0 } else { 1 })
}

fn build_request(
    ops: &Operations,
    args: &CompileArgs,
) -> Result<tex_doc_ops::CompileRequest, OperationError> {
    let engine = args
        .engine
        .as_deref()
        .map(str::parse::<Engine>)
        .transpose()?;
    ops.request_for(
        args.path.clone(),
        engine,
        args.max_passes,
        args.timeout_secs.map(Duration::from_secs),
    )
}

fn report_outcome(path: &PathBuf, outcome: &CompileOutcome, json_output: bool) -> Result<()> {
    if json_output {
        print_json(&json!({
            "path": path,
            "status": outcome.status,
            "success": outcome.success,
            "passes": outcome.passes.len(),
            "diagnostics": outcome.diagnostics,
            "artifacts": outcome.artifacts,
            "output": outcome.output,
        }))?;
        return Ok(());
    }

    for diag in &outcome.diagnostics {
        let location = match (&diag.file, diag.line) {
            (Some(file), Some(line)) => format!("{file}:{line}: "),
            (Some(file), None) => format!("{file}: "),
            _ => String::new(),
        };
        println!("{}: {location}{}", diag.severity.as_str(), diag.message);
    }
    if outcome.success {
        let output = outcome
            .output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(no output file)".to_string());
        println!(
            "ok: {} pass(es), output {}",
            outcome.passes.len(),
            output
        );
    } else {
        println!(
            "failed ({:?}): {} pass(es), {} error(s)",
            outcome.status,
            outcome.passes.len(),
            outcome
                .diagnostics
                .iter()
                .filter(|d| d.severity == Severity::Error)
                .count()
        );
    }
    Ok(())
}

fn handle_check(ops: &Operations, args: CheckArgs) -> Result<i32> {
    let report = ops.check(&args.path)?;
    if args.json {
        print_json(&json!({
            "path": args.path,
            "valid": report.is_valid(),
            "structure_complete": report.structure_complete,
            "diagnostics": report.diagnostics,
        }))?;
    } else {
        for diag in &report.diagnostics {
            let line = diag.line.map(|l| format!(":{l}")).unwrap_or_default();
            println!("{}: {}{line}: {}", diag.severity.as_str(), args.path.display(), diag.message);
        }
        if report.is_valid() {
            println!("ok: {}", args.path.display());
        }
    }
    Ok(if report.is_valid() { 0 } else { 1 })
}

fn handle_clean(ops: &Operations, args: CleanArgs) -> Result<i32> {
    let removed = ops.clean(&args.path)?;
    if args.json {
        print_json(&json!({ "path": args.path, "removed": removed }))?;
    } else if removed.is_empty() {
        println!("nothing to clean");
    } else {
        for path in &removed {
            println!("removed {}", path.display());
        }
    }
    Ok(0)
}

fn handle_workspace(
    ops: &mut Operations,
    args: WorkspaceArgs,
    config_override: Option<PathBuf>,
) -> Result<i32> {
    match args.set {
        None => {
            println!("{}", ops.workspace_root().display());
            Ok(0)
        }
        Some(new_root) => {
            ops.set_workspace_root(&new_root)?;

            // Persist so later invocations pick the new root up.
            let mut config = ops.config().clone();
            config.workspace.root = ops.workspace_root().to_path_buf();
            let target = config_override
                .or_else(|| config.source_path.clone())
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            fs::write(&target, config.to_toml())
                .with_context(|| format!("persisting {}", target.display()))?;

            println!("workspace root set to {}", ops.workspace_root().display());
            Ok(0)
        }
    }
}

fn print_json(payload: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(())
}

#[derive(Parser)]
#[command(author, version, about = "tex-doc toolkit", propagate_version = true)]
struct Cli {
    /// Use a specific configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log verbosity written to stderr
    #[arg(long = "log-level", global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
}

#[derive(Subcommand)]
enum Command {
    /// Create a document from a template
    New(NewArgs),
    /// Print a document's content
    Read(ReadArgs),
    /// Write content to a document
    Write(WriteArgs),
    /// List directory contents
    Ls(LsArgs),
    /// Move or rename a document
    Mv(MvArgs),
    /// Delete a document
    Rm(RmArgs),
    /// Compile a document with the configured engine
    Compile(CompileArgs),
    /// Single dry-run compile pass, retaining no auxiliary files
    Validate(CompileArgs),
    /// Structural checks without invoking an engine
    Check(CheckArgs),
    /// Remove auxiliary files left by compilation
    Clean(CleanArgs),
    /// Show or change the workspace root
    Workspace(WorkspaceArgs),
}

#[derive(Args)]
struct NewArgs {
    /// Path of the document to create, relative to the workspace root
    path: PathBuf,
    /// Template name (article, report, presentation, letter, minimal)
    #[arg(long)]
    template: Option<String>,
    /// Document title
    #[arg(long)]
    title: Option<String>,
    /// Document author
    #[arg(long)]
    author: Option<String>,
    /// Extra \documentclass option (repeatable)
    #[arg(long = "class-option", value_name = "OPT")]
    class_option: Vec<String>,
    /// Replace an existing file
    #[arg(long)]
    overwrite: bool,
    /// Emit JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ReadArgs {
    path: PathBuf,
    /// Emit JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct WriteArgs {
    path: PathBuf,
    /// Literal content to write
    content: Option<String>,
    /// Read content from a local file instead
    #[arg(long, value_name = "FILE", conflicts_with = "content")]
    from_file: Option<PathBuf>,
    /// Fail instead of replacing an existing file
    #[arg(long)]
    no_overwrite: bool,
}

#[derive(Args)]
struct LsArgs {
    /// Directory to list, relative to the workspace root
    #[arg(default_value = ".")]
    path: PathBuf,
    /// Descend into subdirectories
    #[arg(long, short)]
    recursive: bool,
    /// Emit JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct MvArgs {
    source: PathBuf,
    destination: PathBuf,
    /// Replace the destination if it exists
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct RmArgs {
    path: PathBuf,
    /// Succeed even when the file is already gone
    #[arg(long = "missing-ok")]
    missing_ok: bool,
}

#[derive(Args)]
struct CompileArgs {
    /// Document to compile, relative to the workspace root
    path: PathBuf,
    /// Engine (pdflatex, xelatex, lualatex); defaults from configuration
    #[arg(long)]
    engine: Option<String>,
    /// Maximum number of passes
    #[arg(long = "max-passes", value_name = "N")]
    max_passes: Option<u32>,
    /// Per-pass timeout in seconds
    #[arg(long = "timeout-secs", value_name = "SECS")]
    timeout_secs: Option<u64>,
    /// Emit JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CheckArgs {
    path: PathBuf,
    /// Emit JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CleanArgs {
    path: PathBuf,
    /// Emit JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct WorkspaceArgs {
    /// New workspace root; omit to print the current one
    #[arg(long, value_name = "DIR")]
    set: Option<PathBuf>,
}
