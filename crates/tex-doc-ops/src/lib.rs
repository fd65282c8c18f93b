//! High-level operations shared by tex-doc commands.
//!
//! The [`Operations`] bundle owns the confined workspace plus compilation
//! defaults and exposes one method per externally visible operation. Paths
//! given to any method are caller-relative and validated against the
//! workspace root before the filesystem is touched.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tex_doc_config::Config;
use thiserror::Error;

pub mod check;
pub mod clean;
pub mod compile;
pub mod diagnostics;
pub mod store;
pub mod templates;
pub mod workspace;

pub use check::CheckReport;
pub use compile::{
    CompileOutcome, CompileRequest, CompileStatus, Engine, EngineRunner, PassOutput, PassReport,
    PassRunner,
};
pub use diagnostics::{Diagnostic, Severity};
pub use store::{DirEntry, EntryKind, WriteOptions};
pub use templates::{Template, TemplateParams};
pub use workspace::Workspace;

/// Failure taxonomy for workspace operations. Engine-reported compilation
/// problems are not here: they come back as data inside [`CompileOutcome`].
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("path escapes the workspace root: {path}")]
    PathEscape { path: PathBuf },

    #[error("not found: {path}")]
    NotFound { path: PathBuf },

    #[error("already exists: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("unknown template: {name}")]
    UnknownTemplate { name: String },

    #[error("unknown engine: {name}")]
    UnknownEngine { name: String },

    #[error("engine unavailable: {engine} (is it installed and on PATH?)")]
    EngineUnavailable { engine: String },

    #[error("invalid target: {reason}")]
    InvalidTarget { reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Operation bundle wiring the workspace guard, file store, template
/// catalog, pipeline and cleaner together.
pub struct Operations {
    workspace: Workspace,
    config: Config,
}

impl Operations {
    /// Assemble the operation layer from resolved configuration.
    pub fn new(config: Config) -> Result<Self, OperationError> {
        let workspace = Workspace::open(config.workspace.root.clone())?;
        Ok(Self { workspace, config })
    }

    pub fn workspace_root(&self) -> &Path {
        self.workspace.root()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the workspace root after validation; on failure the previous
    /// root remains active.
    pub fn set_workspace_root(&mut self, path: &Path) -> Result<(), OperationError> {
        self.workspace.set_root(path)
    }

    /// Create a document seeded from a template (or empty content when no
    /// template is named).
    pub fn create_document(
        &self,
        path: &Path,
        template: Option<Template>,
        params: &TemplateParams,
        overwrite: bool,
    ) -> Result<PathBuf, OperationError> {
        let content = match template {
            Some(template) => templates::render(template, params),
            None => String::new(),
        };
        store::create_document(&self.workspace, path, &content, overwrite)
    }

    pub fn read_document(&self, path: &Path) -> Result<String, OperationError> {
        store::read_document(&self.workspace, path)
    }

    pub fn write_document(
        &self,
        path: &Path,
        content: &str,
        options: WriteOptions,
    ) -> Result<PathBuf, OperationError> {
        store::write_document(&self.workspace, path, content, options)
    }

    pub fn list_directory(
        &self,
        path: &Path,
        recursive: bool,
    ) -> Result<Vec<DirEntry>, OperationError> {
        store::list_directory(&self.workspace, path, recursive)
    }

    pub fn move_document(
        &self,
        source: &Path,
        destination: &Path,
        overwrite: bool,
    ) -> Result<PathBuf, OperationError> {
        store::move_document(&self.workspace, source, destination, overwrite)
    }

    pub fn delete_document(&self, path: &Path, missing_ok: bool) -> Result<bool, OperationError> {
        store::delete_document(&self.workspace, path, missing_ok)
    }

    /// Compile with the real engine runner derived from configuration.
    pub fn compile(&self, request: &CompileRequest) -> Result<CompileOutcome, OperationError> {
        let runner = self.runner(request);
        compile::compile(&self.workspace, &runner, request)
    }

    /// Single dry-run pass retaining no auxiliary artifacts.
    pub fn validate(&self, request: &CompileRequest) -> Result<CompileOutcome, OperationError> {
        let runner = self.runner(request);
        compile::validate(&self.workspace, &runner, request)
    }

    /// Compile through a caller-supplied runner; the test seam.
    pub fn compile_with(
        &self,
        runner: &dyn PassRunner,
        request: &CompileRequest,
    ) -> Result<CompileOutcome, OperationError> {
        compile::compile(&self.workspace, runner, request)
    }

    pub fn check(&self, path: &Path) -> Result<CheckReport, OperationError> {
        check::check(&self.workspace, path)
    }

    pub fn clean(&self, path: &Path) -> Result<Vec<PathBuf>, OperationError> {
        clean::clean(&self.workspace, path)
    }

    /// Build a [`CompileRequest`] from configured defaults.
    pub fn request_for(
        &self,
        path: impl Into<PathBuf>,
        engine: Option<Engine>,
        max_passes: Option<u32>,
        timeout: Option<Duration>,
    ) -> Result<CompileRequest, OperationError> {
        let engine = match engine {
            Some(engine) => engine,
            None => self.config.compile.engine.parse()?,
        };
        Ok(CompileRequest {
            path: path.into(),
            engine,
            max_passes: max_passes.unwrap_or(self.config.compile.max_passes),
            timeout: timeout
                .unwrap_or_else(|| Duration::from_secs(self.config.compile.timeout_secs)),
        })
    }

    fn runner(&self, request: &CompileRequest) -> EngineRunner {
        EngineRunner::new(
            request.engine,
            self.config.compile.engine_path.clone(),
            request.timeout,
        )
    }
}
