//! Core orchestration layer for tex-doc.

use tex_doc_config::Config;
use tex_doc_ops::{OperationError, Operations};

/// Entry point for higher-level consumers (CLI, transport adapters, etc.).
pub struct TexDoc {
    ops: Operations,
}

impl TexDoc {
    /// Bootstrap the tex-doc engine from configuration.
    pub fn bootstrap(config: Config) -> Result<Self, OperationError> {
        Ok(Self {
            ops: Operations::new(config)?,
        })
    }

    /// Access the operation bundle.
    pub fn operations(&self) -> &Operations {
        &self.ops
    }

    /// Mutable access, needed for the workspace-root swap.
    pub fn operations_mut(&mut self) -> &mut Operations {
        &mut self.ops
    }
}
