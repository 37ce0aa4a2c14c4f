//! Backend selection and the compiled unit
//!
//! Compilation is a pure function of (source text, backend): both backends
//! are driven through the same signature so callers stay backend-agnostic,
//! and a failure returns a diagnostic with no resources retained. The
//! resulting image is backend-tagged; release always dispatches through the
//! matching variant, and the `Arc` share into each runtime instance makes it
//! impossible to free an image that is still being executed.

use std::sync::Arc;

use tracing::debug;

use crate::diagnostics::CompileError;
use crate::instance::RuntimeInstance;
use crate::opcode::{self, OpProgram};
use crate::parser;
use crate::program::{self, CheckedProgram, ProgramMeta};

/// Compilation strategy. Selected once at host construction; every
/// recompilation reuses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Lower ahead-of-time to a flat op list executed in a tight loop.
    Compiled,
    /// Walk the checked tree directly.
    Interpreted,
}

/// Backend-tagged executable image.
#[derive(Debug)]
pub enum ProgramImage {
    Compiled(OpProgram),
    Interpreted(CheckedProgram),
}

impl ProgramImage {
    pub fn meta(&self) -> &ProgramMeta {
        match self {
            ProgramImage::Compiled(p) => &p.meta,
            ProgramImage::Interpreted(p) => &p.meta,
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            ProgramImage::Compiled(_) => Backend::Compiled,
            ProgramImage::Interpreted(_) => Backend::Interpreted,
        }
    }
}

/// The compiled unit: owns the image and mints runtime instances from it.
#[derive(Debug)]
pub struct ProgramFactory {
    image: Arc<ProgramImage>,
}

impl ProgramFactory {
    pub fn backend(&self) -> Backend {
        self.image.backend()
    }

    pub fn meta(&self) -> &ProgramMeta {
        self.image.meta()
    }

    /// Create a runnable processor bound to `sample_rate`. The instance
    /// shares the image, so the factory may be replaced while old instances
    /// drain elsewhere.
    pub fn instantiate(&self, sample_rate: u32) -> RuntimeInstance {
        RuntimeInstance::new(self.image.clone(), sample_rate)
    }

    pub(crate) fn image(&self) -> &Arc<ProgramImage> {
        &self.image
    }
}

/// Compile source text with the selected backend.
pub fn compile_source(source: &str, backend: Backend) -> Result<ProgramFactory, CompileError> {
    let def = parser::parse(source)?;
    let checked = program::check(&def)?;
    debug!(
        ?backend,
        controls = checked.meta.controls.len(),
        buses = checked.meta.num_buses,
        "program checked"
    );

    let image = match backend {
        Backend::Compiled => ProgramImage::Compiled(opcode::lower(&checked)),
        Backend::Interpreted => ProgramImage::Interpreted(checked),
    };

    Ok(ProgramFactory {
        image: Arc::new(image),
    })
}
