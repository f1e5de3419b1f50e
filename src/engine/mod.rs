//! Typesetting engine used by the LaTeX previews
//!
//! The engine is reached through the [`TypesetEngine`] capability: typeset a
//! source onto a surface, clear what a surface shows, and reset the TeX state
//! (labels, equation numbers) that accumulates between calls. It is acquired
//! once per process through an [`EngineHandle`], which drives an
//! [`EngineLoader`] and shares its single outcome with every field.

pub mod handle;
pub mod loader;
pub mod symbols;
pub mod tex;

pub use handle::{EngineHandle, EngineLoadState};
pub use loader::SymbolTableLoader;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Boxed future returned by engine operations
pub type EngineFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Identifies the preview area a field typesets into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

impl SurfaceId {
    /// Allocate a fresh surface id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Result of typesetting one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypesetOutput {
    /// Rendered text
    pub text: String,
    /// Equation tag, from `\tag` or automatic numbering
    pub tag: Option<String>,
}

/// Engine acquisition failure. Terminal for the handle that saw it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineLoadError {
    #[error("could not read {path}: {reason}")]
    Resource { path: String, reason: String },
    #[error("invalid symbol table: {0}")]
    InvalidTable(String),
    #[error("loader stopped before finishing: {0}")]
    Interrupted(String),
}

/// Failure of a single typeset call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("Undefined control sequence \\{0}")]
    UndefinedControlSequence(String),
    #[error("Missing close brace")]
    MissingCloseBrace,
    #[error("Extra close brace")]
    ExtraCloseBrace,
    #[error("Missing argument for \\{0}")]
    MissingArgument(String),
    #[error("Label '{0}' multiply defined")]
    DuplicateLabel(String),
    #[error("engine unavailable: {0}")]
    Engine(String),
}

/// Advisory text for a failed engine load
pub fn load_failure_text(reason: &str) -> String {
    format!("Failed to load typesetting engine: {}", reason)
}

/// Advisory text for a failed render
pub fn render_failure_text(error: &RenderError) -> String {
    format!("LaTeX rendering failed: {}", error)
}

/// Operations the preview needs from a typesetting engine
pub trait TypesetEngine: Send + Sync {
    /// Typeset `source` and attach the result to `surface`
    fn typeset<'a>(
        &'a self,
        surface: SurfaceId,
        source: &'a str,
    ) -> EngineFuture<'a, Result<TypesetOutput, RenderError>>;

    /// Forget what was typeset onto `surface`
    fn clear(&self, surface: SurfaceId);

    /// Drop accumulated TeX state (labels, equation numbers)
    fn reset(&self);
}

/// Acquires an engine. Called at most once per [`EngineHandle`].
pub trait EngineLoader: Send + Sync {
    fn load(&self) -> EngineFuture<'_, Result<Arc<dyn TypesetEngine>, EngineLoadError>>;
}
