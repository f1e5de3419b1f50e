//! Field editing support shared by the LaTeX and paragraph widgets

pub mod pipeline;

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::engine::EngineHandle;

pub use pipeline::{PreviewSnapshot, RepaintHook, TypesetPipeline};

/// Flags a form hands to each field widget
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldFlags<'a> {
    pub disabled: bool,
    pub submitting: bool,
    pub autofocus: bool,
    /// Validation message for this field, if any
    pub error: Option<&'a str>,
}

impl FieldFlags<'_> {
    /// Inputs are read-only while disabled or during a save
    pub fn read_only(&self) -> bool {
        self.disabled || self.submitting
    }
}

/// What a form needs to mount typeset fields
#[derive(Clone)]
pub struct FieldContext {
    pub engine: Arc<EngineHandle>,
    pub runtime: Handle,
    pub debounce: Duration,
    pub repaint: RepaintHook,
    /// Rows shown by multiline editors
    pub rows: usize,
}

impl FieldContext {
    /// Mount a new pipeline on the shared engine
    pub fn pipeline(&self) -> TypesetPipeline {
        TypesetPipeline::new(
            Arc::clone(&self.engine),
            self.runtime.clone(),
            self.debounce,
            Arc::clone(&self.repaint),
        )
    }
}
