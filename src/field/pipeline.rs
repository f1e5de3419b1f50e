//! Debounced, stale-safe typesetting for one field
//!
//! Every change to a field's content or mode bumps the pipeline generation.
//! Markup content is typeset after a quiet period; a newer edit aborts the
//! pending timer. A render that is already running is never aborted, but it
//! only commits its result if the generation it started with is still the
//! latest one when it finishes. Slow renders of old content therefore can
//! not overwrite the preview of newer content, whatever order they finish in.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::core::value::FieldKind;
use crate::engine::tex;
use crate::engine::{
    load_failure_text, render_failure_text, EngineHandle, EngineLoadState, SurfaceId,
    TypesetOutput,
};

/// Called whenever a commit changes what the field shows
pub type RepaintHook = Arc<dyn Fn() + Send + Sync>;

/// Text handed to the preview for a given mode. Markup without delimiters of
/// its own is wrapped in display math ones, plain text goes to the Markdown
/// preview as is.
pub fn preview_source(kind: FieldKind, content: &str) -> String {
    if content.trim().is_empty() {
        return String::new();
    }
    match kind {
        FieldKind::Markup if tex::is_delimited(content) => content.trim().to_string(),
        FieldKind::Markup => format!("$${}$$", content),
        FieldKind::PlainText => content.to_string(),
    }
}

#[derive(Debug, Default)]
struct RenderState {
    generation: u64,
    last_rendered: Option<String>,
    output: Option<TypesetOutput>,
    advisory: Option<String>,
}

/// What a field should display right now
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewSnapshot {
    pub kind: FieldKind,
    pub content: String,
    /// Source as handed to the preview path
    pub source: String,
    /// Typeset output, present only when it matches `content`
    pub output: Option<TypesetOutput>,
    /// Inline error text
    pub advisory: Option<String>,
    pub engine: EngineLoadState,
}

impl PreviewSnapshot {
    /// Whether a preview pane should be shown at all
    pub fn visible(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// Render scheduler owned by a mounted field
pub struct TypesetPipeline {
    engine: Arc<EngineHandle>,
    runtime: Handle,
    surface: SurfaceId,
    debounce: Duration,
    repaint: RepaintHook,
    state: Arc<Mutex<RenderState>>,
    pending: Option<JoinHandle<()>>,
    observed: Option<(FieldKind, String)>,
}

impl TypesetPipeline {
    /// Mount a pipeline. Requests the shared engine if nobody has yet.
    pub fn new(
        engine: Arc<EngineHandle>,
        runtime: Handle,
        debounce: Duration,
        repaint: RepaintHook,
    ) -> Self {
        engine.request(&runtime);
        Self {
            engine,
            runtime,
            surface: SurfaceId::next(),
            debounce,
            repaint,
            state: Arc::new(Mutex::new(RenderState::default())),
            pending: None,
            observed: None,
        }
    }

    /// Latest requested generation
    pub fn generation(&self) -> u64 {
        lock(&self.state).generation
    }

    /// Feed the field's current value. Unchanged values are ignored; any
    /// change starts a new generation.
    pub fn update(&mut self, kind: FieldKind, content: &str) {
        if let Some((k, c)) = &self.observed {
            if *k == kind && c == content {
                return;
            }
        }
        self.observed = Some((kind, content.to_string()));

        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            if kind != FieldKind::Markup || content.trim().is_empty() {
                state.advisory = None;
            }
            state.generation
        };

        self.cancel_pending();
        if kind != FieldKind::Markup || content.trim().is_empty() {
            return;
        }

        tracing::debug!(
            "Scheduling typeset of generation {} in {:?}",
            generation,
            self.debounce
        );

        let job = RenderJob {
            engine: Arc::clone(&self.engine),
            state: Arc::clone(&self.state),
            repaint: Arc::clone(&self.repaint),
            surface: self.surface,
            generation,
            content: content.to_string(),
        };
        let debounce = self.debounce;
        self.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            // Renders run detached so a later abort only ever hits the timer
            tokio::spawn(job.run());
        }));
    }

    /// Current display state
    pub fn snapshot(&self) -> PreviewSnapshot {
        let (kind, content) = self.observed.clone().unwrap_or_default();
        let engine = self.engine.state();
        let state = lock(&self.state);

        let output = if state.last_rendered.as_deref() == Some(content.as_str()) {
            state.output.clone()
        } else {
            None
        };

        let mut advisory = state.advisory.clone();
        if kind == FieldKind::Markup && !content.trim().is_empty() {
            if let EngineLoadState::Failed(reason) = &engine {
                advisory = Some(load_failure_text(reason));
            }
        }

        PreviewSnapshot {
            kind,
            source: preview_source(kind, &content),
            content,
            output,
            advisory,
            engine,
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl Drop for TypesetPipeline {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

/// One scheduled render
struct RenderJob {
    engine: Arc<EngineHandle>,
    state: Arc<Mutex<RenderState>>,
    repaint: RepaintHook,
    surface: SurfaceId,
    generation: u64,
    content: String,
}

impl RenderJob {
    async fn run(self) {
        let unchanged = lock(&self.state).last_rendered.as_deref() == Some(self.content.as_str());
        if unchanged {
            // Still clear any error left by content typed in between
            self.commit(|state| state.advisory = None);
            return;
        }

        let engine = match self.engine.get().await {
            Ok(engine) => engine,
            Err(e) => {
                let advisory = load_failure_text(&e.to_string());
                self.commit(|state| state.advisory = Some(advisory));
                return;
            }
        };

        // Edits made while the engine loaded supersede this job
        if self.is_stale() {
            tracing::debug!("Skipping stale render of generation {}", self.generation);
            return;
        }

        engine.clear(self.surface);
        engine.reset();

        let source = preview_source(FieldKind::Markup, &self.content);
        let result = engine.typeset(self.surface, &source).await;

        match result {
            Ok(output) => {
                let content = self.content.clone();
                self.commit(|state| {
                    state.advisory = None;
                    state.last_rendered = Some(content);
                    state.output = Some(output);
                });
            }
            Err(e) => {
                tracing::warn!("Typeset of generation {} failed: {}", self.generation, e);
                let advisory = render_failure_text(&e);
                self.commit(|state| state.advisory = Some(advisory));
            }
        }
    }

    fn is_stale(&self) -> bool {
        lock(&self.state).generation != self.generation
    }

    /// Apply `f` if this job's generation is still the latest
    fn commit(&self, f: impl FnOnce(&mut RenderState)) {
        {
            let mut state = lock(&self.state);
            if state.generation != self.generation {
                tracing::debug!(
                    "Discarding stale render of generation {} (latest is {})",
                    self.generation,
                    state.generation
                );
                return;
            }
            f(&mut state);
        }
        (self.repaint)();
    }
}

fn lock(state: &Mutex<RenderState>) -> MutexGuard<'_, RenderState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::engine::testing::{FakeEngine, FakeLoader};
    use crate::engine::RenderError;

    const DEBOUNCE: Duration = Duration::from_millis(300);

    fn pipeline(handle: &Arc<EngineHandle>) -> (TypesetPipeline, Arc<AtomicUsize>) {
        let repaints = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&repaints);
        let pipeline = TypesetPipeline::new(
            Arc::clone(handle),
            Handle::current(),
            DEBOUNCE,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (pipeline, repaints)
    }

    /// Let spawned tasks run, moving the paused clock by `ms`
    async fn wait(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_markup_renders_once_after_quiet_period() {
        let engine = FakeEngine::new();
        let handle = EngineHandle::new(FakeLoader::ready(engine.clone()));
        let (mut field, repaints) = pipeline(&handle);

        field.update(FieldKind::Markup, "x^2");
        assert_eq!(field.snapshot().source, "$$x^2$$");

        wait(299).await;
        assert!(engine.typeset_calls().is_empty());

        wait(2).await;
        assert_eq!(engine.typeset_calls(), vec!["$$x^2$$".to_string()]);

        let snapshot = field.snapshot();
        assert_eq!(snapshot.advisory, None);
        assert_eq!(snapshot.output.unwrap().text, "rendered:$$x^2$$");
        assert!(repaints.load(Ordering::SeqCst) >= 1);
        assert_eq!(engine.clears.load(Ordering::SeqCst), 1);
        assert_eq!(engine.resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_edits_renders_only_the_last() {
        let engine = FakeEngine::new();
        let handle = EngineHandle::new(FakeLoader::ready(engine.clone()));
        let (mut field, _) = pipeline(&handle);

        for content in ["a", "a+", "a+b", "a+b^", "a+b^2"] {
            field.update(FieldKind::Markup, content);
            wait(100).await;
        }
        wait(400).await;

        assert_eq!(engine.typeset_calls(), vec!["$$a+b^2$$".to_string()]);
        assert_eq!(field.generation(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_stale_render_is_discarded() {
        let engine = FakeEngine::new();
        engine.delay("$$slow$$", Duration::from_millis(1000));
        engine.delay("$$fast$$", Duration::from_millis(10));
        let handle = EngineHandle::new(FakeLoader::ready(engine.clone()));
        let (mut field, _) = pipeline(&handle);

        field.update(FieldKind::Markup, "slow");
        wait(350).await;
        // First render is now in flight
        assert_eq!(engine.typeset_calls().len(), 1);

        field.update(FieldKind::Markup, "fast");
        wait(350).await;
        assert_eq!(field.snapshot().output.unwrap().text, "rendered:$$fast$$");

        // The slow render finishes last and must not win
        wait(1000).await;
        let snapshot = field.snapshot();
        assert_eq!(snapshot.content, "fast");
        assert_eq!(snapshot.output.unwrap().text, "rendered:$$fast$$");
        assert_eq!(engine.typeset_calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_content_is_not_retypeset() {
        let engine = FakeEngine::new();
        let handle = EngineHandle::new(FakeLoader::ready(engine.clone()));
        let (mut field, _) = pipeline(&handle);

        field.update(FieldKind::Markup, "x^2");
        wait(400).await;
        field.update(FieldKind::Markup, "x^");
        field.update(FieldKind::Markup, "x^2");
        wait(400).await;

        assert_eq!(engine.typeset_calls().len(), 1);
        assert!(field.snapshot().output.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_failure_does_not_block_later_renders() {
        let engine = FakeEngine::new();
        engine.fail("$$\\foo$$", RenderError::UndefinedControlSequence("foo".to_string()));
        let handle = EngineHandle::new(FakeLoader::ready(engine.clone()));
        let (mut field, _) = pipeline(&handle);

        field.update(FieldKind::Markup, "\\foo");
        wait(400).await;
        let advisory = field.snapshot().advisory.unwrap();
        assert!(advisory.starts_with("LaTeX rendering failed"));
        assert!(advisory.contains("\\foo"));

        field.update(FieldKind::Markup, "\\alpha");
        wait(400).await;
        let snapshot = field.snapshot();
        assert_eq!(snapshot.advisory, None);
        assert_eq!(snapshot.output.unwrap().text, "rendered:$$\\alpha$$");
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_load_failure_is_advisory_only() {
        let loader = FakeLoader::failing("network unreachable");
        let handle = EngineHandle::new(loader.clone());
        let (mut field, _) = pipeline(&handle);

        field.update(FieldKind::Markup, "x^2");
        wait(400).await;

        let snapshot = field.snapshot();
        assert!(snapshot
            .advisory
            .unwrap()
            .starts_with("Failed to load typesetting engine"));
        assert!(loader.engine.typeset_calls().is_empty());

        // Plain text keeps working without the engine
        field.update(FieldKind::PlainText, "x^2");
        let snapshot = field.snapshot();
        assert_eq!(snapshot.advisory, None);
        assert_eq!(snapshot.source, "x^2");
        assert_eq!(snapshot.content, "x^2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_loaded_once_for_many_fields() {
        let engine = FakeEngine::new();
        let loader = FakeLoader::ready(engine.clone());
        let handle = EngineHandle::new(loader.clone());

        let mut fields: Vec<_> = (0..5).map(|_| pipeline(&handle).0).collect();
        for (i, field) in fields.iter_mut().enumerate() {
            field.update(FieldKind::Markup, &format!("x_{}", i));
        }
        wait(400).await;

        assert_eq!(loader.load_count(), 1);
        assert_eq!(handle.state(), EngineLoadState::Ready);
        assert_eq!(engine.typeset_calls().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_switch_keeps_content_and_suppresses_old_render() {
        let engine = FakeEngine::new();
        engine.delay("$$hello$$", Duration::from_millis(500));
        let handle = EngineHandle::new(FakeLoader::ready(engine.clone()));
        let (mut field, _) = pipeline(&handle);

        field.update(FieldKind::PlainText, "hello");
        wait(400).await;
        assert!(engine.typeset_calls().is_empty());

        field.update(FieldKind::Markup, "hello");
        let snapshot = field.snapshot();
        assert_eq!(snapshot.content, "hello");
        assert_eq!(snapshot.source, "$$hello$$");

        // Switch back while the markup render is in flight
        wait(350).await;
        field.update(FieldKind::PlainText, "hello");
        wait(600).await;

        let snapshot = field.snapshot();
        assert_eq!(snapshot.kind, FieldKind::PlainText);
        assert_eq!(snapshot.output, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_content_has_no_preview() {
        let engine = FakeEngine::new();
        let handle = EngineHandle::new(FakeLoader::ready(engine.clone()));
        let (mut field, _) = pipeline(&handle);

        field.update(FieldKind::Markup, "   \n");
        wait(400).await;

        assert!(!field.snapshot().visible());
        assert_eq!(field.snapshot().source, "");
        assert!(engine.typeset_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_during_slow_load_render_only_the_latest() {
        let engine = FakeEngine::new();
        let loader = FakeLoader::ready_after(engine.clone(), Duration::from_millis(2000));
        let handle = EngineHandle::new(loader);
        let (mut field, _) = pipeline(&handle);

        for content in ["a", "ab", "abc"] {
            field.update(FieldKind::Markup, content);
            wait(400).await;
        }
        assert_eq!(handle.state(), EngineLoadState::Loading);

        wait(1500).await;
        assert_eq!(engine.typeset_calls(), vec!["$$abc$$".to_string()]);
        assert_eq!(engine.clears.load(Ordering::SeqCst), 1);
        assert_eq!(engine.resets.load(Ordering::SeqCst), 1);
        assert_eq!(field.snapshot().output.unwrap().text, "rendered:$$abc$$");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delimited_markup_is_not_wrapped_again() {
        let engine = FakeEngine::new();
        let handle = EngineHandle::new(FakeLoader::ready(engine.clone()));
        let (mut field, _) = pipeline(&handle);

        field.update(FieldKind::Markup, " $$x$$ ");
        assert_eq!(field.snapshot().source, "$$x$$");
        wait(400).await;
        assert_eq!(engine.typeset_calls(), vec!["$$x$$".to_string()]);

        assert_eq!(preview_source(FieldKind::Markup, "\\[x\\]"), "\\[x\\]");
        assert_eq!(preview_source(FieldKind::Markup, "x^2"), "$$x^2$$");
        assert_eq!(preview_source(FieldKind::PlainText, "$x$"), "$x$");
    }
}
