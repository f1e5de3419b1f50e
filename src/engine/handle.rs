//! Load-once engine handle
//!
//! Every field shares one handle. The first request starts the load on the
//! runtime; later requests, and renders waiting for the engine, attach to the
//! same attempt through a `tokio::sync::OnceCell`. Once the attempt settles
//! the outcome is kept for the lifetime of the handle, success or failure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::OnceCell;

use super::{EngineLoadError, EngineLoader, TypesetEngine};

/// Lifecycle of the shared engine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EngineLoadState {
    #[default]
    NotRequested,
    Loading,
    Ready,
    Failed(String),
}

type LoadOutcome = Result<Arc<dyn TypesetEngine>, EngineLoadError>;

/// Shared handle to the lazily loaded engine
pub struct EngineHandle {
    loader: Arc<dyn EngineLoader>,
    outcome: OnceCell<LoadOutcome>,
    state: Mutex<EngineLoadState>,
    attempts: AtomicUsize,
}

impl EngineHandle {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Arc<Self> {
        Arc::new(Self {
            loader,
            outcome: OnceCell::new(),
            state: Mutex::new(EngineLoadState::NotRequested),
            attempts: AtomicUsize::new(0),
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineLoadState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Number of load attempts made so far (zero or one)
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Start loading in the background unless a load was already requested
    pub fn request(self: &Arc<Self>, runtime: &Handle) {
        {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            if *state != EngineLoadState::NotRequested {
                return;
            }
            *state = EngineLoadState::Loading;
        }

        let this = Arc::clone(self);
        runtime.spawn(async move {
            let _ = this.get().await;
        });
    }

    /// Wait for the engine, loading it if nobody has yet
    pub async fn get(&self) -> LoadOutcome {
        self.outcome
            .get_or_init(|| async {
                self.set_state(EngineLoadState::Loading);
                self.attempts.fetch_add(1, Ordering::SeqCst);
                tracing::info!("Loading typesetting engine");

                // A loader that panics or is cancelled fails the attempt
                // instead of leaving the cell empty
                let loader = Arc::clone(&self.loader);
                let outcome = match tokio::spawn(async move { loader.load().await }).await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(EngineLoadError::Interrupted(e.to_string())),
                };
                match &outcome {
                    Ok(_) => {
                        tracing::info!("Typesetting engine ready");
                        self.set_state(EngineLoadState::Ready);
                    }
                    Err(e) => {
                        tracing::error!("Failed to load typesetting engine: {}", e);
                        self.set_state(EngineLoadState::Failed(e.to_string()));
                    }
                }
                outcome
            })
            .await
            .clone()
    }

    fn set_state(&self, new_state: EngineLoadState) {
        if let Ok(mut state) = self.state.lock() {
            *state = new_state;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::engine::testing::{FakeEngine, FakeLoader};

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_one_load() {
        let loader = FakeLoader::ready(FakeEngine::new());
        let handle = EngineHandle::new(loader.clone());
        assert_eq!(handle.state(), EngineLoadState::NotRequested);

        let runtime = Handle::current();
        handle.request(&runtime);
        handle.request(&runtime);
        assert_eq!(handle.state(), EngineLoadState::Loading);

        let (a, b) = tokio::join!(handle.get(), handle.get());
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(handle.state(), EngineLoadState::Ready);
        assert_eq!(loader.load_count(), 1);
        assert_eq!(handle.attempts(), 1);

        // A later mount reuses the cached outcome
        handle.request(&runtime);
        assert!(handle.get().await.is_ok());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(loader.load_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_terminal() {
        let loader = FakeLoader::failing("network unreachable");
        let handle = EngineHandle::new(loader.clone());

        assert!(handle.get().await.is_err());
        assert!(matches!(handle.state(), EngineLoadState::Failed(reason) if reason.contains("network unreachable")));

        assert!(handle.get().await.is_err());
        assert_eq!(loader.load_count(), 1);
    }

    struct PanickingLoader;

    async fn explode() -> LoadOutcome {
        panic!("symbol table exploded")
    }

    impl EngineLoader for PanickingLoader {
        fn load(&self) -> crate::engine::EngineFuture<'_, LoadOutcome> {
            Box::pin(explode())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_loader_fails_the_attempt() {
        let handle = EngineHandle::new(Arc::new(PanickingLoader));

        let outcome = handle.get().await;
        assert!(matches!(outcome, Err(EngineLoadError::Interrupted(_))));
        assert!(matches!(handle.state(), EngineLoadState::Failed(reason) if reason.starts_with("loader stopped")));
        assert_eq!(handle.attempts(), 1);

        // The failure is kept, nothing is retried
        assert!(handle.get().await.is_err());
        assert_eq!(handle.attempts(), 1);
    }
}
