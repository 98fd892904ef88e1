// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recognition engine handle.
//
// The recognition backend is expensive to build (model loading, compute
// memory) so it is built at most once per `EngineHandle`. The composition root
// owns one handle for the whole process and passes it to every pipeline.
//
// Initialisation runs lazily on the first `ensure_ready` call. Concurrent
// first callers wait on that single initialisation. A failed initialisation is
// cached: every later call gets `EngineNotReady` with the original message and
// the backend is never rebuilt.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, OnceLock};

use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::types::EngineStatus;
use tracing::{debug, error, info, instrument};

use crate::image::{ChannelOrder, NormalizedImage};

/// A text-recognition backend.
///
/// `recognize` may be called from many threads at once. Backends that cannot
/// tolerate that are wrapped by the handle when `serialize_recognition` is set.
pub trait RecognitionBackend: Send + Sync {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Channel order the backend expects in its input buffer.
    fn channel_order(&self) -> ChannelOrder {
        ChannelOrder::Rgb
    }

    /// Whether the backend is running on an accelerator.
    fn accelerator_available(&self) -> bool {
        false
    }

    /// Recognise text lines in reading order. An image with no text yields
    /// an empty vector.
    fn recognize(&self, image: &NormalizedImage) -> Result<Vec<String>>;
}

/// Builds the backend. Called at most once per handle.
pub type BackendFactory = Box<dyn Fn() -> Result<Arc<dyn RecognitionBackend>> + Send + Sync>;

/// An initialised engine, cheap to clone and share between page tasks.
#[derive(Clone)]
pub struct Engine {
    backend: Arc<dyn RecognitionBackend>,
    /// Present when recognition calls must not overlap.
    gate: Option<Arc<Mutex<()>>>,
}

impl Engine {
    fn new(backend: Arc<dyn RecognitionBackend>, serialize_recognition: bool) -> Self {
        Self {
            backend,
            gate: serialize_recognition.then(|| Arc::new(Mutex::new(()))),
        }
    }

    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn channel_order(&self) -> ChannelOrder {
        self.backend.channel_order()
    }

    pub fn accelerator_available(&self) -> bool {
        self.backend.accelerator_available()
    }

    pub fn is_serialized(&self) -> bool {
        self.gate.is_some()
    }

    /// Run recognition on one image.
    ///
    /// A failure here is scoped to this image; the engine stays usable.
    pub fn recognize(&self, image: &NormalizedImage) -> Result<Vec<String>> {
        match &self.gate {
            Some(gate) => {
                // A panic inside a previous call poisons the gate but leaves
                // nothing inconsistent behind it.
                let _guard = gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                self.backend.recognize(image)
            }
            None => self.backend.recognize(image),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("backend", &self.name())
            .field("serialized", &self.is_serialized())
            .finish()
    }
}

/// Lazily-initialised, process-lifetime owner of the recognition engine.
pub struct EngineHandle {
    factory: BackendFactory,
    serialize_recognition: bool,
    state: OnceLock<std::result::Result<Engine, String>>,
}

impl EngineHandle {
    /// Create a handle that will build its backend with `factory` on first use.
    pub fn new<F>(factory: F, serialize_recognition: bool) -> Self
    where
        F: Fn() -> Result<Arc<dyn RecognitionBackend>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            serialize_recognition,
            state: OnceLock::new(),
        }
    }

    /// Create a handle around an already-built backend.
    pub fn from_backend(backend: Arc<dyn RecognitionBackend>, serialize_recognition: bool) -> Self {
        let handle = Self::new(
            || {
                Err(LesewerkError::EngineNotReady(
                    "prebuilt engine handle has no factory".into(),
                ))
            },
            serialize_recognition,
        );
        let _ = handle
            .state
            .set(Ok(Engine::new(backend, serialize_recognition)));
        handle
    }

    /// Return the engine, initialising it on the first call.
    #[instrument(skip_all)]
    pub fn ensure_ready(&self) -> Result<Engine> {
        let state = self.state.get_or_init(|| {
            info!(
                serialize_recognition = self.serialize_recognition,
                "Initialising recognition engine"
            );
            // A panic is cached like any other failure.
            match catch_unwind(AssertUnwindSafe(|| (self.factory)())) {
                Ok(Ok(backend)) => {
                    info!(backend = backend.name(), "Recognition engine ready");
                    Ok(Engine::new(backend, self.serialize_recognition))
                }
                Ok(Err(err)) => {
                    error!(error = %err, "Recognition engine initialisation failed");
                    Err(err.to_string())
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(panic = %message, "Recognition engine initialisation panicked");
                    Err(format!("engine initialisation panicked: {message}"))
                }
            }
        });

        match state {
            Ok(engine) => {
                debug!("Reusing initialised recognition engine");
                Ok(engine.clone())
            }
            Err(message) => Err(LesewerkError::EngineNotReady(message.clone())),
        }
    }

    /// Current lifecycle state, without triggering initialisation.
    pub fn status(&self) -> EngineStatus {
        match self.state.get() {
            None => EngineStatus::Uninitialized,
            Some(Ok(_)) => EngineStatus::Ready,
            Some(Err(message)) => EngineStatus::Failed(message.clone()),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("serialize_recognition", &self.serialize_recognition)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBackend, normalized};
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handle(calls: Arc<AtomicUsize>, fail: bool) -> EngineHandle {
        EngineHandle::new(
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                // Widen the window in which racing callers could double-init.
                std::thread::sleep(std::time::Duration::from_millis(20));
                if fail {
                    Err(LesewerkError::EngineNotReady("models missing".into()))
                } else {
                    let backend: Arc<dyn RecognitionBackend> = Arc::new(ScriptedBackend::new());
                    Ok(backend)
                }
            },
            false,
        )
    }

    #[test]
    fn concurrent_first_use_initialises_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = counting_handle(Arc::clone(&calls), false);
        let barrier = Barrier::new(16);

        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    barrier.wait();
                    assert!(handle.ensure_ready().is_ok());
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handle.status(), EngineStatus::Ready);
    }

    #[test]
    fn failed_initialisation_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = counting_handle(Arc::clone(&calls), true);
        assert_eq!(handle.status(), EngineStatus::Uninitialized);

        for _ in 0..3 {
            let err = handle.ensure_ready().unwrap_err();
            assert!(err.is_process_fatal());
            assert!(err.to_string().contains("models missing"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(handle.status(), EngineStatus::Failed(_)));
    }

    #[test]
    fn panicking_initialisation_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = EngineHandle::new(
            move || {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("corrupt model file");
                }
                let backend: Arc<dyn RecognitionBackend> = Arc::new(ScriptedBackend::new());
                Ok(backend)
            },
            false,
        );

        let first = handle.ensure_ready().unwrap_err();
        assert!(first.is_process_fatal());
        assert!(first.to_string().contains("corrupt model file"));
        assert!(matches!(handle.status(), EngineStatus::Failed(_)));

        assert!(handle.ensure_ready().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn engine_debug_names_backend() {
        let handle = EngineHandle::from_backend(Arc::new(ScriptedBackend::new()), true);
        let engine = handle.ensure_ready().unwrap();
        let rendered = format!("{engine:?}");
        assert!(rendered.contains("scripted"));
        assert!(rendered.contains("serialized: true"));
    }

    #[test]
    fn recognition_failure_leaves_engine_usable() {
        let backend = ScriptedBackend::new()
            .with_page(40, &["hello"])
            .failing_on(90);
        let handle = EngineHandle::from_backend(Arc::new(backend), false);
        let engine = handle.ensure_ready().unwrap();

        assert!(matches!(
            engine.recognize(&normalized(90)),
            Err(LesewerkError::Recognition(_))
        ));
        assert_eq!(engine.recognize(&normalized(40)).unwrap(), vec!["hello"]);
        assert_eq!(handle.status(), EngineStatus::Ready);
    }

    #[test]
    fn serialized_engine_reports_gate() {
        let handle = EngineHandle::from_backend(Arc::new(ScriptedBackend::new()), true);
        assert!(handle.ensure_ready().unwrap().is_serialized());
    }
}
