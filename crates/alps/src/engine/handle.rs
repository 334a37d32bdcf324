use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak,
    },
};

use super::{Engine, EngineResult, PeriodIndex};
use crate::{error::EngineError, presentation::Presentation, PresentationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleEvent {
    /// The engine reported a new presentation list while processing a segment.
    PresentationsChanged { period: PeriodIndex },
}

/// Receives the events of the handles it owns.
pub(crate) trait HandleSubscriber: Send + Sync {
    fn on_handle_event(&self, handle: &EngineHandle, event: HandleEvent);
}

/// Owns the engine instance of a single period.
///
/// The engine is destroyed exactly once, either by [`EngineHandle::release`] or when the
/// last reference to the handle is dropped. Every call after release fails with
/// [`EngineError::Released`].
pub struct EngineHandle {
    period: PeriodIndex,
    engine: Mutex<Option<Box<dyn Engine>>>,
    changed: Arc<AtomicBool>,
    subscriber: OnceLock<Weak<dyn HandleSubscriber>>,
}

impl EngineHandle {
    pub fn new(period: PeriodIndex, mut engine: Box<dyn Engine>) -> Self {
        let changed = Arc::new(AtomicBool::new(false));
        let flag = changed.clone();
        engine.set_presentations_changed_callback(Box::new(move || {
            flag.store(true, Ordering::Release);
        }));

        Self {
            period,
            engine: Mutex::new(Some(engine)),
            changed,
            subscriber: OnceLock::new(),
        }
    }

    pub fn period(&self) -> PeriodIndex {
        self.period
    }

    pub fn is_released(&self) -> bool {
        self.lock().is_none()
    }

    /// Processes one complete segment.
    ///
    /// The engine works on a copy of `segment`, which is written back only when the engine
    /// succeeds. A presentation list change detected during processing is dispatched to the
    /// subscriber after the engine lock has been released.
    pub fn process_segment(&self, segment: &mut [u8]) -> EngineResult<()> {
        let result = {
            let mut engine = self.lock();
            let engine = engine.as_mut().ok_or(EngineError::Released)?;

            let mut scratch = segment.to_vec();
            engine.process_segment(&mut scratch).map(|()| scratch)
        };

        self.dispatch_changes();

        let processed = result?;
        segment.copy_from_slice(&processed);
        Ok(())
    }

    pub fn presentations(&self) -> EngineResult<Vec<Presentation>> {
        self.with_engine(|engine| engine.presentations())
    }

    pub fn active_presentation_id(&self) -> EngineResult<PresentationId> {
        self.with_engine(|engine| engine.active_presentation_id())
    }

    pub fn set_active_presentation_id(&self, id: PresentationId) -> EngineResult<()> {
        let mut engine = self.lock();
        let engine = engine.as_mut().ok_or(EngineError::Released)?;
        engine.set_active_presentation_id(id)
    }

    /// Destroys the engine. Returns `false` if it was already destroyed.
    pub(crate) fn release(&self) -> bool {
        let engine = self.lock().take();
        match engine {
            Some(engine) => {
                drop(engine);
                tracing::debug!(period = self.period, "Engine released");
                true
            }
            None => false,
        }
    }

    /// Registers the single subscriber of this handle. Later registrations are ignored.
    pub(crate) fn subscribe(&self, subscriber: Weak<dyn HandleSubscriber>) -> bool {
        self.subscriber.set(subscriber).is_ok()
    }

    fn with_engine<T>(&self, f: impl FnOnce(&dyn Engine) -> EngineResult<T>) -> EngineResult<T> {
        let engine = self.lock();
        let engine = engine.as_deref().ok_or(EngineError::Released)?;
        f(engine)
    }

    fn dispatch_changes(&self) {
        if !self.changed.swap(false, Ordering::AcqRel) {
            return;
        }

        let event = HandleEvent::PresentationsChanged {
            period: self.period,
        };
        tracing::debug!(period = self.period, "Presentations changed");
        if let Some(subscriber) = self.subscriber.get().and_then(Weak::upgrade) {
            subscriber.on_handle_event(self, event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn Engine>>> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("period", &self.period)
            .field("released", &self.is_released())
            .finish()
    }
}
