mod handle;
#[cfg(feature = "native")]
pub mod native;

pub use handle::{EngineHandle, HandleEvent};
pub(crate) use handle::HandleSubscriber;

use crate::{error::EngineError, presentation::Presentation, PresentationId};

/// Position of a period in the manifest timeline.
pub type PeriodIndex = usize;

pub type EngineResult<T> = Result<T, EngineError>;

/// Invoked by an engine whenever the list of presentations it detected changes.
pub type PresentationsChangedCallback = Box<dyn Fn() + Send + Sync>;

/// A presentation selection engine.
///
/// The engine consumes complete segments of one period, in playback order. It must not be
/// shared between periods. Dropping the engine destroys the underlying resources.
pub trait Engine: Send {
    /// Rewrites `segment` in place so that only the active presentation is decoded.
    fn process_segment(&mut self, segment: &mut [u8]) -> EngineResult<()>;

    fn presentations(&self) -> EngineResult<Vec<Presentation>>;

    /// Returns [`PresentationId::DEVICE_DEFAULT`] when no presentation has been chosen.
    fn active_presentation_id(&self) -> EngineResult<PresentationId>;

    fn set_active_presentation_id(&mut self, id: PresentationId) -> EngineResult<()>;

    fn set_presentations_changed_callback(&mut self, callback: PresentationsChangedCallback);
}

impl<E> Engine for Box<E>
where
    E: Engine + ?Sized,
{
    fn process_segment(&mut self, segment: &mut [u8]) -> EngineResult<()> {
        (**self).process_segment(segment)
    }

    fn presentations(&self) -> EngineResult<Vec<Presentation>> {
        (**self).presentations()
    }

    fn active_presentation_id(&self) -> EngineResult<PresentationId> {
        (**self).active_presentation_id()
    }

    fn set_active_presentation_id(&mut self, id: PresentationId) -> EngineResult<()> {
        (**self).set_active_presentation_id(id)
    }

    fn set_presentations_changed_callback(&mut self, callback: PresentationsChangedCallback) {
        (**self).set_presentations_changed_callback(callback)
    }
}

/// Creates one engine instance per period.
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> EngineResult<Box<dyn Engine>>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> EngineResult<Box<dyn Engine>> + Send + Sync,
{
    fn create(&self) -> EngineResult<Box<dyn Engine>> {
        self()
    }
}
