use std::{
    collections::HashMap,
    ptr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::watch;

use crate::{
    config::SessionConfig,
    engine::{EngineFactory, EngineHandle, HandleEvent, HandleSubscriber, PeriodIndex},
    error::EngineError,
    presentation::{build_entries, PresentationEntry, PresentationId},
};

/// Playback events the session reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Playback jumped or moved on to `period`.
    PositionDiscontinuity { period: PeriodIndex },
}

/// Outcome of applying a presentation id to the live handles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropagationReport {
    pub applied: Vec<PeriodIndex>,
    pub failed: Vec<(PeriodIndex, EngineError)>,
}

impl PropagationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

struct SessionState {
    handles: HashMap<PeriodIndex, Arc<EngineHandle>>,
    current_period: PeriodIndex,
    preferred: Option<PresentationId>,
}

struct SessionInner {
    factory: Arc<dyn EngineFactory>,
    persistence_enabled: bool,
    // lock order: `state` first, then the engine of a handle
    state: Mutex<SessionState>,
    presentations: watch::Sender<Vec<PresentationEntry>>,
}

impl SessionInner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        let entries = match state.handles.get(&state.current_period) {
            Some(handle) => {
                let current = handle
                    .presentations()
                    .and_then(|list| Ok((list, handle.active_presentation_id()?)));
                match current {
                    Ok((list, active)) => build_entries(&list, active),
                    Err(e) => {
                        tracing::error!(
                            period = state.current_period,
                            "Failed to read presentations: {e}"
                        );
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        self.presentations.send_if_modified(|current| {
            if *current == entries {
                return false;
            }
            *current = entries;
            true
        });
    }
}

impl HandleSubscriber for SessionInner {
    fn on_handle_event(&self, handle: &EngineHandle, event: HandleEvent) {
        let HandleEvent::PresentationsChanged { period } = event;
        let state = self.lock();

        let is_owned = state
            .handles
            .get(&period)
            .is_some_and(|owned| ptr::eq(owned.as_ref(), handle));
        if !is_owned {
            tracing::debug!(period, "Ignoring event of a reclaimed handle");
            return;
        }

        if self.persistence_enabled {
            let id = state.preferred.unwrap_or(PresentationId::DEVICE_DEFAULT);
            if let Err(e) = handle.set_active_presentation_id(id) {
                tracing::warn!(
                    period,
                    presentation_id = %id,
                    "Failed to restore presentation, falling back to device default: {e}"
                );
                if !id.is_device_default() {
                    if let Err(e) =
                        handle.set_active_presentation_id(PresentationId::DEVICE_DEFAULT)
                    {
                        tracing::warn!(period, "Failed to select device default: {e}");
                    }
                }
            }
        }

        if period == state.current_period {
            self.publish(&state);
        }
    }
}

/// Owns one [`EngineHandle`] per period and keeps the user's presentation choice stable
/// while playback moves through the timeline.
///
/// Cloning the manager is cheap; all clones share the same session.
#[derive(Clone)]
pub struct PresentationSessionManager {
    inner: Arc<SessionInner>,
}

impl PresentationSessionManager {
    pub fn new<F>(factory: F, config: &SessionConfig) -> Self
    where
        F: EngineFactory + 'static,
    {
        Self::with_factory(Arc::new(factory), config.persistence_enabled)
    }

    pub fn with_factory(factory: Arc<dyn EngineFactory>, persistence_enabled: bool) -> Self {
        let (presentations, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(SessionInner {
                factory,
                persistence_enabled,
                state: Mutex::new(SessionState {
                    handles: HashMap::new(),
                    current_period: 0,
                    preferred: None,
                }),
                presentations,
            }),
        }
    }

    pub fn persistence_enabled(&self) -> bool {
        self.inner.persistence_enabled
    }

    /// Returns the handle of `period`, creating its engine on first use.
    ///
    /// Returns `None` when the engine cannot be created. Nothing is registered in that case
    /// and the next call tries again.
    pub fn handle(&self, period: PeriodIndex) -> Option<Arc<EngineHandle>> {
        let mut state = self.inner.lock();
        if let Some(handle) = state.handles.get(&period) {
            return Some(handle.clone());
        }

        let engine = match self.inner.factory.create() {
            Ok(engine) => engine,
            Err(e) => {
                tracing::error!(period, "Failed to create engine: {e}");
                return None;
            }
        };

        let handle = Arc::new(EngineHandle::new(period, engine));
        let inner: Arc<dyn HandleSubscriber> = self.inner.clone();
        handle.subscribe(Arc::downgrade(&inner));
        state.handles.insert(period, handle.clone());
        tracing::info!(period, "Engine created");

        Some(handle)
    }

    /// Selects presentation `id`.
    ///
    /// With persistence enabled the id is remembered and applied to every live handle,
    /// otherwise only to the handle of the current period. Each handle is updated on its
    /// own: a failure is recorded in the report and does not stop the others.
    pub fn set_active_presentation(&self, id: PresentationId) -> PropagationReport {
        let mut state = self.inner.lock();

        let mut targets: Vec<Arc<EngineHandle>> = if self.inner.persistence_enabled {
            state.preferred = Some(id);
            state.handles.values().cloned().collect()
        } else {
            state
                .handles
                .get(&state.current_period)
                .cloned()
                .into_iter()
                .collect()
        };
        targets.sort_by_key(|handle| handle.period());

        let mut report = PropagationReport::default();
        for handle in targets {
            match handle.set_active_presentation_id(id) {
                Ok(()) => report.applied.push(handle.period()),
                Err(e) => {
                    tracing::warn!(
                        period = handle.period(),
                        presentation_id = %id,
                        "Failed to set active presentation: {e}"
                    );
                    report.failed.push((handle.period(), e));
                }
            }
        }
        tracing::info!(
            presentation_id = %id,
            applied = report.applied.len(),
            failed = report.failed.len(),
            "Active presentation selected"
        );

        self.inner.publish(&state);
        report
    }

    /// Moves the current period cursor and destroys every handle of an earlier period.
    pub fn set_current_period(&self, period: PeriodIndex) {
        let mut state = self.inner.lock();
        state.current_period = period;
        self.inner.publish(&state);

        let stale: Vec<PeriodIndex> = state
            .handles
            .keys()
            .copied()
            .filter(|index| *index < period)
            .collect();
        for index in stale {
            if let Some(handle) = state.handles.remove(&index) {
                handle.release();
                tracing::info!(period = index, "Engine reclaimed");
            }
        }
    }

    pub fn on_player_event(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::PositionDiscontinuity { period } => self.set_current_period(period),
        }
    }

    /// Destroys every handle and forgets the preferred presentation.
    pub fn release_all(&self) {
        let mut state = self.inner.lock();
        let released = state.handles.len();
        for (_, handle) in state.handles.drain() {
            handle.release();
        }
        state.preferred = None;
        self.inner.publish(&state);

        if released > 0 {
            tracing::info!(released, "Session released");
        }
    }

    /// Presentations of the current period, the device default entry first.
    pub fn presentations(&self) -> Vec<PresentationEntry> {
        self.inner.presentations.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<PresentationEntry>> {
        self.inner.presentations.subscribe()
    }

    pub fn current_period(&self) -> PeriodIndex {
        self.inner.lock().current_period
    }

    pub fn preferred_presentation(&self) -> Option<PresentationId> {
        self.inner.lock().preferred
    }

    /// Periods that currently own an engine, in ascending order.
    pub fn live_periods(&self) -> Vec<PeriodIndex> {
        let mut periods: Vec<_> = self.inner.lock().handles.keys().copied().collect();
        periods.sort_unstable();
        periods
    }
}
