use std::sync::Arc;

use crate::{
    classify::{FormatClassifier, SourceDetector, TrackFormat},
    config::{AlpsConfig, InterceptorConfig},
    engine::{EngineHandle, PeriodIndex},
    session::PresentationSessionManager,
    source::{DataSourceFactory, HttpDataSource, SegmentInterceptor},
};

/// The engine consumes exactly one segment per load.
pub const MAX_SEGMENTS_PER_LOAD: usize = 1;

/// A chunk loader asking for a data source for one of its tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    pub period: PeriodIndex,
    pub format: TrackFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Segments go through a [`SegmentInterceptor`] bound to the engine of `period`.
    Intercepted { period: PeriodIndex },
    Plain,
}

pub struct ChunkSource {
    pub data_source: Box<dyn HttpDataSource>,
    pub max_segments_per_load: usize,
    pub route: Route,
}

/// Picks the data path of every chunk source: intercepted for the target stream, plain for
/// everything else.
///
/// Missing format metadata or an engine that cannot be created never fail the request:
/// the chunk is played unmodified through the plain path.
pub struct ChunkRoutingFactory {
    sessions: PresentationSessionManager,
    upstream: Arc<dyn DataSourceFactory>,
    classifier: FormatClassifier,
    interceptor: InterceptorConfig,
    detector: Option<Arc<dyn SourceDetector>>,
}

impl ChunkRoutingFactory {
    pub fn new(
        sessions: PresentationSessionManager,
        upstream: Arc<dyn DataSourceFactory>,
        config: &AlpsConfig,
    ) -> Self {
        Self {
            sessions,
            upstream,
            classifier: FormatClassifier::new(config.target.clone().into()),
            interceptor: config.interceptor,
            detector: None,
        }
    }

    /// Attaches `detector` to every intercepting data source created afterwards.
    pub fn with_detector(mut self, detector: Arc<dyn SourceDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn sessions(&self) -> &PresentationSessionManager {
        &self.sessions
    }

    pub fn create_chunk_source(&self, request: &ChunkRequest) -> ChunkSource {
        let upstream = self.upstream.create_data_source();

        let (data_source, route) = match self.intercept(request) {
            Some(handle) => {
                let mut interceptor = SegmentInterceptor::new(upstream, handle, self.interceptor);
                if let Some(detector) = &self.detector {
                    interceptor = interceptor.with_detector(detector.clone());
                }
                let data_source: Box<dyn HttpDataSource> = Box::new(interceptor);
                let route = Route::Intercepted {
                    period: request.period,
                };
                (data_source, route)
            }
            None => (upstream, Route::Plain),
        };

        ChunkSource {
            data_source,
            max_segments_per_load: MAX_SEGMENTS_PER_LOAD,
            route,
        }
    }

    fn intercept(&self, request: &ChunkRequest) -> Option<Arc<EngineHandle>> {
        if !self.classifier.is_target(&request.format) {
            return None;
        }

        tracing::debug!(
            period = request.period,
            format = ?request.format,
            "Target stream requested"
        );
        let handle = self.sessions.handle(request.period);
        if handle.is_none() {
            tracing::error!(
                period = request.period,
                "Target stream detected but no engine is available, playing it unmodified"
            );
        }
        handle
    }
}
