use std::{mem, sync::Arc};

use async_trait::async_trait;
use reqwest::{header::HeaderMap, StatusCode};
use url::Url;

use super::{DataSource, DataSpec, HttpDataSource};
use crate::{
    classify::SourceDetector, config::InterceptorConfig, engine::EngineHandle, error::AlpsError,
    AlpsResult,
};

/// Bytes of one segment, as they will be served to the reader.
///
/// Holds either the engine output or the original bytes when processing was skipped.
struct SegmentBuffer {
    data: Vec<u8>,
    cursor: usize,
}

impl SegmentBuffer {
    fn serve(&mut self, buf: &mut [u8]) -> usize {
        let remaining = &self.data[self.cursor..];
        let len = remaining.len().min(buf.len());
        buf[..len].copy_from_slice(&remaining[..len]);
        self.cursor += len;
        len
    }
}

enum State {
    Idle,
    /// Reads go straight to the upstream source.
    PassThrough,
    Opened {
        declared: usize,
    },
    Loaded(SegmentBuffer),
}

/// Turns a streaming [`HttpDataSource`] into the whole-segment contract of the engine.
///
/// `open` only learns the declared length of the segment. The first `read` afterwards
/// drains the upstream source until the whole segment is buffered, hands it to the
/// [`EngineHandle`] and then serves the processed bytes. That first read therefore
/// suspends the calling task for the download time of a full segment, which adds latency
/// to every intercepted segment. Callers can wrap it with `tokio::time::timeout` if needed.
///
/// Engine failures never reach the reader: the unmodified segment is served instead.
pub struct SegmentInterceptor<S> {
    upstream: S,
    handle: Arc<EngineHandle>,
    config: InterceptorConfig,
    detector: Option<Arc<dyn SourceDetector>>,
    is_target: Option<bool>,
    state: State,
}

impl<S> SegmentInterceptor<S>
where
    S: HttpDataSource,
{
    pub fn new(upstream: S, handle: Arc<EngineHandle>, config: InterceptorConfig) -> Self {
        Self {
            upstream,
            handle,
            config,
            detector: None,
            is_target: None,
            state: State::Idle,
        }
    }

    /// Lets `detector` decide, on the first `open`, whether this source carries the target
    /// stream at all. When it does not, every later open and read passes through.
    pub fn with_detector(mut self, detector: Arc<dyn SourceDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn handle(&self) -> &Arc<EngineHandle> {
        &self.handle
    }

    pub fn into_inner(self) -> S {
        self.upstream
    }

    fn detect(&mut self, uri: &Url) -> bool {
        if let Some(is_target) = self.is_target {
            return is_target;
        }
        let Some(detector) = &self.detector else {
            return true;
        };

        let is_target = detector.is_target(uri);
        tracing::debug!(%uri, is_target, "Detected source stream");
        self.is_target = Some(is_target);
        is_target
    }

    async fn load(&mut self, declared: usize) -> AlpsResult<SegmentBuffer> {
        let mut data = vec![0u8; declared];
        let mut loaded = 0;
        while loaded < declared {
            let read = self.upstream.read(&mut data[loaded..]).await?;
            if read == 0 {
                break;
            }
            loaded += read;
        }

        let period = self.handle.period();
        if loaded < declared {
            tracing::warn!(
                period,
                len = declared,
                loaded,
                "Upstream ended before the declared length, serving partial segment unmodified"
            );
            data.truncate(loaded);
        } else if declared > 0 {
            match self.handle.process_segment(&mut data) {
                Ok(()) => tracing::debug!(period, len = declared, "Segment processed"),
                Err(e) => tracing::error!(
                    period,
                    len = declared,
                    "Failed to process segment, serving it unmodified: {e}"
                ),
            }
        }

        Ok(SegmentBuffer { data, cursor: 0 })
    }
}

#[async_trait]
impl<S> DataSource for SegmentInterceptor<S>
where
    S: HttpDataSource,
{
    async fn open(&mut self, spec: &DataSpec) -> AlpsResult<Option<u64>> {
        self.state = State::Idle;
        let declared = self.upstream.open(spec).await?;

        if !self.detect(&spec.uri) {
            self.state = State::PassThrough;
            return Ok(declared);
        }

        self.state = match declared.map(usize::try_from) {
            Some(Ok(len)) if len as u64 <= self.config.max_segment_bytes => {
                State::Opened { declared: len }
            }
            Some(_) => {
                tracing::warn!(
                    uri = %spec.uri,
                    len = declared,
                    "Segment too large to be buffered, passing through"
                );
                State::PassThrough
            }
            None => {
                tracing::warn!(uri = %spec.uri, "Segment length unknown, passing through");
                State::PassThrough
            }
        };
        Ok(declared)
    }

    async fn read(&mut self, buf: &mut [u8]) -> AlpsResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        match mem::replace(&mut self.state, State::Idle) {
            State::Idle => Err(AlpsError::SourceNotOpened),
            State::PassThrough => {
                self.state = State::PassThrough;
                self.upstream.read(buf).await
            }
            State::Opened { declared } => {
                let mut segment = self.load(declared).await?;
                let read = segment.serve(buf);
                self.state = State::Loaded(segment);
                Ok(read)
            }
            State::Loaded(mut segment) => {
                let read = segment.serve(buf);
                self.state = State::Loaded(segment);
                Ok(read)
            }
        }
    }

    async fn close(&mut self) -> AlpsResult<()> {
        self.state = State::Idle;
        self.upstream.close().await
    }

    fn uri(&self) -> Option<&Url> {
        self.upstream.uri()
    }
}

impl<S> HttpDataSource for SegmentInterceptor<S>
where
    S: HttpDataSource,
{
    fn response_code(&self) -> Option<StatusCode> {
        self.upstream.response_code()
    }

    fn response_headers(&self) -> Option<&HeaderMap> {
        self.upstream.response_headers()
    }

    fn set_request_property(&mut self, name: &str, value: &str) -> AlpsResult<()> {
        self.upstream.set_request_property(name, value)
    }

    fn clear_request_property(&mut self, name: &str) {
        self.upstream.clear_request_property(name)
    }

    fn clear_all_request_properties(&mut self) {
        self.upstream.clear_all_request_properties()
    }
}
