use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use alps::{
    engine::{EngineResult, PresentationsChangedCallback},
    AlpsError, AlpsResult, DataSource, DataSpec, Engine, EngineError, EngineFactory,
    HttpDataSource, Presentation, PresentationId,
};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    StatusCode,
};
use url::Url;

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn segment_uri(name: &str) -> Url {
    Url::parse(&format!("https://cdn.example.com/ac4/{name}")).unwrap()
}

/// Counters shared between a test and the engines it creates.
#[derive(Clone, Default)]
pub struct EngineProbe {
    pub created: Arc<AtomicUsize>,
    pub processed: Arc<AtomicUsize>,
    pub dropped: Arc<AtomicUsize>,
}

impl EngineProbe {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// Engine discovering `presentations` in the first segment it processes.
///
/// Processing adds one to every byte so that tests can tell processed data apart.
pub struct FakeEngine {
    discovered: Vec<Presentation>,
    presentations: Vec<Presentation>,
    active: PresentationId,
    callback: Option<PresentationsChangedCallback>,
    fail_processing: bool,
    fail_selection: bool,
    probe: EngineProbe,
}

impl FakeEngine {
    pub fn new(presentations: Vec<Presentation>, probe: EngineProbe) -> Self {
        Self {
            discovered: presentations,
            presentations: Vec::new(),
            active: PresentationId::DEVICE_DEFAULT,
            callback: None,
            fail_processing: false,
            fail_selection: false,
            probe,
        }
    }

    pub fn failing_processing(mut self) -> Self {
        self.fail_processing = true;
        self
    }

    pub fn failing_selection(mut self) -> Self {
        self.fail_selection = true;
        self
    }
}

impl Engine for FakeEngine {
    fn process_segment(&mut self, segment: &mut [u8]) -> EngineResult<()> {
        self.probe.processed.fetch_add(1, Ordering::SeqCst);
        // a failing engine may leave garbage behind
        segment.iter_mut().for_each(|b| *b = 0xee);
        if self.fail_processing {
            return Err(EngineError::ParseFailed);
        }

        segment.iter_mut().for_each(|b| *b = 0xaa);
        if self.presentations != self.discovered {
            self.presentations = self.discovered.clone();
            if let Some(callback) = &self.callback {
                callback();
            }
        }
        Ok(())
    }

    fn presentations(&self) -> EngineResult<Vec<Presentation>> {
        Ok(self.presentations.clone())
    }

    fn active_presentation_id(&self) -> EngineResult<PresentationId> {
        Ok(self.active)
    }

    fn set_active_presentation_id(&mut self, id: PresentationId) -> EngineResult<()> {
        if self.fail_selection {
            return Err(EngineError::Undefined);
        }
        if !id.is_device_default() && !self.presentations.iter().any(|p| p.id == id) {
            return Err(EngineError::PresentationIdNotFound);
        }
        self.active = id;
        Ok(())
    }

    fn set_presentations_changed_callback(&mut self, callback: PresentationsChangedCallback) {
        self.callback = Some(callback);
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        self.probe.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn sample_presentations() -> Vec<Presentation> {
    vec![
        Presentation::new(1, "English", "en"),
        Presentation::new(2, "Dialog Enhancement", "en"),
        Presentation::new(3, "Commentary", "de"),
    ]
}

/// Creates [`FakeEngine`]s, optionally refusing to.
pub struct FakeEngineFactory {
    pub probe: EngineProbe,
    pub presentations: Vec<Presentation>,
    pub fail_creation: AtomicBool,
    pub fail_processing: bool,
    pub fail_selection: bool,
}

impl FakeEngineFactory {
    pub fn new(presentations: Vec<Presentation>) -> Self {
        Self {
            probe: EngineProbe::default(),
            presentations,
            fail_creation: AtomicBool::new(false),
            fail_processing: false,
            fail_selection: false,
        }
    }
}

impl EngineFactory for FakeEngineFactory {
    fn create(&self) -> EngineResult<Box<dyn Engine>> {
        if self.fail_creation.load(Ordering::SeqCst) {
            return Err(EngineError::InitFailed("refused by test".to_string()));
        }
        self.probe.created.fetch_add(1, Ordering::SeqCst);

        let mut engine = FakeEngine::new(self.presentations.clone(), self.probe.clone());
        if self.fail_processing {
            engine = engine.failing_processing();
        }
        if self.fail_selection {
            engine = engine.failing_selection();
        }
        Ok(Box::new(engine))
    }
}

/// Upstream source returning `data` in chunks of at most `chunk` bytes.
pub struct ScriptedSource {
    data: Vec<u8>,
    declared: Option<u64>,
    chunk: usize,
    cursor: usize,
    uri: Option<Url>,
    properties: HeaderMap,
    response_headers: HeaderMap,
    pub opens: Arc<AtomicUsize>,
    pub reads: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(data: Vec<u8>) -> Self {
        let declared = Some(data.len() as u64);
        Self {
            data,
            declared,
            chunk: usize::MAX,
            cursor: 0,
            uri: None,
            properties: HeaderMap::new(),
            response_headers: HeaderMap::from_iter([(
                HeaderName::from_static("x-served-by"),
                HeaderValue::from_static("scripted"),
            )]),
            opens: Arc::new(AtomicUsize::new(0)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_declared(mut self, declared: Option<u64>) -> Self {
        self.declared = declared;
        self
    }

    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn reads(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }

    pub fn opens(&self) -> Arc<AtomicUsize> {
        self.opens.clone()
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    async fn open(&mut self, spec: &DataSpec) -> AlpsResult<Option<u64>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.cursor = 0;
        self.uri = Some(spec.uri.clone());
        Ok(self.declared)
    }

    async fn read(&mut self, buf: &mut [u8]) -> AlpsResult<usize> {
        if self.uri.is_none() {
            return Err(AlpsError::SourceNotOpened);
        }
        self.reads.fetch_add(1, Ordering::SeqCst);

        let remaining = &self.data[self.cursor..];
        let len = remaining.len().min(buf.len()).min(self.chunk);
        buf[..len].copy_from_slice(&remaining[..len]);
        self.cursor += len;
        Ok(len)
    }

    async fn close(&mut self) -> AlpsResult<()> {
        self.uri = None;
        Ok(())
    }

    fn uri(&self) -> Option<&Url> {
        self.uri.as_ref()
    }
}

impl HttpDataSource for ScriptedSource {
    fn response_code(&self) -> Option<StatusCode> {
        self.uri.as_ref().map(|_| StatusCode::OK)
    }

    fn response_headers(&self) -> Option<&HeaderMap> {
        self.uri.as_ref().map(|_| &self.response_headers)
    }

    fn set_request_property(&mut self, name: &str, value: &str) -> AlpsResult<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| AlpsError::InvalidRequestProperty(name.to_string()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| AlpsError::InvalidRequestProperty(value.to_string()))?;
        self.properties.insert(name, value);
        Ok(())
    }

    fn clear_request_property(&mut self, name: &str) {
        self.properties.remove(name);
    }

    fn clear_all_request_properties(&mut self) {
        self.properties.clear();
    }
}

/// Reads until end of input with reads of at most `step` bytes.
pub async fn drain<S>(source: &mut S, step: usize) -> AlpsResult<Vec<u8>>
where
    S: DataSource,
{
    let mut out = Vec::new();
    let mut buf = vec![0u8; step];
    loop {
        let read = source.read(&mut buf).await?;
        if read == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..read]);
    }
}
