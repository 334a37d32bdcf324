use std::sync::{atomic::Ordering, Arc};

use alps::{
    config::InterceptorConfig, AlpsError, DataSource, DataSpec, EngineHandle, HttpDataSource,
    PresentationSessionManager, SegmentInterceptor, SourceDetector,
};
use url::Url;

use crate::{
    common::{
        drain, init_test_tracing, sample_presentations, segment_uri, EngineProbe, FakeEngine,
        ScriptedSource,
    },
    AssertWrapper,
};

fn handle(probe: &EngineProbe) -> Arc<EngineHandle> {
    let engine = FakeEngine::new(sample_presentations(), probe.clone());
    Arc::new(EngineHandle::new(0, Box::new(engine)))
}

fn failing_handle(probe: &EngineProbe) -> Arc<EngineHandle> {
    let engine = FakeEngine::new(sample_presentations(), probe.clone()).failing_processing();
    Arc::new(EngineHandle::new(0, Box::new(engine)))
}

fn spec() -> DataSpec {
    DataSpec::new(segment_uri("segment_1.m4s"))
}

#[tokio::test]
async fn test_two_upstream_reads_fill_one_segment() {
    init_test_tracing();
    let probe = EngineProbe::default();
    let upstream = ScriptedSource::new(vec![7u8; 100]).with_chunk(50);
    let reads = upstream.reads();
    let mut source = SegmentInterceptor::new(upstream, handle(&probe), Default::default());

    let declared = source.open(&spec()).await.assert_success();
    assert_eq!(declared, Some(100));
    assert_eq!(probe.processed(), 0);

    let mut buf = [0u8; 30];
    assert_eq!(source.read(&mut buf).await.assert_success(), 30);
    assert_eq!(reads.load(Ordering::SeqCst), 2);
    assert_eq!(probe.processed(), 1);
    assert!(buf.iter().all(|b| *b == 0xaa));

    let rest = drain(&mut source, 30).await.assert_success();
    assert_eq!(rest.len(), 70);
    assert_eq!(source.read(&mut buf).await.assert_success(), 0);
    assert_eq!(probe.processed(), 1);
    assert_eq!(reads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_served_bytes_match_declared_length() {
    for len in [0usize, 1, 7, 100, 4096, 10_000] {
        for step in [1usize, 3, 1024] {
            let probe = EngineProbe::default();
            let upstream = ScriptedSource::new(vec![1u8; len]).with_chunk(333);
            let mut source = SegmentInterceptor::new(upstream, handle(&probe), Default::default());

            source.open(&spec()).await.assert_success();
            let served = drain(&mut source, step).await.assert_success();
            assert_eq!(served.len(), len, "len {len}, step {step}");
            assert_eq!(probe.processed(), usize::from(len > 0));
        }
    }
}

#[tokio::test]
async fn test_empty_read_does_nothing() {
    let probe = EngineProbe::default();
    let upstream = ScriptedSource::new(vec![1u8; 64]);
    let reads = upstream.reads();
    let mut source = SegmentInterceptor::new(upstream, handle(&probe), Default::default());

    assert_eq!(source.read(&mut [0u8; 0]).await.assert_success(), 0);
    source.open(&spec()).await.assert_success();
    assert_eq!(source.read(&mut [0u8; 0]).await.assert_success(), 0);

    assert_eq!(reads.load(Ordering::SeqCst), 0);
    assert_eq!(probe.processed(), 0);
}

#[tokio::test]
async fn test_engine_failure_serves_original_bytes() {
    init_test_tracing();
    let probe = EngineProbe::default();
    let original: Vec<u8> = (0..=255).collect();
    let upstream = ScriptedSource::new(original.clone()).with_chunk(100);
    let mut source = SegmentInterceptor::new(upstream, failing_handle(&probe), Default::default());

    source.open(&spec()).await.assert_success();
    let served = drain(&mut source, 64).await.assert_success();

    assert_eq!(probe.processed(), 1);
    assert_eq!(served, original);
}

#[tokio::test]
async fn test_reopen_processes_again() {
    let probe = EngineProbe::default();
    let upstream = ScriptedSource::new(vec![5u8; 10]);
    let opens = upstream.opens();
    let mut source = SegmentInterceptor::new(upstream, handle(&probe), Default::default());

    source.open(&spec()).await.assert_success();
    let mut buf = [0u8; 4];
    source.read(&mut buf).await.assert_success();

    // the second cycle starts from a fresh buffer, even though the first one was not drained
    source.open(&spec()).await.assert_success();
    let served = drain(&mut source, 4).await.assert_success();
    assert_eq!(served.len(), 10);
    assert_eq!(probe.processed(), 2);
    assert_eq!(opens.load(Ordering::SeqCst), 2);

    source.close().await.assert_success();
    source.read(&mut buf).await.assert_error();
}

#[tokio::test]
async fn test_unknown_length_passes_through() {
    let probe = EngineProbe::default();
    let upstream = ScriptedSource::new(vec![9u8; 20]).with_declared(None);
    let mut source = SegmentInterceptor::new(upstream, handle(&probe), Default::default());

    assert_eq!(source.open(&spec()).await.assert_success(), None);
    let served = drain(&mut source, 8).await.assert_success();

    assert_eq!(served, vec![9u8; 20]);
    assert_eq!(probe.processed(), 0);
}

#[tokio::test]
async fn test_oversized_segment_passes_through() {
    let probe = EngineProbe::default();
    let upstream = ScriptedSource::new(vec![9u8; 20]);
    let config = InterceptorConfig {
        max_segment_bytes: 16,
    };
    let mut source = SegmentInterceptor::new(upstream, handle(&probe), config);

    assert_eq!(source.open(&spec()).await.assert_success(), Some(20));
    let served = drain(&mut source, 8).await.assert_success();

    assert_eq!(served, vec![9u8; 20]);
    assert_eq!(probe.processed(), 0);
}

#[tokio::test]
async fn test_truncated_upstream_is_served_unmodified() {
    let probe = EngineProbe::default();
    let upstream = ScriptedSource::new(vec![3u8; 60])
        .with_declared(Some(100))
        .with_chunk(25);
    let mut source = SegmentInterceptor::new(upstream, handle(&probe), Default::default());

    source.open(&spec()).await.assert_success();
    let served = drain(&mut source, 50).await.assert_success();

    assert_eq!(served, vec![3u8; 60]);
    assert_eq!(probe.processed(), 0);
}

#[tokio::test]
async fn test_released_handle_serves_unmodified() {
    let sessions = PresentationSessionManager::new(
        crate::common::FakeEngineFactory::new(sample_presentations()),
        &Default::default(),
    );
    let handle = sessions.handle(0).assert_success();
    let upstream = ScriptedSource::new(vec![4u8; 32]);
    let mut source = SegmentInterceptor::new(upstream, handle, Default::default());

    sessions.set_current_period(1);
    source.open(&spec()).await.assert_success();
    let served = drain(&mut source, 32).await.assert_success();

    assert!(source.handle().is_released());
    assert_eq!(served, vec![4u8; 32]);
}

#[tokio::test]
async fn test_read_before_open() {
    let probe = EngineProbe::default();
    let upstream = ScriptedSource::new(vec![1u8; 8]);
    let mut source = SegmentInterceptor::new(upstream, handle(&probe), Default::default());

    let mut buf = [0u8; 8];
    let result = source.read(&mut buf).await;
    assert!(matches!(result, Err(AlpsError::SourceNotOpened)));
}

struct CountingDetector {
    verdict: bool,
    calls: std::sync::atomic::AtomicUsize,
}

impl SourceDetector for CountingDetector {
    fn is_target(&self, _uri: &Url) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict
    }
}

#[tokio::test]
async fn test_detector_is_consulted_on_first_open_only() {
    let probe = EngineProbe::default();
    let detector = Arc::new(CountingDetector {
        verdict: false,
        calls: Default::default(),
    });
    let upstream = ScriptedSource::new(vec![2u8; 16]);
    let mut source = SegmentInterceptor::new(upstream, handle(&probe), Default::default())
        .with_detector(detector.clone());

    for _ in 0..3 {
        source.open(&spec()).await.assert_success();
        let served = drain(&mut source, 16).await.assert_success();
        assert_eq!(served, vec![2u8; 16]);
        source.close().await.assert_success();
    }

    assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(probe.processed(), 0);
}

#[tokio::test]
async fn test_detected_target_is_processed() {
    let probe = EngineProbe::default();
    let detector = Arc::new(CountingDetector {
        verdict: true,
        calls: Default::default(),
    });
    let upstream = ScriptedSource::new(vec![2u8; 16]);
    let mut source = SegmentInterceptor::new(upstream, handle(&probe), Default::default())
        .with_detector(detector.clone());

    for _ in 0..2 {
        source.open(&spec()).await.assert_success();
        let served = drain(&mut source, 16).await.assert_success();
        assert_eq!(served, vec![0xaa; 16]);
    }

    assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(probe.processed(), 2);
}

#[tokio::test]
async fn test_http_accessors_are_forwarded() {
    let probe = EngineProbe::default();
    let upstream = ScriptedSource::new(vec![1u8; 4]);
    let mut source = SegmentInterceptor::new(upstream, handle(&probe), Default::default());

    assert!(source.uri().is_none());
    assert!(source.response_code().is_none());
    source.set_request_property("Referer", "https://example.com").assert_success();
    source.set_request_property("X-Temp", "1").assert_success();
    source.clear_request_property("X-Temp");
    source.set_request_property("bad header", "1").assert_error();

    source.open(&spec()).await.assert_success();
    assert_eq!(source.uri(), Some(&segment_uri("segment_1.m4s")));
    assert_eq!(source.response_code(), Some(reqwest::StatusCode::OK));
    assert_eq!(
        source.response_headers().and_then(|h| h.get("x-served-by")),
        Some(&reqwest::header::HeaderValue::from_static("scripted"))
    );

    let upstream = source.into_inner();
    assert_eq!(upstream.property("referer"), Some("https://example.com"));
    assert_eq!(upstream.property("x-temp"), None);
}
