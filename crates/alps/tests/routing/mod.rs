use std::sync::{atomic::Ordering, Arc};

use alps::{
    routing::MAX_SEGMENTS_PER_LOAD, AlpsConfig, ChunkRequest, ChunkRoutingFactory, DataSource,
    DataSpec, HttpDataSource, PresentationSessionManager, Route, TrackFormat, TrackKind,
};

use crate::{
    common::{
        drain, init_test_tracing, sample_presentations, segment_uri, EngineProbe,
        FakeEngineFactory, ScriptedSource,
    },
    AssertWrapper,
};

fn routing(factory: FakeEngineFactory) -> (ChunkRoutingFactory, EngineProbe) {
    let probe = factory.probe.clone();
    let config = AlpsConfig::default();
    let sessions = PresentationSessionManager::new(factory, &config.session);
    let upstream = Arc::new(|| -> Box<dyn HttpDataSource> {
        Box::new(ScriptedSource::new(vec![0x11; 64]).with_chunk(16))
    });
    (ChunkRoutingFactory::new(sessions, upstream, &config), probe)
}

fn request(period: usize, container: &str, sample: &str) -> ChunkRequest {
    ChunkRequest {
        period,
        format: TrackFormat::new(container, sample),
    }
}

#[tokio::test]
async fn test_target_stream_is_intercepted() {
    let (routing, probe) = routing(FakeEngineFactory::new(sample_presentations()));

    let mut chunk = routing.create_chunk_source(&request(1, "audio/mp4", "audio/ac4"));
    assert_eq!(chunk.route, Route::Intercepted { period: 1 });
    assert_eq!(chunk.max_segments_per_load, 1);
    assert_eq!(routing.sessions().live_periods(), vec![1]);

    chunk
        .data_source
        .open(&DataSpec::new(segment_uri("init.mp4")))
        .await
        .assert_success();
    let served = drain(&mut chunk.data_source, 10).await.assert_success();
    assert_eq!(served, vec![0xaa; 64]);
    assert_eq!(probe.processed(), 1);
}

#[tokio::test]
async fn test_other_streams_use_plain_path() {
    let (routing, probe) = routing(FakeEngineFactory::new(sample_presentations()));

    for request in [
        request(0, "video/mp4", "video/avc"),
        request(0, "audio/mp4", "audio/eac3"),
        request(0, "text/vtt", "text/vtt"),
    ] {
        let mut chunk = routing.create_chunk_source(&request);
        assert_eq!(chunk.route, Route::Plain);
        assert_eq!(chunk.max_segments_per_load, MAX_SEGMENTS_PER_LOAD);

        chunk
            .data_source
            .open(&DataSpec::new(segment_uri("1.m4s")))
            .await
            .assert_success();
        let served = drain(&mut chunk.data_source, 64).await.assert_success();
        assert_eq!(served, vec![0x11; 64]);
    }

    assert_eq!(probe.created(), 0);
    assert_eq!(probe.processed(), 0);
}

#[test]
fn test_missing_metadata_uses_plain_path() {
    init_test_tracing();
    let (routing, probe) = routing(FakeEngineFactory::new(sample_presentations()));

    let chunk = routing.create_chunk_source(&ChunkRequest {
        period: 0,
        format: TrackFormat {
            container_mime: Some("audio/mp4".to_string()),
            sample_mime: None,
            kind: Some(TrackKind::Audio),
        },
    });
    assert_eq!(chunk.route, Route::Plain);
    assert_eq!(probe.created(), 0);
}

#[test]
fn test_engine_failure_uses_plain_path() {
    init_test_tracing();
    let factory = FakeEngineFactory::new(sample_presentations());
    factory.fail_creation.store(true, Ordering::SeqCst);
    let (routing, _) = routing(factory);

    let chunk = routing.create_chunk_source(&request(0, "audio/mp4", "audio/ac4"));
    assert_eq!(chunk.route, Route::Plain);
    assert!(routing.sessions().live_periods().is_empty());
}

#[test]
fn test_periods_share_session_handles() {
    let (routing, probe) = routing(FakeEngineFactory::new(sample_presentations()));

    for period in [0, 0, 1, 1, 1] {
        let chunk = routing.create_chunk_source(&request(period, "audio/mp4", "audio/ac4"));
        assert_eq!(chunk.route, Route::Intercepted { period });
    }
    assert_eq!(probe.created(), 2);
}
