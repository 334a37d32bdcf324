//! Presentation selection for multi-presentation audio streams.
//!
//! ```text
//! ┌──────────────────┐   ChunkRequest   ┌─────────────────────┐
//! │                  ├─────────────────►│                     │
//! │  Chunk loader    │                  │ ChunkRoutingFactory ├──► Plain data source
//! │  (player)        │◄─────────────────┤                     │    (video, other audio)
//! │                  │   ChunkSource    └──────────┬──────────┘
//! └──────────────────┘                             │ target stream
//!                                                  ▼
//!                      ┌──────────────────────────────────────────────┐
//!                      │ SegmentInterceptor                           │
//!                      │                                              │
//!                      │  open ──► declared length                    │
//!                      │  read#1 ──► drain upstream ──► EngineHandle  │
//!                      │  read#N ──► serve processed buffer           │
//!                      └───────────────────────┬──────────────────────┘
//!                                              │ Arc<EngineHandle>
//!                      ┌───────────────────────┴──────────────────────┐
//!                      │ PresentationSessionManager                   │
//!                      │                                              │
//!                      │  period 0 ──► EngineHandle ──► Engine        │
//!                      │  period 1 ──► EngineHandle ──► Engine        │
//!                      │  preferred presentation, current period      │
//!                      └──────────────────────────────────────────────┘
//! ```

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod presentation;
pub mod routing;
pub mod session;
pub mod source;
mod util;

pub use classify::{
    FormatClassifier, ManifestClassifier, SourceDetector, TargetStream, TrackFormat, TrackKind,
};
pub use config::AlpsConfig;
pub use engine::{Engine, EngineFactory, EngineHandle, HandleEvent, PeriodIndex};
pub use error::{AlpsError, AlpsResult, EngineError};
pub use manifest::ManifestSnapshot;
pub use presentation::{Presentation, PresentationEntry, PresentationId};
pub use routing::{ChunkRequest, ChunkRoutingFactory, ChunkSource, Route};
pub use session::{PlayerEvent, PresentationSessionManager, PropagationReport};
pub use source::{
    ByteRange, DataSource, DataSourceFactory, DataSpec, HttpDataSource, ReqwestDataSource,
    ReqwestDataSourceFactory, SegmentInterceptor,
};
pub use util::http::HttpClient;
