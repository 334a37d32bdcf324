use thiserror::Error;

/// Failures reported by a presentation selection engine.
///
/// The first variants mirror the status codes of the native library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Engine error: undefined")]
    Undefined,

    #[error("Engine error: invalid argument")]
    InvalidArg,

    #[error("Engine error: buffer too small")]
    BufferTooSmall,

    #[error("Engine error: parsing failed")]
    ParseFailed,

    #[error("Engine error: next segment required")]
    NextSegment,

    #[error("Engine error: no movie info")]
    NoMovieInfo,

    #[error("Engine error: presentation id not found")]
    PresentationIdNotFound,

    #[error("Engine initialization failed: {0}")]
    InitFailed(String),

    #[error("Engine handle has been released")]
    Released,
}

#[derive(Error, Debug)]
pub enum AlpsError {
    #[error("HTTP error: {0}")]
    HttpError(reqwest::StatusCode),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Data source is not opened")]
    SourceNotOpened,

    #[error("Invalid request property: {0}")]
    InvalidRequestProperty(String),

    #[error("Invalid manifest: {0}")]
    ManifestParsing(String),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error(transparent)]
    MpdParseError(#[from] dash_mpd::DashMpdError),

    #[error(transparent)]
    ConfigError(#[from] toml::de::Error),
}

pub type AlpsResult<T> = Result<T, AlpsError>;
