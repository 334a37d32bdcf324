mod http;
mod intercept;

pub use http::{ReqwestDataSource, ReqwestDataSourceFactory};
pub use intercept::SegmentInterceptor;

use async_trait::async_trait;
use reqwest::{header::HeaderMap, StatusCode};
use url::Url;

use crate::AlpsResult;

/// A contiguous range of bytes. A `length` of `None` or zero means "until the end of the
/// resource".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: Option<u64>,
}

impl ByteRange {
    pub fn new(offset: u64, length: Option<u64>) -> Self {
        Self { offset, length }
    }

    /// Length of the range, `None` when it is open-ended.
    pub fn bounded_length(&self) -> Option<u64> {
        self.length.filter(|length| *length > 0)
    }

    /// Formats the range as the value of a `Range` request header.
    pub fn to_http_range(&self) -> String {
        match self.bounded_length() {
            None => format!("bytes={}-", self.offset),
            Some(length) => format!("bytes={}-{}", self.offset, self.offset + length - 1),
        }
    }
}

/// Describes the resource a data source should open.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSpec {
    pub uri: Url,
    pub range: Option<ByteRange>,
    pub headers: HeaderMap,
}

impl DataSpec {
    pub fn new(uri: Url) -> Self {
        Self {
            uri,
            range: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }
}

/// A pull-based byte source.
#[async_trait]
pub trait DataSource: Send {
    /// Opens the resource and returns its declared length, or `None` when unknown.
    async fn open(&mut self, spec: &DataSpec) -> AlpsResult<Option<u64>>;

    /// Reads up to `buf.len()` bytes. `Ok(0)` for a non-empty `buf` is the end of input.
    async fn read(&mut self, buf: &mut [u8]) -> AlpsResult<usize>;

    async fn close(&mut self) -> AlpsResult<()>;

    fn uri(&self) -> Option<&Url>;

    /// Reads until the end of input, appending to `out`.
    async fn read_to_end(&mut self, out: &mut Vec<u8>) -> AlpsResult<usize> {
        let mut chunk = vec![0u8; 16 * 1024];
        let mut total = 0;
        loop {
            let read = self.read(&mut chunk).await?;
            if read == 0 {
                return Ok(total);
            }
            out.extend_from_slice(&chunk[..read]);
            total += read;
        }
    }
}

/// A data source talking HTTP, exposing its response metadata and request headers.
pub trait HttpDataSource: DataSource {
    fn response_code(&self) -> Option<StatusCode>;

    fn response_headers(&self) -> Option<&HeaderMap>;

    fn set_request_property(&mut self, name: &str, value: &str) -> AlpsResult<()>;

    fn clear_request_property(&mut self, name: &str);

    fn clear_all_request_properties(&mut self);
}

pub trait DataSourceFactory: Send + Sync {
    fn create_data_source(&self) -> Box<dyn HttpDataSource>;
}

impl<F> DataSourceFactory for F
where
    F: Fn() -> Box<dyn HttpDataSource> + Send + Sync,
{
    fn create_data_source(&self) -> Box<dyn HttpDataSource> {
        self()
    }
}

#[async_trait]
impl<T> DataSource for Box<T>
where
    T: DataSource + ?Sized,
{
    async fn open(&mut self, spec: &DataSpec) -> AlpsResult<Option<u64>> {
        (**self).open(spec).await
    }

    async fn read(&mut self, buf: &mut [u8]) -> AlpsResult<usize> {
        (**self).read(buf).await
    }

    async fn close(&mut self) -> AlpsResult<()> {
        (**self).close().await
    }

    fn uri(&self) -> Option<&Url> {
        (**self).uri()
    }
}

impl<T> HttpDataSource for Box<T>
where
    T: HttpDataSource + ?Sized,
{
    fn response_code(&self) -> Option<StatusCode> {
        (**self).response_code()
    }

    fn response_headers(&self) -> Option<&HeaderMap> {
        (**self).response_headers()
    }

    fn set_request_property(&mut self, name: &str, value: &str) -> AlpsResult<()> {
        (**self).set_request_property(name, value)
    }

    fn clear_request_property(&mut self, name: &str) {
        (**self).clear_request_property(name)
    }

    fn clear_all_request_properties(&mut self) {
        (**self).clear_all_request_properties()
    }
}
