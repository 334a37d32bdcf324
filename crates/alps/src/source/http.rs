use async_trait::async_trait;
use bytes::{Buf, Bytes};
use futures::{stream::BoxStream, StreamExt};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, RANGE},
    StatusCode,
};
use url::Url;

use super::{DataSource, DataSourceFactory, DataSpec, HttpDataSource};
use crate::{error::AlpsError, util::http::HttpClient, AlpsResult};

struct OpenedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    pending: Bytes,
}

/// [`HttpDataSource`] streaming response bodies with `reqwest`.
pub struct ReqwestDataSource {
    client: HttpClient,
    request_properties: HeaderMap,
    uri: Option<Url>,
    response: Option<OpenedResponse>,
}

impl ReqwestDataSource {
    pub fn new(client: HttpClient) -> Self {
        Self::with_properties(client, HeaderMap::new())
    }

    pub fn with_properties(client: HttpClient, request_properties: HeaderMap) -> Self {
        Self {
            client,
            request_properties,
            uri: None,
            response: None,
        }
    }
}

#[async_trait]
impl DataSource for ReqwestDataSource {
    async fn open(&mut self, spec: &DataSpec) -> AlpsResult<Option<u64>> {
        self.response = None;
        self.uri = Some(spec.uri.clone());

        let mut request = self
            .client
            .get(spec.uri.clone())
            .headers(self.request_properties.clone())
            .headers(spec.headers.clone());
        if let Some(range) = spec.range {
            request = request.header(RANGE, range.to_http_range());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            if let Ok(body) = response.text().await {
                tracing::warn!("Error body: {body}");
            }
            return Err(AlpsError::HttpError(status));
        }

        let declared = spec
            .range
            .and_then(|range| range.bounded_length())
            .or_else(|| response.content_length());
        tracing::debug!(uri = %spec.uri, ?declared, "Opened http source");

        self.response = Some(OpenedResponse {
            status,
            headers: response.headers().clone(),
            body: response.bytes_stream().boxed(),
            pending: Bytes::new(),
        });
        Ok(declared)
    }

    async fn read(&mut self, buf: &mut [u8]) -> AlpsResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let response = self.response.as_mut().ok_or(AlpsError::SourceNotOpened)?;

        while response.pending.is_empty() {
            match response.body.next().await {
                Some(chunk) => response.pending = chunk?,
                None => return Ok(0),
            }
        }

        let len = response.pending.len().min(buf.len());
        buf[..len].copy_from_slice(&response.pending[..len]);
        response.pending.advance(len);
        Ok(len)
    }

    async fn close(&mut self) -> AlpsResult<()> {
        self.response = None;
        self.uri = None;
        Ok(())
    }

    fn uri(&self) -> Option<&Url> {
        self.uri.as_ref()
    }
}

impl HttpDataSource for ReqwestDataSource {
    fn response_code(&self) -> Option<StatusCode> {
        self.response.as_ref().map(|r| r.status)
    }

    fn response_headers(&self) -> Option<&HeaderMap> {
        self.response.as_ref().map(|r| &r.headers)
    }

    fn set_request_property(&mut self, name: &str, value: &str) -> AlpsResult<()> {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| AlpsError::InvalidRequestProperty(name.to_string()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| AlpsError::InvalidRequestProperty(format!("{name}: {value}")))?;
        self.request_properties.insert(header, value);
        Ok(())
    }

    fn clear_request_property(&mut self, name: &str) {
        self.request_properties.remove(name);
    }

    fn clear_all_request_properties(&mut self) {
        self.request_properties.clear();
    }
}

/// Creates [`ReqwestDataSource`]s sharing one client and a set of default headers.
#[derive(Clone, Default)]
pub struct ReqwestDataSourceFactory {
    client: HttpClient,
    default_properties: HeaderMap,
}

impl ReqwestDataSourceFactory {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            default_properties: HeaderMap::new(),
        }
    }

    pub fn with_default_properties(mut self, properties: HeaderMap) -> Self {
        self.default_properties = properties;
        self
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}

impl DataSourceFactory for ReqwestDataSourceFactory {
    fn create_data_source(&self) -> Box<dyn HttpDataSource> {
        Box::new(ReqwestDataSource::with_properties(
            self.client.clone(),
            self.default_properties.clone(),
        ))
    }
}
