use std::{ops::Deref, sync::Arc};

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, ClientBuilder, IntoUrl,
};
use reqwest_cookie_store::{CookieStore, CookieStoreMutex};

use crate::{config::HttpConfig, error::AlpsError, AlpsResult};

/// Cookie-aware HTTP client shared by every data source of a session.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    cookies_store: Arc<CookieStoreMutex>,
}

impl HttpClient {
    pub fn new(builder: ClientBuilder) -> AlpsResult<Self> {
        let cookies_store = Arc::new(CookieStoreMutex::new(CookieStore::default()));
        let client = builder.cookie_provider(cookies_store.clone()).build()?;

        Ok(Self {
            client,
            cookies_store,
        })
    }

    pub fn from_config(config: &HttpConfig) -> AlpsResult<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout())
            .default_headers(parse_headers(&config.headers)?);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent);
        }
        Self::new(builder)
    }

    pub fn add_cookies(&self, cookies: Vec<String>, url: impl IntoUrl) -> AlpsResult<()> {
        let url = url.into_url()?;
        let mut lock = self
            .cookies_store
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for cookie in cookies {
            if let Err(e) = lock.parse(&cookie, &url) {
                tracing::warn!("Ignoring invalid cookie {cookie}: {e}");
            }
        }
        Ok(())
    }
}

/// Parses `Name: value` header lines.
pub fn parse_headers<S>(headers: &[S]) -> AlpsResult<HeaderMap>
where
    S: AsRef<str>,
{
    let mut map = HeaderMap::new();
    for header in headers {
        let header = header.as_ref();
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| AlpsError::InvalidRequestProperty(header.to_string()))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| AlpsError::InvalidRequestProperty(header.to_string()))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|_| AlpsError::InvalidRequestProperty(header.to_string()))?;
        map.append(name, value);
    }
    Ok(map)
}

impl Default for HttpClient {
    fn default() -> Self {
        let cookies_store = Arc::new(CookieStoreMutex::new(CookieStore::default()));
        let client = Client::builder()
            .cookie_provider(cookies_store.clone())
            .build()
            .unwrap_or_default();

        Self {
            client,
            cookies_store,
        }
    }
}

impl Deref for HttpClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}
