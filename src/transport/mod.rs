use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use flate2::write::GzEncoder;
use hyper::StatusCode;
use hyper::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::{
    Compression, ConfigError, Settings, parse_compression, parse_duration_ms, parse_headers,
};

mod hyper_client;
mod registry;
mod reqwest_client;

pub use hyper_client::HyperTransport;
pub use registry::{TransportFactory, TransportRegistry};
pub use reqwest_client::ReqwestTransport;

const NDJSON: &str = "application/x-ndjson";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("HTTP request failed: {0}")]
    Hyper(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read response body: {0}")]
    Body(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("gzip compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

/// Status and body of one bulk request. An empty body reads as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Option<String>,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            status,
            body: (!body.is_empty()).then_some(body),
        }
    }
}

/// Sends one bulk body to one URL.
///
/// Implementations own their timeout; callers never wrap the future in one.
pub trait Transport: Send + Sync {
    fn send_bulk(
        &self,
        url: &str,
        body: Bytes,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;

    /// Release held resources. Called at most once per client.
    fn close(&self) {}
}

/// The transports shipped with the crate, selected by name at setup.
pub enum HttpTransport {
    Reqwest(ReqwestTransport),
    Hyper(HyperTransport),
}

impl Transport for HttpTransport {
    async fn send_bulk(&self, url: &str, body: Bytes) -> Result<TransportResponse, TransportError> {
        match self {
            Self::Reqwest(t) => t.send_bulk(url, body).await,
            Self::Hyper(t) => t.send_bulk(url, body).await,
        }
    }

    fn close(&self) {
        match self {
            Self::Reqwest(t) => t.close(),
            Self::Hyper(t) => t.close(),
        }
    }
}

/// Settings shared by the built-in transports, read from the `transport.*` subtree.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub timeout: Duration,
    pub compression: Compression,
    pub headers: HeaderMap,
    pub ca_cert: Option<PathBuf>,
}

impl TransportSettings {
    pub fn parse(settings: &Settings) -> Result<Self, ConfigError> {
        let timeout = parse_duration_ms(settings, "timeout_ms", 5000)?;
        let compression = parse_compression(settings)?;
        let ca_cert = settings.get("ca_cert").map(PathBuf::from);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(NDJSON));
        if compression == Compression::Gzip {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        }
        if let Some(auth) = basic_auth(settings)? {
            headers.insert(AUTHORIZATION, auth);
        }
        for (k, v) in parse_headers(settings) {
            let invalid = || ConfigError::InvalidValue("headers".into(), format!("{k}={v}"));
            let name = HeaderName::from_bytes(k.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(&v).map_err(|_| invalid())?;
            headers.insert(name, value);
        }

        Ok(Self {
            timeout,
            compression,
            headers,
            ca_cert,
        })
    }

    fn encode_body(&self, body: Bytes) -> Result<Bytes, TransportError> {
        match self.compression {
            Compression::Gzip => Ok(Bytes::from(compress_gzip(&body)?)),
            Compression::None => Ok(body),
        }
    }
}

fn basic_auth(settings: &Settings) -> Result<Option<HeaderValue>, ConfigError> {
    let (user, password) = match (settings.get("username"), settings.get("password")) {
        (None, None) => return Ok(None),
        (None, Some(_)) => {
            return Err(ConfigError::InvalidValue(
                "password".into(),
                "set without username".into(),
            ));
        }
        (Some(user), password) => (user, password.unwrap_or_default()),
    };
    let token = BASE64.encode(format!("{user}:{password}"));
    let mut value = HeaderValue::from_str(&format!("Basic {token}"))
        .map_err(|_| ConfigError::InvalidValue("username".into(), user.to_owned()))?;
    value.set_sensitive(true);
    Ok(Some(value))
}

fn compress_gzip(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(data)?;
    encoder.finish()
}

/// reqwest is built without a bundled crypto provider, so install ring once per process.
fn ensure_crypto_provider() {
    // Err only means a provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();
}
