use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use rustls::{ClientConfig, RootCertStore};

use super::{HttpTransport, Transport, TransportError, TransportResponse, TransportSettings};
use crate::config::{ConfigError, Settings};

type HttpsClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// hyper-util pooled client over rustls, trusting the webpki roots plus an optional CA file.
pub struct HyperTransport {
    client: HttpsClient,
    settings: TransportSettings,
}

impl HyperTransport {
    pub const NAME: &'static str = "hyper";

    pub fn new(settings: TransportSettings) -> Result<Self, ConfigError> {
        let tls = tls_config(settings.ca_cert.as_deref())?;
        let https = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(https);

        Ok(Self { client, settings })
    }

    /// Registry entry point.
    pub fn factory(settings: &Settings) -> Result<HttpTransport, ConfigError> {
        let settings = TransportSettings::parse(settings)?;
        Ok(HttpTransport::Hyper(Self::new(settings)?))
    }
}

impl Transport for HyperTransport {
    async fn send_bulk(&self, url: &str, body: Bytes) -> Result<TransportResponse, TransportError> {
        let body = self.settings.encode_body(body)?;

        let mut builder = Request::post(url);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.settings.headers.clone());
        }
        let req = builder.body(Full::new(body))?;

        let exchange = async {
            let resp = self.client.request(req).await?;
            let status = resp.status();
            let bytes = resp.into_body().collect().await?.to_bytes();
            Ok::<_, TransportError>(TransportResponse::new(
                status,
                String::from_utf8_lossy(&bytes),
            ))
        };

        tokio::time::timeout(self.settings.timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout(self.settings.timeout))?
    }
}

fn tls_config(ca_cert: Option<&Path>) -> Result<ClientConfig, ConfigError> {
    let init_err = |reason: String| ConfigError::TransportInit {
        transport: HyperTransport::NAME.into(),
        reason,
    };

    let mut roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.into(),
    };

    if let Some(path) = ca_cert {
        let file = File::open(path)
            .map_err(|e| init_err(format!("cannot open {}: {e}", path.display())))?;
        let mut added = 0;
        for cert in rustls_pemfile::certs(&mut BufReader::new(file)) {
            let cert = cert.map_err(|e| init_err(format!("invalid PEM in {}: {e}", path.display())))?;
            roots
                .add(cert)
                .map_err(|e| init_err(format!("rejected certificate in {}: {e}", path.display())))?;
            added += 1;
        }
        if added == 0 {
            return Err(init_err(format!("no certificates found in {}", path.display())));
        }
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| init_err(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}
