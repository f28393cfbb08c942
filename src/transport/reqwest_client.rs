use bytes::Bytes;
use reqwest::Client;

use super::{
    HttpTransport, Transport, TransportError, TransportResponse, TransportSettings,
    ensure_crypto_provider,
};
use crate::config::{ConfigError, Settings};

pub struct ReqwestTransport {
    client: Client,
    settings: TransportSettings,
}

impl ReqwestTransport {
    pub const NAME: &'static str = "reqwest";

    pub fn new(settings: TransportSettings) -> Result<Self, ConfigError> {
        if settings.ca_cert.is_some() {
            return Err(ConfigError::UnsupportedSetting {
                transport: Self::NAME.into(),
                setting: "ca_cert".into(),
            });
        }
        ensure_crypto_provider();

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ConfigError::TransportInit {
                transport: Self::NAME.into(),
                reason: e.to_string(),
            })?;

        Ok(Self { client, settings })
    }

    /// Registry entry point.
    pub fn factory(settings: &Settings) -> Result<HttpTransport, ConfigError> {
        let settings = TransportSettings::parse(settings)?;
        Ok(HttpTransport::Reqwest(Self::new(settings)?))
    }
}

impl Transport for ReqwestTransport {
    async fn send_bulk(&self, url: &str, body: Bytes) -> Result<TransportResponse, TransportError> {
        let body = self.settings.encode_body(body)?;

        let resp = self
            .client
            .post(url)
            .headers(self.settings.headers.clone())
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        Ok(TransportResponse::new(status, text))
    }
}
