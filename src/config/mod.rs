use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::index_name::IndexNamerKind;
use crate::rotation::Endpoint;
use crate::serializer::SerializerKind;

/// Environment prefix read by the relay binary.
pub const ENV_PREFIX: &str = "ES_BULK_RELAY_";

/// Key prefix whose entries are handed, prefix stripped, to the transport factory.
pub const TRANSPORT_PREFIX: &str = "transport.";

pub const DEFAULT_TRANSPORT: &str = "reqwest";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one endpoint is required")]
    NoEndpoints,

    #[error("endpoint is not a valid URL: {0}")]
    InvalidEndpoint(String),

    #[error("unknown transport: {0}")]
    UnknownTransport(String),

    #[error("transport {transport} could not be initialised: {reason}")]
    TransportInit { transport: String, reason: String },

    #[error("transport {transport} does not support setting {setting}")]
    UnsupportedSetting { transport: String, setting: String },

    #[error("{0} has invalid value: {1}")]
    InvalidValue(String, String),

    #[error("unknown serializer: {0} (expected \"dynamic\" or \"logstash\")")]
    UnknownSerializer(String),

    #[error("unknown index name builder: {0} (expected \"static\" or \"time_based\")")]
    UnknownIndexNamer(String),
}

/// Flat string settings handed in by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect `<prefix>*` environment variables. Keys lose the prefix, are
    /// lower-cased, and `__` becomes `.`, so `ES_BULK_RELAY_TRANSPORT__TIMEOUT_MS`
    /// reads as `transport.timeout_ms`.
    pub fn from_env(prefix: &str) -> Self {
        Self::from_vars(env::vars(), prefix)
    }

    fn from_vars(vars: impl IntoIterator<Item = (String, String)>, prefix: &str) -> Self {
        vars.into_iter()
            .filter_map(|(k, v)| {
                let key = k.strip_prefix(prefix)?;
                Some((key.to_lowercase().replace("__", "."), v))
            })
            .collect()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Value for `key`; blank values read as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Entries under `prefix`, with the prefix removed.
    pub fn sub_settings(&self, prefix: &str) -> Settings {
        self.values
            .iter()
            .filter_map(|(k, v)| Some((k.strip_prefix(prefix)?.to_owned(), v.clone())))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, String)> for Settings {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Settings {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect()
    }
}

/// What the bulk client needs at setup: endpoints and the transport to build.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoints: Vec<Endpoint>,
    pub transport: String,
    pub transport_settings: Settings,
}

impl ClientConfig {
    pub fn parse(settings: &Settings) -> Result<Self, ConfigError> {
        let endpoints = parse_endpoints(settings.get("hosts").unwrap_or_default())?;
        let transport = settings
            .get("transport")
            .unwrap_or(DEFAULT_TRANSPORT)
            .to_owned();
        let transport_settings = settings.sub_settings(TRANSPORT_PREFIX);

        Ok(Self {
            endpoints,
            transport,
            transport_settings,
        })
    }
}

/// Relay host settings layered on top of [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub client: ClientConfig,
    pub index_name: String,
    pub index_namer: IndexNamerKind,
    pub index_type: String,
    pub ttl: Option<Duration>,
    pub serializer: SerializerKind,
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::parse(&Settings::from_env(ENV_PREFIX))
    }

    pub fn parse(settings: &Settings) -> Result<Self, ConfigError> {
        let client = ClientConfig::parse(settings)?;
        let index_name = settings.get("index_name").unwrap_or("flume").to_owned();
        let index_namer = IndexNamerKind::parse(settings.get("index_name_builder").unwrap_or_default())?;
        let index_type = settings.get("index_type").unwrap_or("log").to_owned();
        let ttl = parse_ttl(settings, "ttl")?;
        let serializer = SerializerKind::parse(settings.get("serializer").unwrap_or_default())?;
        let batch_size = parse_usize(settings, "batch_size", 100)?;
        if batch_size == 0 {
            return Err(ConfigError::InvalidValue("batch_size".into(), "0".into()));
        }
        let flush_interval = parse_duration_ms(settings, "flush_interval_ms", 1000)?;
        if flush_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "flush_interval_ms".into(),
                "0".into(),
            ));
        }

        Ok(Self {
            client,
            index_name,
            index_namer,
            index_type,
            ttl,
            serializer,
            batch_size,
            flush_interval,
        })
    }
}

fn parse_endpoints(raw: &str) -> Result<Vec<Endpoint>, ConfigError> {
    let endpoints = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Endpoint::parse)
        .collect::<Result<Vec<_>, _>>()?;
    if endpoints.is_empty() {
        return Err(ConfigError::NoEndpoints);
    }
    Ok(endpoints)
}

pub(crate) fn parse_usize(
    settings: &Settings,
    name: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    match settings.get(name) {
        Some(val) => val
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_owned(), val.to_owned())),
        None => Ok(default),
    }
}

pub(crate) fn parse_duration_ms(
    settings: &Settings,
    name: &str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    match settings.get(name) {
        Some(val) => {
            let ms: u64 = val
                .parse()
                .map_err(|_| ConfigError::InvalidValue(name.to_owned(), val.to_owned()))?;
            Ok(Duration::from_millis(ms))
        }
        None => Ok(Duration::from_millis(default_ms)),
    }
}

/// TTL with an optional unit suffix (`ms`, `s`, `m`, `h`, `d`, `w`).
/// A bare number counts days; zero or absent means no TTL.
pub(crate) fn parse_ttl(settings: &Settings, name: &str) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = settings.get(name) else {
        return Ok(None);
    };
    let invalid = || ConfigError::InvalidValue(name.to_owned(), raw.to_owned());

    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount: u64 = digits.parse().map_err(|_| invalid())?;

    let unit_ms: u64 = match unit.trim() {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "" | "d" => 86_400_000,
        "w" => 604_800_000,
        _ => return Err(invalid()),
    };
    let ms = amount.checked_mul(unit_ms).ok_or_else(invalid)?;

    Ok((ms > 0).then(|| Duration::from_millis(ms)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    None,
}

pub(crate) fn parse_compression(settings: &Settings) -> Result<Compression, ConfigError> {
    match settings.get("compression") {
        Some("none") | None => Ok(Compression::None),
        Some("gzip") => Ok(Compression::Gzip),
        Some(other) => Err(ConfigError::InvalidValue(
            "compression".into(),
            other.to_owned(),
        )),
    }
}

pub(crate) fn parse_headers(settings: &Settings) -> Vec<(String, String)> {
    settings
        .get("headers")
        .map(|raw| {
            raw.split(',')
                .filter_map(|pair| {
                    let (k, v) = pair.split_once('=')?;
                    let k = k.trim();
                    let v = v.trim();
                    if k.is_empty() {
                        return None;
                    }
                    Some((k.to_owned(), v.to_owned()))
                })
                .collect()
        })
        .unwrap_or_default()
}
