use std::fmt;

use chrono::{DateTime, SecondsFormat};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ConfigError;
use crate::event::Event;

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("event body is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Turns one event into the single-line document written after its bulk action line.
pub trait EventSerializer: Send + Sync {
    fn serialize(&self, event: &Event) -> Result<String, SerializeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializerKind {
    Dynamic,
    Logstash,
}

impl SerializerKind {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw {
            "" | "dynamic" => Ok(Self::Dynamic),
            "logstash" => Ok(Self::Logstash),
            other => Err(ConfigError::UnknownSerializer(other.to_owned())),
        }
    }

    pub fn build(self) -> Box<dyn EventSerializer> {
        match self {
            Self::Dynamic => Box::new(DynamicSerializer),
            Self::Logstash => Box::new(LogstashSerializer),
        }
    }
}

impl fmt::Display for SerializerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dynamic => write!(f, "dynamic"),
            Self::Logstash => write!(f, "logstash"),
        }
    }
}

/// Every header becomes a string field; the body is stored under `body`,
/// replacing a header of that name.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicSerializer;

impl EventSerializer for DynamicSerializer {
    fn serialize(&self, event: &Event) -> Result<String, SerializeError> {
        let body = body_str(event)?;
        let mut doc: Map<String, Value> = event
            .headers()
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        // A `body` header never shadows the payload.
        doc.insert("body".into(), Value::String(body.to_owned()));
        Ok(serde_json::to_string(&doc)?)
    }
}

/// Logstash v0 layout: `@message`, `@timestamp`, `@source*`, `@type`, `@fields`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogstashSerializer;

impl EventSerializer for LogstashSerializer {
    fn serialize(&self, event: &Event) -> Result<String, SerializeError> {
        let mut doc = Map::new();
        doc.insert(
            "@message".into(),
            Value::String(body_str(event)?.to_owned()),
        );

        if let Some(ts) = event
            .timestamp_millis()
            .and_then(DateTime::from_timestamp_millis)
        {
            doc.insert(
                "@timestamp".into(),
                Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }

        for (header, field) in [
            ("source", "@source"),
            ("type", "@type"),
            ("host", "@source_host"),
            ("src_path", "@source_path"),
        ] {
            if let Some(v) = event.header(header) {
                doc.insert(field.into(), Value::String(v.to_owned()));
            }
        }

        let fields: Map<String, Value> = event
            .headers()
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        doc.insert("@fields".into(), Value::Object(fields));

        Ok(serde_json::to_string(&doc)?)
    }
}

fn body_str(event: &Event) -> Result<&str, SerializeError> {
    Ok(std::str::from_utf8(event.body())?)
}
