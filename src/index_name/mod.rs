use chrono::{DateTime, Utc};

use crate::config::ConfigError;
use crate::event::Event;

/// Chooses the destination index for an event.
pub trait IndexNamer: Send + Sync {
    fn index_name(&self, event: &Event) -> String;
}

/// Same index for every event.
#[derive(Debug, Clone)]
pub struct StaticIndexName {
    name: String,
}

impl StaticIndexName {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl IndexNamer for StaticIndexName {
    fn index_name(&self, _event: &Event) -> String {
        self.name.clone()
    }
}

/// Daily indices: `<prefix>-YYYY-MM-DD` in UTC, keyed by the event timestamp.
///
/// Events without a usable `timestamp` header go to today's index.
#[derive(Debug, Clone)]
pub struct TimeBasedIndexName {
    prefix: String,
}

impl TimeBasedIndexName {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn name_for(&self, at: DateTime<Utc>) -> String {
        format!("{}-{}", self.prefix, at.format("%Y-%m-%d"))
    }
}

impl IndexNamer for TimeBasedIndexName {
    fn index_name(&self, event: &Event) -> String {
        let at = event
            .timestamp_millis()
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);
        self.name_for(at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexNamerKind {
    Static,
    TimeBased,
}

impl IndexNamerKind {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw {
            "static" => Ok(Self::Static),
            "" | "time_based" => Ok(Self::TimeBased),
            other => Err(ConfigError::UnknownIndexNamer(other.to_owned())),
        }
    }

    pub fn build(self, name: &str) -> Box<dyn IndexNamer> {
        match self {
            Self::Static => Box::new(StaticIndexName::new(name)),
            Self::TimeBased => Box::new(TimeBasedIndexName::new(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn static_ignores_event() {
        let namer = StaticIndexName::new("events");
        assert_eq!(namer.index_name(&Event::new("x")), "events");
        assert_eq!(
            namer.index_name(&Event::new("y").with_header("timestamp", "0")),
            "events"
        );
    }

    #[test]
    fn time_based_uses_event_timestamp() {
        let namer = TimeBasedIndexName::new("flume");
        // 2023-11-14T22:13:20Z
        let event = Event::new("x").with_header("timestamp", "1700000000000");
        assert_eq!(namer.index_name(&event), "flume-2023-11-14");
    }

    #[test]
    fn time_based_is_utc() {
        let namer = TimeBasedIndexName::new("logs");
        let at = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        assert_eq!(namer.name_for(at), "logs-2024-02-29");
    }

    #[test]
    fn time_based_falls_back_to_now() {
        let namer = TimeBasedIndexName::new("logs");
        let before = namer.name_for(Utc::now());
        let name = namer.index_name(&Event::new("x").with_header("timestamp", "soon"));
        let after = namer.name_for(Utc::now());
        assert!(name == before || name == after, "unexpected index {name}");
    }

    #[test]
    fn parse_kinds() {
        assert_eq!(IndexNamerKind::parse("").unwrap(), IndexNamerKind::TimeBased);
        assert_eq!(
            IndexNamerKind::parse("time_based").unwrap(),
            IndexNamerKind::TimeBased
        );
        assert_eq!(IndexNamerKind::parse("static").unwrap(), IndexNamerKind::Static);
        assert!(matches!(
            IndexNamerKind::parse("hourly"),
            Err(ConfigError::UnknownIndexNamer(_))
        ));
    }

    #[test]
    fn built_namer_matches_kind() {
        let event = Event::new("x").with_header("timestamp", "1700000000000");
        assert_eq!(
            IndexNamerKind::Static.build("fixed").index_name(&event),
            "fixed"
        );
        assert_eq!(
            IndexNamerKind::TimeBased.build("fixed").index_name(&event),
            "fixed-2023-11-14"
        );
    }
}
