use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use url::Url;

use crate::config::ConfigError;

/// A backend address that always carries an explicit scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(String);

impl Endpoint {
    /// Prefix `http://` when `raw` carries no scheme. The scheme match is
    /// case-insensitive and anything other than `http` or `https` is rejected.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim().trim_end_matches('/');
        if raw.is_empty() {
            return Err(ConfigError::InvalidEndpoint(raw.to_owned()));
        }
        let normalized = match raw.split_once("://") {
            Some((scheme, rest))
                if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") =>
            {
                format!("{}://{rest}", scheme.to_ascii_lowercase())
            }
            Some(_) => return Err(ConfigError::InvalidEndpoint(raw.to_owned())),
            None => format!("http://{raw}"),
        };
        Url::parse(&normalized).map_err(|_| ConfigError::InvalidEndpoint(raw.to_owned()))?;
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL of the bulk ingestion path on this endpoint.
    pub fn bulk_url(&self) -> String {
        format!("{}/_bulk", self.0)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed, non-empty set of candidates handed out in cyclic order.
///
/// The cursor is owned by the list, so two clients never share rotation state.
#[derive(Debug)]
pub struct RotationList<T> {
    items: Vec<T>,
    cursor: AtomicUsize,
}

impl<T> RotationList<T> {
    pub fn new(items: Vec<T>) -> Result<Self, ConfigError> {
        if items.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        Ok(Self {
            items,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Return the item under the cursor and advance the cursor by one.
    pub fn next(&self) -> &T {
        let len = self.items.len();
        // The closure never returns None, so both arms carry the previous cursor.
        let idx = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len))
        {
            Ok(prev) | Err(prev) => prev,
        };
        &self.items[idx]
    }
}

#[cfg(test)]
mod tests;
