use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Bytes escaped in query keys and values. `/` and `:` stay readable so a
/// next-URL parameter still looks like a path.
const QUERY_COMPONENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// One entry of a route table, with its metadata.
///
/// Nested routes match several records at once (parent first).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteRecord {
    pub path: String,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl RouteRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            meta: Map::new(),
        }
    }

    /// Adds a metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Whether this record matches `path`, segment-wise by prefix.
    pub fn matches_path(&self, path: &str) -> bool {
        let record: Vec<&str> = segments(&self.path).collect();
        let target: Vec<&str> = segments(path).collect();
        record.len() <= target.len() && record.iter().zip(&target).all(|(a, b)| a == b)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// A navigation target.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
}

impl Location {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: BTreeMap::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Path plus query string, e.g. `/login?nextUrl=/admin`.
    ///
    /// Query keys and values are percent-encoded, so
    /// [`parse`](Self::parse) recovers the same location.
    pub fn full_path(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, QUERY_COMPONENT),
                    utf8_percent_encode(v, QUERY_COMPONENT)
                )
            })
            .collect();
        format!("{}?{}", self.path, query.join("&"))
    }

    /// Splits a `path?query` string produced by [`full_path`](Self::full_path).
    pub fn parse(full_path: &str) -> Self {
        let Some((path, query)) = full_path.split_once('?') else {
            return Self::new(full_path);
        };
        let query = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(k), decode(v))
            })
            .collect();
        Self {
            path: path.to_string(),
            query,
        }
    }
}

fn decode(component: &str) -> String {
    percent_decode_str(component).decode_utf8_lossy().into_owned()
}

/// A resolved route: the location plus every record it matched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Route {
    pub location: Location,
    pub matched: Vec<RouteRecord>,
}

impl Route {
    pub fn new(location: Location, matched: Vec<RouteRecord>) -> Self {
        Self { location, matched }
    }

    pub fn path(&self) -> &str {
        &self.location.path
    }

    pub fn full_path(&self) -> String {
        self.location.full_path()
    }
}
