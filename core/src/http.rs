//! Request and response values exchanged with calling code.
//!
//! # Design
//! These types are the stable contract with callers. A `Request` describes a
//! transfer without reference to any engine; a `Response` is what comes back
//! from either the real transport or the mock. Every `Response` carries all
//! of its fields by construction, with `Default` supplying the null/empty
//! values, so a response never has to be "completed" by the caller.

use std::fmt;
use std::time::Duration;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::body::{RequestBody, ResponseBody};
use crate::error::TransferError;
use crate::settings::{Setting, SettingKey, Settings};

/// Function applied to a response before it is handed back to the caller.
///
/// The continuation may edit the response in place and return `None`, or
/// return `Some` replacement.
pub type Continuation = Box<dyn FnOnce(&mut Response) -> Option<Response> + Send>;

/// Ordered header map with case-insensitive lookup.
///
/// Names keep the case they were first inserted with; repeated values for the
/// same name are kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `Name: value` lines. Lines without a colon are skipped.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut headers = Self::new();
        for line in lines {
            if let Some((name, value)) = line.as_ref().split_once(':') {
                headers.append(name.trim(), value.trim());
            }
        }
        headers
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Add a value, keeping any values already present for `name`.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1.push(value.into()),
            None => self.entries.push((name, vec![value.into()])),
        }
    }

    /// Replace every value of `name`.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1 = values,
            None => self.entries.push((name, values)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.position(name).map(|i| self.entries[i].1.as_slice())
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.position(name).map(|i| self.entries.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, values) in &self.entries {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Headers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeadersVisitor;

        impl<'de> Visitor<'de> for HeadersVisitor {
            type Value = Headers;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of header names to lists of values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Headers, A::Error> {
                let mut headers = Headers::new();
                while let Some((name, values)) = access.next_entry::<String, Vec<String>>()? {
                    for value in values {
                        headers.append(name.clone(), value);
                    }
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_map(HeadersVisitor)
    }
}

/// Protocol version a request asks the engine to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpVersion {
    #[serde(rename = "1.0")]
    Http10,
    #[serde(rename = "1.1")]
    Http11,
    #[serde(rename = "2")]
    Http2,
}

impl HttpVersion {
    /// Value understood by the engine's HTTP-version option.
    pub fn engine_code(self) -> i64 {
        match self {
            HttpVersion::Http10 => 1,
            HttpVersion::Http11 => 2,
            HttpVersion::Http2 => 3,
        }
    }
}

/// An engine-independent HTTP request.
pub struct Request {
    pub method: String,
    pub url: String,
    pub version: Option<HttpVersion>,
    pub headers: Headers,
    pub body: Option<RequestBody>,
    pub client: Option<Settings>,
    pub then: Option<Continuation>,
}

impl Request {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            version: None,
            headers: Headers::new(),
            body: None,
            client: None,
            then: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_version(mut self, version: HttpVersion) -> Self {
        self.version = Some(version);
        self
    }

    /// Add one client setting, creating the settings map on first use.
    pub fn with_setting(mut self, key: impl Into<SettingKey>, value: impl Into<Setting>) -> Self {
        self.client
            .get_or_insert_with(Settings::new)
            .insert(key, value);
        self
    }

    pub fn with_then<F>(mut self, then: F) -> Self
    where
        F: FnOnce(&mut Response) -> Option<Response> + Send + 'static,
    {
        self.then = Some(Box::new(then));
        self
    }

    /// URL scheme of the target, if the URL parses.
    pub fn scheme(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .map(|u| u.scheme().to_owned())
    }

    /// Pause requested through the `delay` client setting, in milliseconds.
    pub fn delay(&self) -> Option<Duration> {
        let ms = self.client.as_ref()?.get("delay")?.as_number()?;
        if ms <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(ms / 1000.0).ok()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("client", &self.client)
            .field("then", &self.then.as_ref().map(|_| "<continuation>"))
            .finish()
    }
}

/// Statistics reported by the engine after a transfer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferStats {
    /// Final URL after redirects.
    pub url: Option<String>,
    pub total_time: Option<f64>,
    pub primary_ip: Option<String>,
    pub redirect_count: Option<u32>,
}

/// Structured result of a transfer.
///
/// Deserializing a partial JSON document fills every missing field with its
/// default and leaves present fields untouched; `body` may be given as text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Response {
    pub status: Option<u16>,
    pub reason: Option<String>,
    /// Protocol version from the status line, without the `HTTP/` prefix.
    pub version: Option<String>,
    pub headers: Headers,
    #[serde(deserialize_with = "body_from_text")]
    pub body: Option<ResponseBody>,
    pub effective_url: Option<String>,
    pub transfer_stats: TransferStats,
    #[serde(skip_deserializing)]
    pub error: Option<TransferError>,
}

impl Response {
    pub fn with_status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

fn body_from_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<ResponseBody>, D::Error> {
    let text = Option::<String>::deserialize(deserializer)?;
    Ok(text.map(ResponseBody::from_bytes))
}
