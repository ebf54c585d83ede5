//! The payload type flowing between pipeline stages.
//!
//! A [`Value`] carries the body bytes, content type, status code, and
//! headers produced by a stage.  Stages never unwind on failure: an error
//! is just a `Value` whose `status_code` is 400 or above, and only the
//! `try` operator reacts to it.

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Headers
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered header map with case-insensitive name lookup.
///
/// Insertion order is preserved so responses serialize deterministically;
/// `set` replaces an existing header in place rather than reordering it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a header value by name, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing the first existing entry with the same name
    /// (case-insensitive) in place, or appending if none exists.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Remove a header by name (case-insensitive), returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(idx).1)
    }

    /// Whether a header with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.set(k, v);
        }
        headers
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value
// ─────────────────────────────────────────────────────────────────────────────

/// Default content type for freshly created values.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// The payload flowing between pipeline stages.
///
/// All fields use owned types so a `Value` can cross async task boundaries
/// without lifetime complications.  `status_code == 0` means "no status
/// yet"; any status of 400 or above marks the value as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    /// Body bytes (UTF-8 text or binary).
    pub output: Vec<u8>,
    /// MIME content type.
    pub content_type: String,
    /// HTTP-style status code, 0–599.  `0` means unset.
    pub status_code: u16,
    /// Response headers accumulated by stages.
    pub headers: Headers,
}

impl Default for Value {
    fn default() -> Self {
        Self::empty()
    }
}

impl Value {
    /// The empty value: no body, `text/plain`, no status, no headers.
    pub fn empty() -> Self {
        Self {
            output: Vec::new(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            status_code: 0,
            headers: Headers::new(),
        }
    }

    /// A plain-text value with no status.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            output: body.into().into_bytes(),
            ..Self::empty()
        }
    }

    /// An HTML value with no status.
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            output: body.into().into_bytes(),
            content_type: "text/html; charset=utf-8".to_string(),
            ..Self::empty()
        }
    }

    /// An error value for the given kind.  The body is the message, the
    /// status comes from [`ErrorKind::status`], and `X-Error-Type` carries
    /// the kind's stable name.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        let mut value = Self::text(message);
        value.status_code = kind.status();
        value.headers.set("X-Error-Type", kind.as_str());
        value
    }

    /// Builder: set the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = status;
        self
    }

    /// Builder: set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Builder: set a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// The body as UTF-8 text, if it decodes.
    pub fn output_utf8(&self) -> Option<&str> {
        std::str::from_utf8(&self.output).ok()
    }

    /// Whether this value is an error (status 400 or above).
    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }

    /// Boolean interpretation used by the `if` and `do` operators.
    ///
    /// A value is falsy iff its body (as UTF-8, untrimmed) equals `""`,
    /// `"0"`, or a case-insensitive match of `"false"`, `"null"`, `"none"`,
    /// or its status is 400 or above.  Whitespace is truthy; bodies that do
    /// not decode as UTF-8 are truthy below 400.
    pub fn is_truthy(&self) -> bool {
        if self.is_error() {
            return false;
        }
        match self.output_utf8() {
            Some(text) => {
                !(text.is_empty()
                    || text == "0"
                    || text.eq_ignore_ascii_case("false")
                    || text.eq_ignore_ascii_case("null")
                    || text.eq_ignore_ascii_case("none"))
            }
            None => true,
        }
    }

    /// Negation of [`is_truthy`](Self::is_truthy); exactly one holds.
    pub fn is_falsy(&self) -> bool {
        !self.is_truthy()
    }

    /// Serialize into the pieces an HTTP front-end needs to answer the
    /// client: an unset status becomes `200`.
    pub fn into_response_parts(self) -> ResponseParts {
        ResponseParts {
            status: if self.status_code == 0 {
                200
            } else {
                self.status_code
            },
            content_type: self.content_type,
            headers: self.headers,
            body: self.output,
        }
    }
}

/// The wire-ready pieces of a [`Value`], produced by
/// [`Value::into_response_parts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseParts {
    pub status: u16,
    pub content_type: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}
