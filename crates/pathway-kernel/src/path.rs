//! Pipeline segments.
//!
//! A [`Segment`] is one non-empty URL path token; a [`Pipeline`] is the
//! ordered sequence of segments a request path parses into.  Parsing lives
//! in `pathway-engine`; these types are kernel-level because the
//! [`Handler`](crate::handler::Handler) contract consumes them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One non-empty, percent-decoded URL path token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Segment(String);

impl Segment {
    /// Wrap an already-decoded token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::ops::Deref for Segment {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Segment {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Segment {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// The ordered sequence of segments derived from a request path.
///
/// Immutable once constructed by the parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    segments: Vec<Segment>,
}

impl Pipeline {
    /// Wrap a parsed segment sequence.
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// The segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the pipeline has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl From<Vec<Segment>> for Pipeline {
    fn from(segments: Vec<Segment>) -> Self {
        Self::new(segments)
    }
}
