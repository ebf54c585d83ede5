//! URL path parsing and balanced operator scanning.
//!
//! A request path splits on `/` into a [`Pipeline`] of segments;
//! percent-decoding happens per segment *after* splitting, so an encoded
//! `%2F` never splits.  Keywords are not resolved eagerly: the operator
//! parsers here are invoked by the engine when it encounters an operator
//! head, and they scan forward tracking nesting depth of that same head.
//! Other operators' keywords are literal segments to them.
//!
//! Parsing is a pure function of the path string: no I/O, no state.

use pathway_kernel::{Pipeline, Segment};
use percent_encoding::percent_decode_str;

/// Operator head keywords.  Recognition is case-sensitive lowercase.
pub const KW_IF: &str = "if";
pub const KW_THEN: &str = "then";
pub const KW_ELSE: &str = "else";
pub const KW_DO: &str = "do";
pub const KW_WHILE: &str = "while";
pub const KW_TRY: &str = "try";
pub const KW_CATCH: &str = "catch";

// ─────────────────────────────────────────────────────────────────────────────
// Path splitting
// ─────────────────────────────────────────────────────────────────────────────

/// Split a raw request path into a pipeline.
///
/// Empty segments are dropped, which normalizes trailing and adjacent
/// slashes.  Each surviving token is percent-decoded (UTF-8, lossy).
pub fn parse_path(path: &str) -> Pipeline {
    let segments = path
        .split('/')
        .filter(|token| !token.is_empty())
        .map(|token| Segment::new(percent_decode_str(token).decode_utf8_lossy().into_owned()))
        .collect();
    Pipeline::new(segments)
}

/// Whether a segment is an operator head the engine dispatches on.
pub fn is_operator_head(segment: &Segment) -> bool {
    matches!(segment.as_str(), KW_IF | KW_DO | KW_TRY)
}

/// Scan for `terminator` at nesting depth 0, where each occurrence of
/// `head` increases depth and a terminator at positive depth closes one
/// nested level.  Returns the index of the boundary keyword.
fn find_terminator(segments: &[Segment], head: &str, terminator: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, segment) in segments.iter().enumerate() {
        if segment.as_str() == head {
            depth += 1;
        } else if segment.as_str() == terminator {
            if depth == 0 {
                return Some(idx);
            }
            depth -= 1;
        }
    }
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// `if` parser
// ─────────────────────────────────────────────────────────────────────────────

/// Parsed form of the segments following an `if` head.
#[derive(Debug, PartialEq, Eq)]
pub enum IfParts<'a> {
    /// No `then` at depth 0: the operator degrades to identity over the
    /// whole remainder.
    Identity(&'a [Segment]),
    /// Test path, true path, and optional false path.
    Branches {
        test: &'a [Segment],
        true_path: &'a [Segment],
        false_path: Option<&'a [Segment]>,
    },
}

/// Consume segments until the matching `then` at depth 0, then until the
/// matching `else`.  A missing `else` leaves the remainder as the true
/// path with no false path.
pub fn parse_if(segments: &[Segment]) -> IfParts<'_> {
    let Some(then_idx) = find_terminator(segments, KW_IF, KW_THEN) else {
        return IfParts::Identity(segments);
    };
    let test = &segments[..then_idx];
    let rest = &segments[then_idx + 1..];
    match find_terminator(rest, KW_IF, KW_ELSE) {
        Some(else_idx) => IfParts::Branches {
            test,
            true_path: &rest[..else_idx],
            false_path: Some(&rest[else_idx + 1..]),
        },
        None => IfParts::Branches {
            test,
            true_path: rest,
            false_path: None,
        },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// `do` parser
// ─────────────────────────────────────────────────────────────────────────────

/// Parsed form of the segments following a `do` head.
#[derive(Debug, PartialEq, Eq)]
pub enum DoParts<'a> {
    /// No `while` at depth 0: identity over the whole remainder.
    Identity(&'a [Segment]),
    /// Loop body and test path; `None` means the implicit variable test.
    Loop {
        body: &'a [Segment],
        test: Option<&'a [Segment]>,
    },
}

/// Consume segments until the matching `while` at depth 0.  The remainder
/// is the test path; `while` with nothing after it selects the implicit
/// test.
pub fn parse_do(segments: &[Segment]) -> DoParts<'_> {
    let Some(while_idx) = find_terminator(segments, KW_DO, KW_WHILE) else {
        return DoParts::Identity(segments);
    };
    let body = &segments[..while_idx];
    let rest = &segments[while_idx + 1..];
    DoParts::Loop {
        body,
        test: if rest.is_empty() { None } else { Some(rest) },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// `try` parser
// ─────────────────────────────────────────────────────────────────────────────

/// Parsed form of the segments following a `try` head.
#[derive(Debug, PartialEq, Eq)]
pub enum TryParts<'a> {
    /// No `catch` at depth 0: identity over the whole remainder.
    Identity(&'a [Segment]),
    /// Guarded path and catch path (which may be empty).
    Guarded {
        try_path: &'a [Segment],
        catch_path: &'a [Segment],
    },
}

/// Consume segments until the matching `catch` at depth 0; the remainder
/// is the catch path.
pub fn parse_try(segments: &[Segment]) -> TryParts<'_> {
    let Some(catch_idx) = find_terminator(segments, KW_TRY, KW_CATCH) else {
        return TryParts::Identity(segments);
    };
    TryParts::Guarded {
        try_path: &segments[..catch_idx],
        catch_path: &segments[catch_idx + 1..],
    }
}
