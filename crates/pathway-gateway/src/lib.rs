//! Gateway runtime for Pathway.
//!
//! A gateway is a handler that proxies an HTTP upstream and transforms its
//! responses into navigable HTML: JSON bodies go through recursive link
//! detection (full URLs, partial URLs, ID references, composite
//! references), text and binary bodies get diagnostic pages, and every
//! rendered page carries breadcrumb debug chrome.
//!
//! Configuration is resolved through the store per request; transform
//! bodies stay opaque and run through the
//! [`TransformRunner`](pathway_kernel::TransformRunner) contract.

// error module
pub mod error;
pub use error::{GatewayImplError, GatewayResult};

// upstream proxy
pub mod proxy;
pub use proxy::UpstreamClient;

// gateway handler
pub mod handler;
pub use handler::{GatewayDispatcher, GatewayHandler};

// link detection
pub mod linkify;
pub use linkify::{render_json, LeafValue, LinkDetector};

// standard response transform
pub mod standard;
pub use standard::{apply as apply_standard_transform, BINARY_TEMPLATE, DIAGNOSTIC_TEMPLATE, PAGE_TEMPLATE};
