//! Gateway configuration container and definition-time validation.
//!
//! A [`GatewayConfig`] is stored as JSON under a gateway name and resolved
//! through the [`Store`](crate::store::Store) on every gateway invocation.
//! [`validate()`](GatewayConfig::validate) checks structural invariants
//! before any upstream I/O occurs; pattern compilation happens in the
//! gateway runtime crate.

use crate::store::Cid;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Definition-time configuration failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The stored config blob is not valid JSON for [`GatewayConfig`].
    #[error("gateway config is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// `base_url` is missing a scheme or empty.
    #[error("base_url '{0}' must start with http:// or https://")]
    InvalidBaseUrl(String),

    /// `gateway_prefix` must be a local absolute path.
    #[error("gateway_prefix '{0}' must start with '/'")]
    InvalidPrefix(String),

    /// A regex in the config does not compile.
    #[error("pattern '{pattern}' does not compile: {message}")]
    BadPattern { pattern: String, message: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Strip rule
// ─────────────────────────────────────────────────────────────────────────────

/// How the upstream prefix is removed during link rewriting: a literal
/// prefix string or a regex matched against the start of the URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StripRule {
    /// Literal prefix, e.g. `"https://api.github.com"`.
    Prefix(String),
    /// Regex form, e.g. `{"regex": "^https://[^/]+/v3"}`.
    Regex { regex: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Link-detection sub-configs
// ─────────────────────────────────────────────────────────────────────────────

/// Strategy 1: full literal URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullUrlConfig {
    /// Whether full-URL detection runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for FullUrlConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Strategy 2: values starting with `/` under URL-ish keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialUrlConfig {
    /// Key globs such as `url`, `*_url`, `*_path`, `href`.
    #[serde(default)]
    pub key_patterns: Vec<String>,
}

/// One value-pattern rule for Strategy 3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuePattern {
    /// Regex the string value must match, e.g. `^cus_[A-Za-z0-9]+$`.
    pub regex: String,
    /// URL template; may reference `{value}` and `{inferred_table}`.
    pub template: String,
}

/// Strategy 3: ID references by key path or value shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdReferenceConfig {
    /// Dotted key path (e.g. `owner.login`) to URL template
    /// (e.g. `/users/{login}`).
    #[serde(default)]
    pub key_patterns: HashMap<String, String>,
    /// Value-shape rules, tried in order.
    #[serde(default)]
    pub value_patterns: Vec<ValuePattern>,
}

/// One composite rule: request-path context plus the current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeRule {
    /// Regex captured from the request path.
    pub context_regex: String,
    /// Names for the captures, in order.
    pub context_vars: Vec<String>,
    /// URL template using context vars plus `{value}`.
    pub url_template: String,
}

/// Strategy 4: composite references keyed by the JSON field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeConfig {
    /// Field name to ordered rule list; the first rule whose
    /// `context_regex` matches the request path wins.
    #[serde(default)]
    pub entries: HashMap<String, Vec<CompositeRule>>,
}

/// The four optional strategy sub-configs.  An absent sub-config disables
/// that strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDetectionConfig {
    #[serde(default)]
    pub full_url: Option<FullUrlConfig>,
    #[serde(default)]
    pub partial_url: Option<PartialUrlConfig>,
    #[serde(default)]
    pub id_reference: Option<IdReferenceConfig>,
    #[serde(default)]
    pub composite: Option<CompositeConfig>,
}

// ─────────────────────────────────────────────────────────────────────────────
// GatewayConfig
// ─────────────────────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

/// Configuration of one named gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Upstream base URL, e.g. `https://api.github.com`.
    pub base_url: String,
    /// Upstream prefix removed during link rewriting.  Defaults to the
    /// literal `base_url` when absent.
    #[serde(default)]
    pub base_url_strip: Option<StripRule>,
    /// Local URL prefix replacing the stripped upstream prefix,
    /// e.g. `/gateway/github`.
    pub gateway_prefix: String,
    /// Body of the request transform, when configured.
    #[serde(default)]
    pub request_transform_cid: Option<Cid>,
    /// Body of the response transform, when configured.
    #[serde(default)]
    pub response_transform_cid: Option<Cid>,
    /// Template overrides: file name to blob CID.
    #[serde(default)]
    pub templates: HashMap<String, Cid>,
    /// Link-detection strategy configuration.
    #[serde(default)]
    pub link_detection: LinkDetectionConfig,
    /// Regexes marking path segments as known-valid in breadcrumbs.
    #[serde(default)]
    pub valid_path_patterns: Vec<String>,
    /// Field name to referenced entity kind, for `{inferred_table}`.
    #[serde(default)]
    pub cross_table_mappings: HashMap<String, String>,
    /// Upstream request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub upstream_timeout_secs: u64,
}

impl GatewayConfig {
    /// Minimal config for the given upstream and local prefix.
    pub fn new(base_url: impl Into<String>, gateway_prefix: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            base_url_strip: None,
            gateway_prefix: gateway_prefix.into(),
            request_transform_cid: None,
            response_transform_cid: None,
            templates: HashMap::new(),
            link_detection: LinkDetectionConfig::default(),
            valid_path_patterns: Vec::new(),
            cross_table_mappings: HashMap::new(),
            upstream_timeout_secs: default_timeout_secs(),
        }
    }

    /// Deserialize and validate a stored config blob.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Check structural invariants before runtime use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        if !self.gateway_prefix.starts_with('/') {
            return Err(ConfigError::InvalidPrefix(self.gateway_prefix.clone()));
        }
        Ok(())
    }

    /// The effective strip rule: the configured one, or the literal
    /// `base_url` as a prefix.
    pub fn strip_rule(&self) -> StripRule {
        self.base_url_strip
            .clone()
            .unwrap_or_else(|| StripRule::Prefix(self.base_url.trim_end_matches('/').to_string()))
    }
}
