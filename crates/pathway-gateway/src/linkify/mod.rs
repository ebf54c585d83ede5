//! Link detection over JSON responses.
//!
//! [`LinkDetector`] compiles a gateway's link-detection configuration into
//! anchored regexes once per response, then classifies every string (and
//! eligible integer) the renderer walks past.  The four strategies apply
//! in priority order; the first match wins per value:
//!
//! 1. full literal URL
//! 2. partial URL under a URL-ish key
//! 3. ID reference (key path or value shape)
//! 4. composite reference (request-path context plus the value)
//!
//! Classification is a pure function of `(key path, value, request path)`.

pub mod render;

pub use render::render_json;

use pathway_kernel::{ConfigError, GatewayConfig, StripRule};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;
use std::collections::HashMap;

// ─────────────────────────────────────────────────────────────────────────────
// Leaf values
// ─────────────────────────────────────────────────────────────────────────────

/// A scalar the classifier can turn into a link.  Integers are eligible
/// for key-pattern ID references and composite references only.
#[derive(Debug, Clone, Copy)]
pub enum LeafValue<'a> {
    Str(&'a str),
    Int(&'a str),
}

impl<'a> LeafValue<'a> {
    fn text(&self) -> &'a str {
        match self {
            LeafValue::Str(s) | LeafValue::Int(s) => s,
        }
    }

    fn as_string(&self) -> Option<&'a str> {
        match self {
            LeafValue::Str(s) => Some(s),
            LeafValue::Int(_) => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compiled detector
// ─────────────────────────────────────────────────────────────────────────────

enum CompiledStrip {
    Prefix(String),
    Regex(Regex),
}

struct CompiledComposite {
    context: Regex,
    vars: Vec<String>,
    template: String,
}

/// Precompiled link-detection rules for one gateway.
pub struct LinkDetector {
    gateway_prefix: String,
    full_url_enabled: bool,
    strip: CompiledStrip,
    partial_keys: Vec<Regex>,
    /// Dotted key patterns split into segments, sorted for determinism.
    id_key_patterns: Vec<(Vec<String>, String)>,
    id_value_patterns: Vec<(Regex, String)>,
    composite: HashMap<String, Vec<CompiledComposite>>,
    cross_table: HashMap<String, String>,
}

fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|err| ConfigError::BadPattern {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })
}

/// Convert a key glob (`*_url`, `href`) into an anchored regex.
fn glob_to_regex(glob: &str) -> Result<Regex, ConfigError> {
    let mut pattern = String::from("^");
    for ch in glob.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    compile_pattern(&pattern)
}

impl LinkDetector {
    /// Compile the detection rules of `config`.
    pub fn compile(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let detection = &config.link_detection;

        let strip = match config.strip_rule() {
            StripRule::Prefix(prefix) => CompiledStrip::Prefix(prefix),
            StripRule::Regex { regex } => CompiledStrip::Regex(compile_pattern(&regex)?),
        };

        let partial_keys = match &detection.partial_url {
            Some(cfg) => cfg
                .key_patterns
                .iter()
                .map(|glob| glob_to_regex(glob))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let mut id_key_patterns: Vec<(Vec<String>, String)> = Vec::new();
        let mut id_value_patterns = Vec::new();
        if let Some(id) = &detection.id_reference {
            let mut keys: Vec<_> = id.key_patterns.iter().collect();
            keys.sort_by(|a, b| a.0.cmp(b.0));
            for (pattern, template) in keys {
                id_key_patterns.push((
                    pattern.split('.').map(str::to_string).collect(),
                    template.clone(),
                ));
            }
            for rule in &id.value_patterns {
                id_value_patterns.push((compile_pattern(&rule.regex)?, rule.template.clone()));
            }
        }

        let mut composite = HashMap::new();
        if let Some(cfg) = &detection.composite {
            for (key, rules) in &cfg.entries {
                let mut compiled = Vec::new();
                for rule in rules {
                    compiled.push(CompiledComposite {
                        context: compile_pattern(&rule.context_regex)?,
                        vars: rule.context_vars.clone(),
                        template: rule.url_template.clone(),
                    });
                }
                composite.insert(key.clone(), compiled);
            }
        }

        Ok(Self {
            gateway_prefix: config.gateway_prefix.trim_end_matches('/').to_string(),
            full_url_enabled: detection
                .full_url
                .as_ref()
                .map(|cfg| cfg.enabled)
                .unwrap_or(false),
            strip,
            partial_keys,
            id_key_patterns,
            id_value_patterns,
            composite,
            cross_table: config.cross_table_mappings.clone(),
        })
    }

    /// Classify one leaf value.  `key_path` is the chain of object keys
    /// enclosing the value (array indices are transparent); `request_path`
    /// is the local request path the response is being rendered for.
    ///
    /// Returns the local href to link to, or `None` to render the value
    /// unlinked.  Nulls, empty strings, and empty containers never reach a
    /// strategy.
    pub fn classify(
        &self,
        key_path: &[String],
        value: LeafValue<'_>,
        request_path: &str,
    ) -> Option<String> {
        if value.text().is_empty() {
            return None;
        }
        self.full_url(value)
            .or_else(|| self.partial_url(key_path, value))
            .or_else(|| self.id_reference(key_path, value, request_path))
            .or_else(|| self.composite_reference(key_path, value, request_path))
    }

    // ── Strategy 1: full literal URL ─────────────────────────────────────────

    fn full_url(&self, value: LeafValue<'_>) -> Option<String> {
        if !self.full_url_enabled {
            return None;
        }
        let url = value.as_string()?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return None;
        }
        let stripped = match &self.strip {
            CompiledStrip::Prefix(prefix) => url.strip_prefix(prefix.as_str()),
            CompiledStrip::Regex(regex) => regex
                .find(url)
                .filter(|m| m.start() == 0)
                .map(|m| &url[m.end()..]),
        };
        Some(match stripped {
            Some(local) => format!("{}{}", self.gateway_prefix, local),
            None => format!(
                "{}?target={}",
                self.gateway_prefix,
                utf8_percent_encode(url, NON_ALPHANUMERIC)
            ),
        })
    }

    // ── Strategy 2: partial URL ──────────────────────────────────────────────

    fn partial_url(&self, key_path: &[String], value: LeafValue<'_>) -> Option<String> {
        let path = value.as_string()?;
        if !path.starts_with('/') {
            return None;
        }
        let key = key_path.last()?;
        if self.partial_keys.iter().any(|glob| glob.is_match(key)) {
            Some(format!("{}{}", self.gateway_prefix, path))
        } else {
            None
        }
    }

    // ── Strategy 3: ID reference ─────────────────────────────────────────────

    fn id_reference(
        &self,
        key_path: &[String],
        value: LeafValue<'_>,
        request_path: &str,
    ) -> Option<String> {
        // Key-pattern mode: the dotted pattern must match a suffix of the
        // enclosing object-key chain segment-wise, so a flattened literal
        // key "owner.login" never matches the pattern ["owner", "login"].
        for (pattern, template) in &self.id_key_patterns {
            if key_path.len() >= pattern.len()
                && key_path[key_path.len() - pattern.len()..] == pattern[..]
            {
                let filled = fill_placeholders(template, |_| Some(value.text().to_string()))?;
                return Some(format!("{}{}", self.gateway_prefix, filled));
            }
        }

        // Value-pattern mode: strings only.
        let text = value.as_string()?;
        for (regex, template) in &self.id_value_patterns {
            if !regex.is_match(text) {
                continue;
            }
            let filled = fill_placeholders(template, |name| match name {
                "value" => Some(text.to_string()),
                "inferred_table" => self.infer_table(key_path, request_path),
                _ => None,
            });
            if let Some(href) = filled {
                return Some(format!("{}{}", self.gateway_prefix, href));
            }
        }
        None
    }

    /// Resolve `{inferred_table}`: the field name first, then any segment
    /// of the current request path.
    fn infer_table(&self, key_path: &[String], request_path: &str) -> Option<String> {
        if let Some(key) = key_path.last() {
            if let Some(table) = self.cross_table.get(key) {
                return Some(table.clone());
            }
        }
        request_path
            .split('/')
            .find_map(|segment| self.cross_table.get(segment))
            .cloned()
    }

    // ── Strategy 4: composite reference ──────────────────────────────────────

    fn composite_reference(
        &self,
        key_path: &[String],
        value: LeafValue<'_>,
        request_path: &str,
    ) -> Option<String> {
        let key = key_path.last()?;
        let rules = self.composite.get(key.as_str())?;
        for rule in rules {
            let Some(captures) = rule.context.captures(request_path) else {
                continue;
            };
            let filled = fill_placeholders(&rule.template, |name| {
                if name == "value" {
                    return Some(value.text().to_string());
                }
                rule.vars
                    .iter()
                    .position(|var| var == name)
                    .and_then(|idx| captures.get(idx + 1))
                    .map(|m| m.as_str().to_string())
            })?;
            return Some(format!("{}{}", self.gateway_prefix, filled));
        }
        None
    }
}

/// Replace every `{name}` in `template` using `resolve`; `None` from the
/// resolver aborts the whole fill.
fn fill_placeholders(
    template: &str,
    resolve: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}')?;
        out.push_str(&resolve(&after[..close])?);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Some(out)
}
