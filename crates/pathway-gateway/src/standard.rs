//! The standard response transform.
//!
//! When a gateway configures no response transform, upstream responses are
//! rendered here: JSON bodies go through link detection, text bodies get a
//! diagnostic page, and binary bodies are inlined as a `data:` URL.  Every
//! page carries a debug header (the upstream URL as a clickable breadcrumb)
//! and a debug footer (the referrer breadcrumb).

use crate::linkify::{render_json, LinkDetector};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use html_escape::{encode_double_quoted_attribute, encode_text};
use pathway_kernel::{GatewayConfig, Store, UpstreamResponse, Value};
use regex::Regex;
use std::fmt::Write;
use tracing::warn;

/// Template override names looked up in `GatewayConfig::templates`.
pub const PAGE_TEMPLATE: &str = "page.html";
pub const DIAGNOSTIC_TEMPLATE: &str = "diagnostic.html";
pub const BINARY_TEMPLATE: &str = "binary.html";

const DEFAULT_PAGE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<style>
.json-key { color: #881391; }
.json-string { color: #0b7500; }
.json-number { color: #1a01cc; }
.json-boolean { color: #aa5d00; }
.json-null { color: #808080; }
.json-link { color: #0969da; }
.crumb { color: #0969da; text-decoration: none; }
.crumb-dim { color: #9aa4ae; }
.crumb-sep { color: #9aa4ae; padding: 0 2px; }
.debug-header, .debug-footer { font-family: monospace; padding: 4px 0; }
</style>
</head>
<body>
<header class="debug-header">{{debug_header}}</header>
<pre class="json-view">{{content}}</pre>
<footer class="debug-footer">{{debug_footer}}</footer>
</body>
</html>
"#;

const DEFAULT_DIAGNOSTIC: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"></head>
<body>
<header class="debug-header">{{debug_header}}</header>
<p class="diagnostic">Upstream answered with status {{status}} and content type {{content_type}}.</p>
<pre class="raw-body">{{body}}</pre>
<footer class="debug-footer">{{debug_footer}}</footer>
</body>
</html>
"#;

const DEFAULT_BINARY: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"></head>
<body>
<header class="debug-header">{{debug_header}}</header>
<div class="binary-view">{{content}}</div>
<footer class="debug-footer">{{debug_footer}}</footer>
</body>
</html>
"#;

/// Apply the standard transform to an upstream response.
pub async fn apply(
    store: &dyn Store,
    config: &GatewayConfig,
    response: UpstreamResponse,
    upstream_url: &str,
    request_path: &str,
    referrer: Option<&str>,
) -> Value {
    let valid = compile_valid_patterns(&config.valid_path_patterns);
    let debug_header = upstream_breadcrumb(config, upstream_url, &valid);
    let debug_footer = referrer
        .map(|path| local_breadcrumb(path, &valid))
        .unwrap_or_default();

    let content_type = response
        .content_type()
        .unwrap_or("")
        .to_ascii_lowercase();
    let is_json = content_type.starts_with("application/json") || content_type.contains("+json");

    if is_json {
        if let Ok(json) = serde_json::from_slice::<serde_json::Value>(&response.body) {
            let detector = match LinkDetector::compile(config) {
                Ok(detector) => detector,
                Err(err) => {
                    return Value::error(
                        pathway_kernel::ErrorKind::Internal,
                        format!("link detection config: {err}"),
                    )
                }
            };
            let content = render_json(&json, &detector, request_path);
            let template = load_template(store, config, PAGE_TEMPLATE, DEFAULT_PAGE).await;
            let html = fill(
                &template,
                &[
                    ("debug_header", debug_header.as_str()),
                    ("content", content.as_str()),
                    ("debug_footer", debug_footer.as_str()),
                ],
            );
            return Value::html(html).with_status(response.status);
        }
        // Declared JSON but unparseable: fall through to the diagnostic page.
    }

    match std::str::from_utf8(&response.body) {
        Ok(text) => {
            let template =
                load_template(store, config, DIAGNOSTIC_TEMPLATE, DEFAULT_DIAGNOSTIC).await;
            let status = response.status.to_string();
            let escaped_type = encode_text(&content_type);
            let escaped_body = encode_text(text);
            let html = fill(
                &template,
                &[
                    ("debug_header", debug_header.as_str()),
                    ("status", status.as_str()),
                    ("content_type", escaped_type.as_ref()),
                    ("body", escaped_body.as_ref()),
                    ("debug_footer", debug_footer.as_str()),
                ],
            );
            Value::html(html).with_status(response.status)
        }
        Err(_) => {
            let template = load_template(store, config, BINARY_TEMPLATE, DEFAULT_BINARY).await;
            let mime = if content_type.is_empty() {
                "application/octet-stream"
            } else {
                &content_type
            };
            let data_url = format!("data:{};base64,{}", mime, BASE64.encode(&response.body));
            let mut content = String::new();
            if mime.starts_with("image/") {
                let _ = write!(
                    content,
                    r#"<img src="{}" alt="upstream image">"#,
                    encode_double_quoted_attribute(&data_url)
                );
            } else {
                let _ = write!(
                    content,
                    r#"<a href="{}" download>binary body ({} bytes)</a>"#,
                    encode_double_quoted_attribute(&data_url),
                    response.body.len()
                );
            }
            let html = fill(
                &template,
                &[
                    ("debug_header", debug_header.as_str()),
                    ("content", content.as_str()),
                    ("debug_footer", debug_footer.as_str()),
                ],
            );
            Value::html(html).with_status(response.status)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Templates
// ─────────────────────────────────────────────────────────────────────────────

/// Fetch a template override from the store, falling back to the built-in.
async fn load_template(
    store: &dyn Store,
    config: &GatewayConfig,
    name: &str,
    default: &str,
) -> String {
    let Some(cid) = config.templates.get(name) else {
        return default.to_string();
    };
    match store.get(cid).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            warn!(template = name, %cid, error = %err, "template blob missing; using built-in");
            default.to_string()
        }
    }
}

/// Replace `{{name}}` placeholders.  Unknown placeholders are left as-is.
fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{{{name}}}}}"), value);
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Breadcrumbs
// ─────────────────────────────────────────────────────────────────────────────

fn compile_valid_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(regex) => Some(regex),
            Err(err) => {
                warn!(pattern, error = %err, "skipping invalid path pattern");
                None
            }
        })
        .collect()
}

/// The upstream URL as a segmented breadcrumb whose crumbs point at the
/// gateway-local equivalents.
fn upstream_breadcrumb(config: &GatewayConfig, url: &str, valid: &[Regex]) -> String {
    let base = config.base_url.trim_end_matches('/');
    let prefix = config.gateway_prefix.trim_end_matches('/');
    let (root_label, tail) = match url.strip_prefix(base) {
        Some(tail) => (base, tail),
        None => (url, ""),
    };

    let mut crumbs = vec![(root_label.to_string(), prefix.to_string())];
    let mut cumulative = prefix.to_string();
    let path_part = tail.split('?').next().unwrap_or("");
    for segment in path_part.split('/').filter(|s| !s.is_empty()) {
        cumulative = format!("{cumulative}/{segment}");
        crumbs.push((segment.to_string(), cumulative.clone()));
    }
    render_crumbs(&crumbs, valid)
}

/// A local path (the referrer) as a segmented breadcrumb.
fn local_breadcrumb(path: &str, valid: &[Regex]) -> String {
    let path_part = path.split('?').next().unwrap_or("");
    let mut crumbs = Vec::new();
    let mut cumulative = String::new();
    for segment in path_part.split('/').filter(|s| !s.is_empty()) {
        cumulative = format!("{cumulative}/{segment}");
        crumbs.push((segment.to_string(), cumulative.clone()));
    }
    if crumbs.is_empty() {
        crumbs.push(("/".to_string(), "/".to_string()));
    }
    render_crumbs(&crumbs, valid)
}

/// Segments matching a valid-path pattern render in the normal link
/// style; others are dimmed but stay clickable.  With no patterns
/// configured, everything renders normal.
fn render_crumbs(crumbs: &[(String, String)], valid: &[Regex]) -> String {
    crumbs
        .iter()
        .map(|(label, href)| {
            let known = valid.is_empty() || valid.iter().any(|regex| regex.is_match(label));
            let class = if known { "crumb" } else { "crumb crumb-dim" };
            format!(
                r#"<a href="{}" class="{}">{}</a>"#,
                encode_double_quoted_attribute(href),
                class,
                encode_text(label)
            )
        })
        .collect::<Vec<_>>()
        .join(r#"<span class="crumb-sep">/</span>"#)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathway_kernel::{
        Cid, EntityKind, FullUrlConfig, Headers, LinkDetectionConfig, Resolved, StoreError,
        StoreResult,
    };
    use std::collections::HashMap;

    struct FixedStore(HashMap<String, Vec<u8>>);

    #[async_trait::async_trait]
    impl Store for FixedStore {
        async fn put(&self, _bytes: &[u8]) -> StoreResult<Cid> {
            Ok(Cid::new("unused"))
        }
        async fn get(&self, cid: &Cid) -> StoreResult<Vec<u8>> {
            self.0
                .get(cid.as_str())
                .cloned()
                .ok_or_else(|| StoreError::BlobNotFound(cid.clone()))
        }
        async fn resolve(&self, kind: EntityKind, name: &str) -> StoreResult<Resolved> {
            Err(StoreError::EntityNotFound {
                kind,
                name: name.to_string(),
            })
        }
        async fn list_by_prefix(&self, _prefix: &str) -> StoreResult<Vec<Cid>> {
            Ok(Vec::new())
        }
    }

    fn store() -> FixedStore {
        FixedStore(HashMap::new())
    }

    fn config() -> GatewayConfig {
        let mut config = GatewayConfig::new("https://api.example.com", "/gateway/example");
        config.link_detection = LinkDetectionConfig {
            full_url: Some(FullUrlConfig { enabled: true }),
            ..LinkDetectionConfig::default()
        };
        config
    }

    fn json_response(body: &str) -> UpstreamResponse {
        let mut headers = Headers::new();
        headers.set("content-type", "application/json");
        UpstreamResponse {
            status: 200,
            headers,
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn json_response_renders_linked_html() {
        let response =
            json_response(r#"{"self": "https://api.example.com/items/1", "n": 3}"#);
        let value = apply(
            &store(),
            &config(),
            response,
            "https://api.example.com/items/1",
            "/gateway/example/items/1",
            Some("/gateway/example/items"),
        )
        .await;

        let html = value.output_utf8().unwrap();
        assert_eq!(value.status_code, 200);
        assert!(value.content_type.starts_with("text/html"));
        assert!(html.contains(r#"href="/gateway/example/items/1""#), "{html}");
        assert!(html.contains("debug-header"));
        assert!(html.contains("debug-footer"));
    }

    #[tokio::test]
    async fn non_json_text_gets_the_diagnostic_page() {
        let mut headers = Headers::new();
        headers.set("content-type", "text/plain");
        let response = UpstreamResponse {
            status: 404,
            headers,
            body: b"<not found>".to_vec(),
        };
        let value = apply(
            &store(),
            &config(),
            response,
            "https://api.example.com/missing",
            "/gateway/example/missing",
            None,
        )
        .await;

        let html = value.output_utf8().unwrap();
        assert_eq!(value.status_code, 404);
        assert!(html.contains("status 404"), "{html}");
        assert!(html.contains("text/plain"));
        assert!(html.contains("&lt;not found&gt;"));
    }

    #[tokio::test]
    async fn binary_body_is_inlined_as_a_data_url() {
        let mut headers = Headers::new();
        headers.set("content-type", "image/png");
        let response = UpstreamResponse {
            status: 200,
            headers,
            body: vec![0x89, 0x50, 0x4e, 0x47, 0xff],
        };
        let value = apply(
            &store(),
            &config(),
            response,
            "https://api.example.com/logo.png",
            "/gateway/example/logo.png",
            None,
        )
        .await;

        let html = value.output_utf8().unwrap();
        assert!(html.contains("data:image/png;base64,"), "{html}");
        assert!(html.contains("<img "));
    }

    #[tokio::test]
    async fn breadcrumb_dims_segments_without_a_valid_pattern() {
        let mut config = config();
        config.valid_path_patterns = vec!["^items$".to_string()];
        let value = apply(
            &store(),
            &config,
            json_response(r#"{"n": 1}"#),
            "https://api.example.com/items/zzz",
            "/gateway/example/items/zzz",
            None,
        )
        .await;

        let html = value.output_utf8().unwrap();
        assert!(html.contains(r#"href="/gateway/example/items" class="crumb""#), "{html}");
        assert!(
            html.contains(r#"href="/gateway/example/items/zzz" class="crumb crumb-dim""#),
            "{html}"
        );
    }

    #[tokio::test]
    async fn template_override_comes_from_the_store() {
        let template = b"override: {{content}}";
        let mut blobs = HashMap::new();
        blobs.insert("tpl".to_string(), template.to_vec());
        let store = FixedStore(blobs);

        let mut config = config();
        config
            .templates
            .insert(PAGE_TEMPLATE.to_string(), Cid::new("tpl"));

        let value = apply(
            &store,
            &config,
            json_response(r#"{"n": 1}"#),
            "https://api.example.com/x",
            "/gateway/example/x",
            None,
        )
        .await;
        let html = value.output_utf8().unwrap();
        assert!(html.starts_with("override: "), "{html}");
    }
}
