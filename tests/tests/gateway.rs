//! Gateway end-to-end scenarios against axum mock upstreams.

use axum::extract::RawQuery;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use pathway_engine::{Engine, MemoryRegistry, MemoryStore};
use pathway_gateway::GatewayDispatcher;
use pathway_kernel::{EntityKind, ExecutionContext, RequestInfo, Resolved, Value};
use pathway_testing::spawn_upstream;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn gateway_ctx(path: &str, name: &str, config: serde_json::Value) -> ExecutionContext {
    let store = Arc::new(MemoryStore::new());
    store.insert_entity(
        EntityKind::Gateway,
        name,
        Resolved::Inline(config.to_string()),
    );
    let registry = MemoryRegistry::new();
    registry
        .register(Arc::new(GatewayDispatcher::new()))
        .expect("fresh registry");
    registry
        .register(Arc::new(pathway_testing::Echo))
        .expect("fresh registry");
    ExecutionContext::new(RequestInfo::get(path), store, Arc::new(registry))
}

fn html(value: &Value) -> &str {
    value.output_utf8().expect("html body")
}

#[tokio::test]
async fn id_references_link_across_resources() {
    let app = Router::new().route(
        "/posts/{id}",
        get(|| async { Json(json!({"userId": 1, "id": 1, "title": "t"})) }),
    );
    let addr = spawn_upstream(app).await;

    let ctx = gateway_ctx(
        "/gateway/jsonplaceholder/posts/1",
        "jsonplaceholder",
        json!({
            "base_url": format!("http://{addr}"),
            "gateway_prefix": "/gateway/jsonplaceholder",
            "link_detection": {
                "id_reference": {"key_patterns": {"userId": "/users/{id}"}}
            }
        }),
    );
    let value = Engine::new().handle(&ctx).await;

    assert_eq!(value.status_code, 200);
    assert!(value.content_type.starts_with("text/html"));
    let html = html(&value);
    assert!(
        html.contains(r#"<a href="/gateway/jsonplaceholder/users/1" class="json-link">1</a>"#),
        "{html}"
    );
    // Only the userId value is wrapped.
    assert_eq!(html.matches(r#"class="json-link""#).count(), 1);
}

#[tokio::test]
async fn upstream_urls_are_rewritten_through_the_gateway() {
    let app = Router::new().route(
        "/users/octocat",
        get(|| async {
            Json(json!({
                "login": "octocat",
                "repos_url": "https://api.github.com/users/octocat/repos"
            }))
        }),
    );
    let addr = spawn_upstream(app).await;

    let ctx = gateway_ctx(
        "/gateway/github/users/octocat",
        "github",
        json!({
            "base_url": format!("http://{addr}"),
            "base_url_strip": "https://api.github.com",
            "gateway_prefix": "/gateway/github",
            "link_detection": {"full_url": {"enabled": true}}
        }),
    );
    let value = Engine::new().handle(&ctx).await;
    assert!(
        html(&value).contains(r#"href="/gateway/github/users/octocat/repos""#),
        "{}",
        html(&value)
    );
}

#[tokio::test]
async fn value_patterns_link_ids_to_their_table() {
    let app = Router::new().route(
        "/charges/{id}",
        get(|| async { Json(json!({"id": "ch_1", "customer": "cus_5"})) }),
    );
    let addr = spawn_upstream(app).await;

    let ctx = gateway_ctx(
        "/gateway/stripe/charges/ch_1",
        "stripe",
        json!({
            "base_url": format!("http://{addr}"),
            "gateway_prefix": "/gateway/stripe",
            "link_detection": {
                "id_reference": {
                    "value_patterns": [
                        {"regex": "^cus_[A-Za-z0-9]+$", "template": "/{inferred_table}/{value}"}
                    ]
                }
            },
            "cross_table_mappings": {"customer": "customers"}
        }),
    );
    let value = Engine::new().handle(&ctx).await;
    assert!(
        html(&value).contains(r#"href="/gateway/stripe/customers/cus_5""#),
        "{}",
        html(&value)
    );
}

#[tokio::test]
async fn query_strings_reach_the_upstream_verbatim() {
    let app = Router::new().route(
        "/search",
        get(|RawQuery(query): RawQuery| async move {
            Json(json!({"q": query.unwrap_or_default()}))
        }),
    );
    let addr = spawn_upstream(app).await;

    let store = Arc::new(MemoryStore::new());
    store.insert_entity(
        EntityKind::Gateway,
        "search",
        Resolved::Inline(
            json!({
                "base_url": format!("http://{addr}"),
                "gateway_prefix": "/gateway/search"
            })
            .to_string(),
        ),
    );
    let registry = MemoryRegistry::new();
    registry
        .register(Arc::new(GatewayDispatcher::new()))
        .expect("fresh registry");
    let ctx = ExecutionContext::new(
        RequestInfo::get("/gateway/search/search").with_query("q=rust"),
        store,
        Arc::new(registry),
    );
    let value = Engine::new().handle(&ctx).await;
    assert!(html(&value).contains("q=rust"), "{}", html(&value));
}

#[tokio::test]
async fn non_json_responses_get_the_diagnostic_page() {
    let app = Router::new().route(
        "/robots.txt",
        get(|| async { ([(header::CONTENT_TYPE, "text/plain")], "User-agent: *") }),
    );
    let addr = spawn_upstream(app).await;

    let ctx = gateway_ctx(
        "/gateway/site/robots.txt",
        "site",
        json!({
            "base_url": format!("http://{addr}"),
            "gateway_prefix": "/gateway/site"
        }),
    );
    let value = Engine::new().handle(&ctx).await;
    assert_eq!(value.status_code, 200);
    let html = html(&value);
    assert!(html.contains("text/plain"), "{html}");
    assert!(html.contains("User-agent: *"), "{html}");
    assert!(html.contains("debug-header"));
}

#[tokio::test]
async fn binary_responses_are_inlined() {
    let app = Router::new().route(
        "/logo.png",
        get(|| async {
            (
                [(header::CONTENT_TYPE, "image/png")],
                vec![0x89u8, 0x50, 0x4e, 0x47, 0xff, 0xfe],
            )
        }),
    );
    let addr = spawn_upstream(app).await;

    let ctx = gateway_ctx(
        "/gateway/site/logo.png",
        "site",
        json!({
            "base_url": format!("http://{addr}"),
            "gateway_prefix": "/gateway/site"
        }),
    );
    let value = Engine::new().handle(&ctx).await;
    assert!(
        html(&value).contains("data:image/png;base64,"),
        "{}",
        html(&value)
    );
}

#[tokio::test]
async fn unreachable_upstream_is_a_502_value() {
    let ctx = gateway_ctx(
        "/gateway/down/x",
        "down",
        json!({
            // TEST-NET-1: nothing listens there.
            "base_url": "http://192.0.2.1:9",
            "gateway_prefix": "/gateway/down",
            "upstream_timeout_secs": 1
        }),
    );
    let value = Engine::new().handle(&ctx).await;
    assert!(
        value.status_code == 502 || value.status_code == 504,
        "{}",
        value.status_code
    );
}

#[tokio::test]
async fn slow_upstream_times_out_as_504() {
    let app = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Json(json!({"late": true}))
        }),
    );
    let addr = spawn_upstream(app).await;

    let ctx = gateway_ctx(
        "/gateway/slow/slow",
        "slow",
        json!({
            "base_url": format!("http://{addr}"),
            "gateway_prefix": "/gateway/slow",
            "upstream_timeout_secs": 1
        }),
    );
    let value = Engine::new().handle(&ctx).await;
    assert_eq!(value.status_code, 504);
}

#[tokio::test]
async fn retryable_statuses_are_retried_with_backoff() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/flaky",
        get(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    (StatusCode::SERVICE_UNAVAILABLE, "try again").into_response()
                } else {
                    Json(json!({"ok": true})).into_response()
                }
            }
        }),
    );
    let addr = spawn_upstream(app).await;

    let ctx = gateway_ctx(
        "/gateway/flaky/flaky",
        "flaky",
        json!({
            "base_url": format!("http://{addr}"),
            "gateway_prefix": "/gateway/flaky"
        }),
    );
    let value = Engine::new().handle(&ctx).await;
    assert_eq!(value.status_code, 200);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(html(&value).contains("true"), "{}", html(&value));
}

#[tokio::test]
async fn missing_gateway_config_is_an_internal_error_value() {
    let store = Arc::new(MemoryStore::new());
    let registry = MemoryRegistry::new();
    registry
        .register(Arc::new(GatewayDispatcher::new()))
        .expect("fresh registry");
    let ctx = ExecutionContext::new(
        RequestInfo::get("/gateway/unknown/x"),
        store,
        Arc::new(registry),
    );
    let value = Engine::new().handle(&ctx).await;
    assert_eq!(value.status_code, 500);
}

/// Trivial transform runner: the request transform body names the real
/// sub-path, the response transform summarizes the upstream body.
struct RewriteRunner;

#[async_trait::async_trait]
impl pathway_kernel::TransformRunner for RewriteRunner {
    async fn run_request(
        &self,
        transform_body: &[u8],
        mut parts: pathway_kernel::RequestParts,
    ) -> anyhow::Result<pathway_kernel::RequestParts> {
        parts.sub_path = String::from_utf8_lossy(transform_body).into_owned();
        Ok(parts)
    }

    async fn run_response(
        &self,
        _transform_body: &[u8],
        response: pathway_kernel::UpstreamResponse,
        _config: &pathway_kernel::GatewayConfig,
        _request_path: &str,
    ) -> anyhow::Result<Value> {
        Ok(Value::text(format!("upstream sent {} bytes", response.body.len()))
            .with_status(response.status))
    }
}

#[tokio::test]
async fn transform_bodies_rewrite_request_and_response() {
    let app = Router::new().route("/real", get(|| async { Json(json!({"ok": true})) }));
    let addr = spawn_upstream(app).await;

    let store = Arc::new(MemoryStore::new());
    let request_cid = store.seed_blob(b"real");
    let response_cid = store.seed_blob(b"summarize");
    store.insert_entity(
        EntityKind::Gateway,
        "scripted",
        Resolved::Inline(
            json!({
                "base_url": format!("http://{addr}"),
                "gateway_prefix": "/gateway/scripted",
                "request_transform_cid": request_cid.as_str(),
                "response_transform_cid": response_cid.as_str()
            })
            .to_string(),
        ),
    );
    let registry = MemoryRegistry::new();
    registry
        .register(Arc::new(
            GatewayDispatcher::new().with_runner(Arc::new(RewriteRunner)),
        ))
        .expect("fresh registry");
    let ctx = ExecutionContext::new(
        // The literal sub-path is ignored; the request transform targets /real.
        RequestInfo::get("/gateway/scripted/whatever"),
        store,
        Arc::new(registry),
    );
    let value = Engine::new().handle(&ctx).await;
    assert_eq!(value.status_code, 200);
    assert_eq!(value.output_utf8(), Some("upstream sent 11 bytes"));
}

#[tokio::test]
async fn gateway_failures_are_catchable() {
    let ctx = gateway_ctx(
        "/try/gateway/unknown/x/catch/echo/fallback",
        "other",
        json!({
            "base_url": "http://192.0.2.1:9",
            "gateway_prefix": "/gateway/other"
        }),
    );
    let value = Engine::new().handle(&ctx).await;
    assert_eq!(value.output_utf8(), Some("fallback"));
}
