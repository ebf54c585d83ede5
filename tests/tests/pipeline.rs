//! End-to-end pipeline scenarios against the in-memory store and the test
//! handler kit.

use async_trait::async_trait;
use pathway_engine::{Engine, MemoryRegistry, MemoryStore};
use pathway_kernel::{
    BudgetAccount, BudgetLimits, EntityKind, ExecutionContext, Handler, HandlerOutcome,
    RequestInfo, Resolved, Segment, SideEffect, Value,
};
use pathway_testing::handlers::{test_registry, FixedCost};
use std::sync::Arc;

fn context(path: &str) -> (ExecutionContext, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let ctx = ExecutionContext::new(RequestInfo::get(path), store.clone(), test_registry());
    (ctx, store)
}

async fn run(path: &str) -> Value {
    let (ctx, _) = context(path);
    Engine::new().handle(&ctx).await
}

fn body(value: &Value) -> &str {
    value.output_utf8().expect("utf-8 body")
}

#[tokio::test]
async fn falsy_test_selects_the_else_branch() {
    let value = run("/if/echo/false/then/echo/yes/else/echo/no").await;
    assert_eq!(body(&value), "no");
    assert_eq!(value.clone().into_response_parts().status, 200);
}

#[tokio::test]
async fn truthy_test_runs_the_then_branch_pipeline() {
    let value = run("/if/echo/hello/then/upper/echo/world/else/echo/x").await;
    assert_eq!(body(&value), "WORLD");
    assert_eq!(value.into_response_parts().status, 200);
}

#[tokio::test]
async fn branchless_if_returns_the_probe() {
    let value = run("/if/echo/null/then/echo/yes").await;
    assert_eq!(body(&value), "null");
    assert_eq!(value.into_response_parts().status, 200);
}

#[tokio::test]
async fn unbounded_loop_is_cut_at_500_iterations() {
    let value = run("/do/echo/x/while/echo/true").await;
    assert_eq!(value.output.len(), 500);
    assert_eq!(value.output, "x".repeat(500).into_bytes());
    assert_eq!(value.headers.get("X-Loop-Terminated"), Some("iterations"));
}

#[tokio::test]
async fn catch_path_answers_for_a_missing_handler() {
    let value = run("/try/nonexistent/catch/echo/caught").await;
    assert_eq!(body(&value), "caught");
    assert_eq!(value.into_response_parts().status, 200);
}

/// Reports the error status a catch context carries.
struct ErrStat;

#[async_trait]
impl Handler for ErrStat {
    fn name(&self) -> &str {
        "errstat"
    }
    fn side_effect(&self) -> SideEffect {
        SideEffect::Reads
    }
    async fn invoke(
        &self,
        args: &[Segment],
        _input: Value,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<HandlerOutcome> {
        let status = ctx
            .request
            .headers
            .get("X-Error-Status")
            .unwrap_or("-")
            .to_string();
        Ok(HandlerOutcome::consuming_all(Value::text(status), args))
    }
}

#[tokio::test]
async fn catch_context_carries_the_error_status() {
    let registry = MemoryRegistry::new();
    registry.register(Arc::new(pathway_testing::Echo)).unwrap();
    registry.register(Arc::new(ErrStat)).unwrap();
    let store = Arc::new(MemoryStore::new());
    let ctx = ExecutionContext::new(
        RequestInfo::get("/try/nonexistent/catch/errstat"),
        store,
        Arc::new(registry),
    );
    let value = Engine::new().handle(&ctx).await;
    assert_eq!(body(&value), "404");
}

#[tokio::test]
async fn operators_in_identity_form_match_the_plain_pipeline() {
    for payload in ["hello", "0", " "] {
        let plain = run(&format!("/echo/{payload}")).await;
        for head in ["if", "do", "try"] {
            let wrapped = run(&format!("/{head}/echo/{payload}")).await;
            assert_eq!(wrapped.output, plain.output, "/{head}/echo/{payload}");
            assert_eq!(wrapped.content_type, plain.content_type);
            assert_eq!(wrapped.status_code, plain.status_code);
        }
    }
}

#[tokio::test]
async fn alias_chains_are_bounded() {
    let (ctx, store) = context("/hop0");
    for i in 0..24 {
        store.insert_entity(
            EntityKind::Alias,
            format!("hop{i}"),
            Resolved::Inline(format!("/hop{}", i + 1)),
        );
    }
    let value = Engine::new().handle(&ctx).await;
    assert_eq!(value.status_code, 508);
    assert_eq!(value.headers.get("X-Error-Type"), Some("alias_cycle"));
}

#[tokio::test]
async fn alias_expansion_may_contain_operators() {
    let (ctx, store) = context("/shortcut");
    store.insert_entity(
        EntityKind::Alias,
        "shortcut",
        Resolved::Inline("/if/echo/1/then/echo/expanded/else/echo/n".to_string()),
    );
    let value = Engine::new().handle(&ctx).await;
    assert_eq!(body(&value), "expanded");
}

#[tokio::test]
async fn cost_estimator_output_feeds_the_budget() {
    let registry = MemoryRegistry::new();
    registry.register(Arc::new(pathway_testing::Echo)).unwrap();
    registry.register(Arc::new(FixedCost("0.3"))).unwrap();
    let store = Arc::new(MemoryStore::new());
    let ctx = ExecutionContext::new(
        // Each echo stage costs 0.3 cents; the second one crosses 0.5.
        RequestInfo::get("/do/echo/x/while/echo/true"),
        store,
        Arc::new(registry),
    );
    let value = Engine::new().handle(&ctx).await;
    assert_eq!(value.headers.get("X-Loop-Terminated"), Some("cost"));
    assert!(ctx.budget.cost_cents() >= 0.5);
}

/// Sleeps long enough for a short deadline to expire mid-loop.
struct Slow;

#[async_trait]
impl Handler for Slow {
    fn name(&self) -> &str {
        "slow"
    }
    fn side_effect(&self) -> SideEffect {
        SideEffect::Pure
    }
    async fn invoke(
        &self,
        args: &[Segment],
        _input: Value,
        _ctx: &ExecutionContext,
    ) -> anyhow::Result<HandlerOutcome> {
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
        Ok(HandlerOutcome::consuming_all(Value::text("s"), args))
    }
}

#[tokio::test]
async fn expired_deadline_terminates_the_loop_by_time() {
    let registry = MemoryRegistry::new();
    registry.register(Arc::new(Slow)).unwrap();
    registry.register(Arc::new(pathway_testing::Echo)).unwrap();
    let store = Arc::new(MemoryStore::new());
    let ctx = ExecutionContext::new(
        RequestInfo::get("/do/slow/while/echo/true"),
        store,
        Arc::new(registry),
    )
    .with_budget(Arc::new(BudgetAccount::new(BudgetLimits {
        max_elapsed_ms: 200,
        ..BudgetLimits::default()
    })));
    let value = Engine::new().handle(&ctx).await;
    assert_eq!(value.output, b"s");
    assert_eq!(value.headers.get("X-Loop-Terminated"), Some("time"));
}

#[tokio::test]
async fn query_strings_are_preserved_in_the_context() {
    let store = Arc::new(MemoryStore::new());
    let ctx = ExecutionContext::new(
        RequestInfo::get("/echo/ok").with_query("a=1&b=%2F"),
        store,
        test_registry(),
    );
    let value = Engine::new().handle(&ctx).await;
    assert_eq!(body(&value), "ok");
    assert_eq!(ctx.request.query, "a=1&b=%2F");
}

#[tokio::test]
async fn percent_encoded_slashes_stay_inside_one_segment() {
    let value = run("/echo/a%2Fb").await;
    assert_eq!(body(&value), "a/b");
}
