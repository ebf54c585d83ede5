//! The gateway handler.
//!
//! One [`GatewayHandler`] is registered per gateway name.  It consumes all
//! remaining pipeline segments as the upstream sub-path, loads its
//! configuration from the store, applies the request transform, proxies to
//! the upstream, and applies the response transform (or the standard JSON
//! transform).  Failures become error values; the handler itself never
//! fails the pipeline.

use crate::error::GatewayImplError;
use crate::proxy::UpstreamClient;
use crate::standard;
use async_trait::async_trait;
use pathway_kernel::{
    EntityKind, ErrorKind, ExecutionContext, GatewayConfig, Handler, HandlerOutcome, RequestParts,
    Resolved, Segment, SideEffect, TransformRunner, Value,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Proxies one configured upstream and renders its responses.
pub struct GatewayHandler {
    gateway_name: String,
    client: UpstreamClient,
    runner: Option<Arc<dyn TransformRunner>>,
}

impl GatewayHandler {
    /// Handler for the gateway registered under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let gateway_name = name.into();
        Self {
            client: UpstreamClient::new(gateway_name.clone()),
            gateway_name,
            runner: None,
        }
    }

    /// Builder: install a transform runner for this gateway's request and
    /// response transform bodies.
    pub fn with_runner(mut self, runner: Arc<dyn TransformRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    async fn load_config(&self, ctx: &ExecutionContext) -> Result<GatewayConfig, GatewayImplError> {
        let config_error = |message: String| GatewayImplError::Config {
            gateway: self.gateway_name.clone(),
            message,
        };
        let resolved = ctx
            .store
            .resolve(EntityKind::Gateway, &self.gateway_name)
            .await
            .map_err(|err| config_error(err.to_string()))?;
        let bytes = match resolved {
            Resolved::Inline(text) => text.into_bytes(),
            Resolved::Blob(cid) => ctx
                .store
                .get(&cid)
                .await
                .map_err(|err| config_error(err.to_string()))?,
        };
        GatewayConfig::from_json(&bytes).map_err(|err| config_error(err.to_string()))
    }

    #[instrument(skip(self, args, ctx), fields(gateway = %self.gateway_name))]
    async fn run(&self, args: &[Segment], ctx: &ExecutionContext) -> Value {
        let config = match self.load_config(ctx).await {
            Ok(config) => config,
            Err(err) => return err.into(),
        };

        let sub_path = args
            .iter()
            .map(|segment| segment.as_str())
            .collect::<Vec<_>>()
            .join("/");
        let mut parts = RequestParts {
            method: ctx.request.method.clone(),
            headers: ctx.request.headers.clone(),
            body: ctx.request.body.clone(),
            sub_path,
        };

        if let (Some(cid), Some(runner)) = (&config.request_transform_cid, &self.runner) {
            let body = match ctx.store.get(cid).await {
                Ok(body) => body,
                Err(err) => return pathway_kernel::EngineError::Store(err).into(),
            };
            parts = match runner.run_request(&body, parts).await {
                Ok(parts) => parts,
                Err(err) => {
                    return Value::error(
                        ErrorKind::Internal,
                        format!("request transform failed: {err}"),
                    )
                }
            };
        }

        let mut url = config.base_url.trim_end_matches('/').to_string();
        let tail = parts.sub_path.trim_start_matches('/');
        if !tail.is_empty() {
            url.push('/');
            url.push_str(tail);
        }
        if !ctx.request.query.is_empty() {
            url.push('?');
            url.push_str(&ctx.request.query);
        }

        let response = match self
            .client
            .fetch(
                &parts.method,
                &url,
                &parts.headers,
                &parts.body,
                Duration::from_secs(config.upstream_timeout_secs),
                &ctx.cancel,
            )
            .await
        {
            Ok(response) => response,
            Err(err) => return err.into(),
        };

        if let (Some(cid), Some(runner)) = (&config.response_transform_cid, &self.runner) {
            let body = match ctx.store.get(cid).await {
                Ok(body) => body,
                Err(err) => return pathway_kernel::EngineError::Store(err).into(),
            };
            return match runner
                .run_response(&body, response, &config, &ctx.request.path)
                .await
            {
                Ok(value) => value,
                Err(err) => Value::error(
                    ErrorKind::Internal,
                    format!("response transform failed: {err}"),
                ),
            };
        }

        let referrer = ctx.request.headers.get("referer").map(str::to_string);
        standard::apply(
            ctx.store.as_ref(),
            &config,
            response,
            &url,
            &ctx.request.path,
            referrer.as_deref(),
        )
        .await
    }
}

#[async_trait]
impl Handler for GatewayHandler {
    fn name(&self) -> &str {
        &self.gateway_name
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::External
    }

    async fn invoke(
        &self,
        args: &[Segment],
        _input: Value,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<HandlerOutcome> {
        let value = self.run(args, ctx).await;
        Ok(HandlerOutcome::consuming_all(value, args))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Routes `/gateway/{name}/...` pipelines to per-name gateway handlers.
///
/// Registered once under the name `gateway`; the first argument segment
/// selects the gateway, the rest is the upstream sub-path.  Handlers are
/// created lazily and cached per name.
pub struct GatewayDispatcher {
    runner: Option<Arc<dyn TransformRunner>>,
    handlers: parking_lot::RwLock<std::collections::HashMap<String, Arc<GatewayHandler>>>,
}

impl Default for GatewayDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayDispatcher {
    /// Dispatcher with no transform runner.
    pub fn new() -> Self {
        Self {
            runner: None,
            handlers: parking_lot::RwLock::new(std::collections::HashMap::new()),
        }
    }

    /// Builder: install a transform runner shared by all gateways.
    pub fn with_runner(mut self, runner: Arc<dyn TransformRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    fn handler_for(&self, name: &str) -> Arc<GatewayHandler> {
        if let Some(handler) = self.handlers.read().get(name) {
            return handler.clone();
        }
        let mut handler = GatewayHandler::new(name);
        if let Some(runner) = &self.runner {
            handler = handler.with_runner(runner.clone());
        }
        let handler = Arc::new(handler);
        self.handlers
            .write()
            .entry(name.to_string())
            .or_insert(handler)
            .clone()
    }
}

#[async_trait]
impl Handler for GatewayDispatcher {
    fn name(&self) -> &str {
        "gateway"
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::External
    }

    async fn invoke(
        &self,
        args: &[Segment],
        _input: Value,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<HandlerOutcome> {
        let Some(name) = args.first() else {
            return Ok(HandlerOutcome::consuming_all(
                Value::error(ErrorKind::BadRequest, "gateway name missing"),
                args,
            ));
        };
        let handler = self.handler_for(name.as_str());
        let value = handler.run(&args[1..], ctx).await;
        Ok(HandlerOutcome::consuming_all(value, args))
    }
}
