//! Mock HTTP upstreams for gateway tests.
//!
//! Spawns an axum router on an ephemeral local port and returns its
//! address; the server task lives until the test process exits.

use axum::Router;
use std::net::SocketAddr;

/// Serve `router` on 127.0.0.1 with an OS-assigned port.
pub async fn spawn_upstream(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("mock upstream address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve mock upstream");
    });
    addr
}
