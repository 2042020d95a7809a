//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Collect routes contributed by modules during initialization
//! - Wire up middleware (tracing, timeout, request ID)
//! - Close keep-alive connections once shutdown is requested
//! - Serve until told to shut down, then drain in-flight requests

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::lifecycle::ShutdownFlag;

/// Routes registered by module factories, served by the server module.
#[derive(Clone, Default)]
pub struct RouteTable {
    router: Arc<Mutex<Router>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `routes` into the table. Overlapping paths panic, as in `Router::merge`.
    pub fn merge(&self, routes: Router) {
        let mut router = self
            .router
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *router = std::mem::take(&mut *router).merge(routes);
    }

    /// Take every route registered so far, leaving the table empty.
    pub fn take(&self) -> Router {
        let mut router = self
            .router
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *router)
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable").finish_non_exhaustive()
    }
}

/// HTTP server for the probe and API endpoints.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(routes: Router, config: &ServerConfig, flag: ShutdownFlag) -> Self {
        Self {
            router: Self::build_router(routes, config, flag),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(routes: Router, config: &ServerConfig, flag: ShutdownFlag) -> Router {
        routes
            .layer(middleware::from_fn_with_state(flag, close_when_draining))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.request_timeout_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve on `listener` until `shutdown` resolves, then drain open requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Ask clients not to reuse connections once shutdown has been requested.
async fn close_when_draining(
    State(flag): State<ShutdownFlag>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    if flag.is_requested() {
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("close"));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use tower::ServiceExt;

    fn app(flag: ShutdownFlag) -> Router {
        let routes = RouteTable::new();
        routes.merge(Router::new().route("/ping", get(|| async { "pong" })));
        HttpServer::new(routes.take(), &ServerConfig::default(), flag).into_router()
    }

    fn ping() -> Request {
        axum::http::Request::builder().uri("/ping").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_keeps_connections_open_while_serving() {
        let response = app(ShutdownFlag::new()).oneshot(ping()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CONNECTION).is_none());
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_closes_connections_once_draining() {
        let flag = ShutdownFlag::new();
        flag.request();
        let response = app(flag).oneshot(ping()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONNECTION], "close");
    }

    #[tokio::test]
    async fn test_take_empties_the_table() {
        let routes = RouteTable::new();
        routes.merge(Router::new().route("/a", get(|| async { "a" })));
        routes.merge(Router::new().route("/b", get(|| async { "b" })));

        let taken = routes.take();
        let request = || axum::http::Request::builder().uri("/b").body(Body::empty()).unwrap();
        assert_eq!(taken.oneshot(request()).await.unwrap().status(), StatusCode::OK);
        assert_eq!(
            routes.take().oneshot(request()).await.unwrap().status(),
            StatusCode::NOT_FOUND
        );
    }
}
