//! HTTP server setup.
//!
//! # Responsibilities
//! - Mount a dispatcher behind an Axum router
//! - Wire up transport middleware (tracing) and the handler deadline
//! - Serve with peer addresses so access logs carry the client IP
//! - Stop accepting on shutdown and drain in-flight requests

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::InterceptorConfig;
use crate::http::dispatcher::Dispatcher;
use crate::lifecycle::Shutdown;

/// HTTP server fronting a [`Dispatcher`].
pub struct HttpServer {
    router: Router,
    dispatcher: Dispatcher,
}

impl HttpServer {
    /// Create a new HTTP server serving `dispatcher`.
    ///
    /// `timeouts.request_secs` becomes the dispatcher's handler deadline, so
    /// timed-out requests still carry an ID and reach the sinks.
    pub fn new(config: &InterceptorConfig, dispatcher: Dispatcher) -> Self {
        let dispatcher =
            dispatcher.with_timeout(Duration::from_secs(config.timeouts.request_secs));
        let router = Self::build_router(dispatcher.clone());
        Self { router, dispatcher }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(dispatcher: Dispatcher) -> Router {
        Router::new()
            .fallback_service(dispatcher)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!(
            routes = self.dispatcher.counters().len(),
            "HTTP server stopped"
        );
        Ok(())
    }

    /// The dispatcher behind this server.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
