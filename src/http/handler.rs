//! Wrapped handler capabilities.
//!
//! A dispatcher fronts exactly one of two kinds of handler:
//! - a tower service taking a request and returning a response
//!   (any `axum::Router` qualifies)
//! - a context handler mutating a single [`RequestContext`]
//!
//! The kind is fixed when the dispatcher is built.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use tower::util::BoxCloneSyncService;
use tower::Service;

use crate::http::context::RequestContext;

/// Handler that works on a mutable request context.
pub trait ContextHandler: Send + Sync + 'static {
    fn handle(&self, ctx: &mut RequestContext);
}

impl<F> ContextHandler for F
where
    F: Fn(&mut RequestContext) + Send + Sync + 'static,
{
    fn handle(&self, ctx: &mut RequestContext) {
        self(ctx)
    }
}

/// Boxed request/response service.
pub type BoxedService = BoxCloneSyncService<Request<Body>, Response<Body>, Infallible>;

/// The handler a dispatcher wraps.
#[derive(Clone)]
pub enum Handler {
    Service(BoxedService),
    Context(Arc<dyn ContextHandler>),
}

impl Handler {
    pub fn service<S>(service: S) -> Self
    where
        S: Service<Request<Body>, Response = Response<Body>, Error = Infallible>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        Handler::Service(BoxCloneSyncService::new(service))
    }

    pub fn context<H: ContextHandler>(handler: H) -> Self {
        Handler::Context(Arc::new(handler))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Handler::Service(_) => "service",
            Handler::Context(_) => "context",
        }
    }
}

impl From<Router> for Handler {
    fn from(router: Router) -> Self {
        Handler::service(router)
    }
}

impl From<BoxedService> for Handler {
    fn from(service: BoxedService) -> Self {
        Handler::Service(service)
    }
}

impl From<Arc<dyn ContextHandler>> for Handler {
    fn from(handler: Arc<dyn ContextHandler>) -> Self {
        Handler::Context(handler)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.kind()).finish()
    }
}
