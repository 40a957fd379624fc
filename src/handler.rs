//! The `Handler` trait is the unit of dispatch: an asynchronous function
//! from a request to a response. Plain `async fn`s and closures implement
//! it through the blanket impl below, so most code never names the trait.

use crate::chain::ChainHandler;
use crate::mux::Mux;
use futures::future::BoxFuture;
use hyper::{Body, Request, Response};
use std::future::Future;
use std::sync::Arc;

/// The future returned by every handler invocation.
pub type HandlerFuture = BoxFuture<'static, Result<Response<Body>, hyper::Error>>;

/// A shared handler, as stored in the routing tree. Handlers are installed
/// under several method bits and mount points, so they are reference
/// counted rather than boxed.
pub type BoxedHandler = Arc<dyn Handler>;

/// An asynchronous HTTP handler.
pub trait Handler: Send + Sync {
    fn call(&self, req: Request<Body>) -> HandlerFuture;

    /// Introspection hook used by [`walk`](crate::walk) to look through
    /// composed middleware chains.
    fn as_chain(&self) -> Option<&ChainHandler> {
        None
    }

    /// Introspection hook used by mounting: a handler that exposes nested
    /// routes here is recorded on the trie so sub-router traversal and
    /// 404/405 propagation can reach it.
    fn sub_routes(&self) -> Option<&Mux> {
        None
    }
}

impl<F, R> Handler for F
where
    F: Fn(Request<Body>) -> R + Send + Sync,
    R: Future<Output = Result<Response<Body>, hyper::Error>> + Send + 'static,
{
    fn call(&self, req: Request<Body>) -> HandlerFuture {
        Box::pin(self(req))
    }
}

impl<T: Handler + ?Sized> Handler for Arc<T> {
    fn call(&self, req: Request<Body>) -> HandlerFuture {
        (**self).call(req)
    }

    fn as_chain(&self) -> Option<&ChainHandler> {
        (**self).as_chain()
    }

    fn sub_routes(&self) -> Option<&Mux> {
        (**self).sub_routes()
    }
}

/// Boxes a plain async function into a shared handler.
pub fn handler_fn<F, R>(f: F) -> BoxedHandler
where
    F: Fn(Request<Body>) -> R + Send + Sync + 'static,
    R: Future<Output = Result<Response<Body>, hyper::Error>> + Send + 'static,
{
    Arc::new(f)
}
