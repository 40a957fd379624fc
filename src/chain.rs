//! Middleware composition. A middleware is a value that takes the next
//! handler and returns a wrapping handler; a stack of them folds
//! right-to-left over an endpoint so the first registered middleware runs
//! outermost.

use crate::handler::{BoxedHandler, Handler, HandlerFuture};
use hyper::{Body, Request};
use std::sync::Arc;

/// A single middleware: wraps the next handler and returns the wrapper.
pub type Middleware = Arc<dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync>;

/// An ordered middleware stack with methods to compose handlers.
#[derive(Clone, Default)]
pub struct Middlewares(pub Vec<Middleware>);

/// Builds a [`Middlewares`] stack from a list of middleware handlers.
pub fn chain(middlewares: Vec<Middleware>) -> Middlewares {
    Middlewares(middlewares)
}

/// Boxes a plain middleware function.
pub fn middleware_fn<F>(f: F) -> Middleware
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    Arc::new(f)
}

impl Middlewares {
    /// Builds a handler from the stack, with `endpoint` as the final
    /// handler. The result keeps the endpoint and the stack visible for
    /// route enumeration.
    pub fn handler(&self, endpoint: BoxedHandler) -> BoxedHandler {
        Arc::new(ChainHandler {
            chain: compose(&self.0, endpoint.clone()),
            endpoint,
            middlewares: self.clone(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn extend(&mut self, other: &Middlewares) {
        self.0.extend(other.0.iter().cloned());
    }
}

impl From<Vec<Middleware>> for Middlewares {
    fn from(middlewares: Vec<Middleware>) -> Self {
        Middlewares(middlewares)
    }
}

/// A composed handler that remembers its endpoint and middleware stack so
/// traversal can report them separately.
pub struct ChainHandler {
    pub endpoint: BoxedHandler,
    pub middlewares: Middlewares,
    chain: BoxedHandler,
}

impl Handler for ChainHandler {
    fn call(&self, req: Request<Body>) -> HandlerFuture {
        self.chain.call(req)
    }

    fn as_chain(&self) -> Option<&ChainHandler> {
        Some(self)
    }
}

/// Folds the middleware stack around `endpoint`, in the order in which the
/// middlewares were registered.
pub(crate) fn compose(middlewares: &[Middleware], endpoint: BoxedHandler) -> BoxedHandler {
    let (last, rest) = match middlewares.split_last() {
        Some(split) => split,
        None => return endpoint,
    };

    let mut handler = last.as_ref()(endpoint);
    for mw in rest.iter().rev() {
        handler = mw.as_ref()(handler);
    }

    handler
}
