//! Hyper integration: wraps a [`Mux`] in the `Service` pair expected by
//! `hyper::Server`.

use crate::mux::Mux;
use futures::future::BoxFuture;
use hyper::service::Service;
use hyper::{Body, Request, Response};
use std::task::{Context, Poll};

/// The `MakeService` handed to `hyper::Server::serve`; yields one
/// [`RouterService`] per connection.
pub struct MakeRouterService(pub RouterService);

impl<T> Service<T> for MakeRouterService {
    type Response = RouterService;
    type Error = hyper::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _: T) -> Self::Future {
        let service = self.0.clone();
        Box::pin(async move { Ok(service) })
    }
}

/// A cloneable hyper `Service` dispatching into the router.
#[derive(Clone)]
pub struct RouterService(pub Mux);

impl Service<Request<Body>> for RouterService {
    type Response = Response<Body>;
    type Error = hyper::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mux = self.0.clone();
        Box::pin(async move { mux.serve(req).await })
    }
}

impl Mux {
    /// Converts the router into a hyper `Service`.
    ///
    /// ```no_run
    /// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
    /// use hyper::{Body, Request, Response};
    /// use trellis::Mux;
    ///
    /// let router = Mux::new();
    /// router.get("/", |_req: Request<Body>| async {
    ///     Ok(Response::new(Body::from("home")))
    /// });
    ///
    /// hyper::Server::bind(&([127, 0, 0, 1], 3000).into())
    ///     .serve(router.into_service())
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn into_service(self) -> MakeRouterService {
        MakeRouterService(RouterService(self))
    }
}
