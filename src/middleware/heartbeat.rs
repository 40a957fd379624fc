use crate::handler::{BoxedHandler, HandlerFuture};
use http::Method;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Request, Response};
use std::sync::Arc;

/// Answers GET/HEAD requests on `endpoint` with a 200 before any routing,
/// so load balancers and uptime checks stay off the route table.
pub fn heartbeat(endpoint: &str) -> impl Fn(BoxedHandler) -> BoxedHandler + Clone {
    let endpoint: Arc<str> = Arc::from(endpoint);
    move |next: BoxedHandler| {
        let endpoint = endpoint.clone();
        Arc::new(move |req: Request<Body>| {
            let next = next.clone();
            let endpoint = endpoint.clone();
            Box::pin(async move {
                if (req.method() == Method::GET || req.method() == Method::HEAD)
                    && req.uri().path().eq_ignore_ascii_case(&endpoint)
                {
                    let mut res = Response::new(Body::from("."));
                    res.headers_mut()
                        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
                    return Ok(res);
                }
                next.call(req).await
            }) as HandlerFuture
        }) as BoxedHandler
    }
}
