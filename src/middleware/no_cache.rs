use crate::handler::{BoxedHandler, HandlerFuture};
use hyper::header::HeaderValue;
use hyper::{Body, Request};
use std::sync::Arc;

const EPOCH: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

const NO_CACHE_HEADERS: [(&str, &str); 4] = [
    ("expires", EPOCH),
    (
        "cache-control",
        "no-cache, no-store, no-transform, must-revalidate, private, max-age=0",
    ),
    ("pragma", "no-cache"),
    ("x-accel-expires", "0"),
];

const ETAG_HEADERS: [&str; 6] = [
    "etag",
    "if-modified-since",
    "if-match",
    "if-none-match",
    "if-range",
    "if-unmodified-since",
];

/// Installs a series of response headers that keep upstream proxies and
/// clients from caching, and strips conditional headers from the request
/// so handlers never answer 304.
pub fn no_cache(next: BoxedHandler) -> BoxedHandler {
    Arc::new(move |mut req: Request<Body>| {
        let next = next.clone();
        Box::pin(async move {
            for name in ETAG_HEADERS {
                req.headers_mut().remove(name);
            }

            let mut res = next.call(req).await?;
            for (name, value) in NO_CACHE_HEADERS {
                res.headers_mut()
                    .insert(name, HeaderValue::from_static(value));
            }
            Ok(res)
        }) as HandlerFuture
    })
}
