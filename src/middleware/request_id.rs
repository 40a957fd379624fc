use crate::handler::{BoxedHandler, HandlerFuture};
use hyper::{Body, Request};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// The header consulted for an externally assigned request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request extension carrying the id assigned by [`request_id`].
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

static COUNTER: AtomicU64 = AtomicU64::new(0);

// "host/instance" prefix shared by every id this process hands out
static PREFIX: Lazy<String> = Lazy::new(|| {
    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let instance = nanos as u64 ^ (std::process::id() as u64).rotate_left(32);
    format!("{}/{:010x}", hostname, instance & 0xff_ffff_ffff)
});

/// Tags each request with a unique id of the form
/// `host/instance-000001`, taken from the `x-request-id` header when the
/// caller already assigned one. The id travels in the request extensions;
/// see [`get_request_id`].
pub fn request_id(next: BoxedHandler) -> BoxedHandler {
    Arc::new(move |mut req: Request<Body>| {
        let next = next.clone();
        Box::pin(async move {
            let id = match req
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
            {
                Some(external) if !external.is_empty() => external.to_string(),
                _ => {
                    let n = COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
                    format!("{}-{:06}", &*PREFIX, n)
                }
            };
            req.extensions_mut().insert(RequestId(id));
            next.call(req).await
        }) as HandlerFuture
    })
}

/// Returns the request id assigned by [`request_id`], if present.
pub fn get_request_id(req: &Request<Body>) -> Option<String> {
    req.extensions().get::<RequestId>().map(|id| id.0.clone())
}
