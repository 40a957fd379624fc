use crate::context::route_context;
use crate::handler::{BoxedHandler, HandlerFuture};
use hyper::header::{HeaderValue, LOCATION};
use hyper::{Body, Request, Response, StatusCode};
use std::sync::Arc;

/// Strips a trailing slash from the request path and continues routing, so
/// `/accounts/` serves the `/accounts` route.
pub fn strip_slashes(next: BoxedHandler) -> BoxedHandler {
    Arc::new(move |mut req: Request<Body>| {
        let next = next.clone();
        Box::pin(async move {
            let rctx = route_context(&req);
            let path = match &rctx {
                Some(rctx) => {
                    let ctx = rctx.lock();
                    if !ctx.route_path.is_empty() {
                        ctx.route_path.clone()
                    } else {
                        req.uri().path().to_string()
                    }
                }
                None => req.uri().path().to_string(),
            };

            if path.len() > 1 && path.ends_with('/') {
                let stripped = path[..path.len() - 1].to_string();
                match &rctx {
                    Some(rctx) => rctx.lock().route_path = stripped,
                    // outside a router, rewrite the request URI itself
                    None => rewrite_path(&mut req, &stripped),
                }
            }

            next.call(req).await
        }) as HandlerFuture
    })
}

/// Answers paths with a trailing slash with a 301 to the same path minus
/// the slash.
pub fn redirect_slashes(next: BoxedHandler) -> BoxedHandler {
    Arc::new(move |req: Request<Body>| {
        let next = next.clone();
        Box::pin(async move {
            let path = match route_context(&req) {
                Some(rctx) => {
                    let ctx = rctx.lock();
                    if !ctx.route_path.is_empty() {
                        ctx.route_path.clone()
                    } else {
                        req.uri().path().to_string()
                    }
                }
                None => req.uri().path().to_string(),
            };

            if path.len() > 1 && path.ends_with('/') {
                let target = match req.uri().query() {
                    Some(query) => format!("{}?{}", &path[..path.len() - 1], query),
                    None => path[..path.len() - 1].to_string(),
                };
                if let Ok(location) = HeaderValue::from_str(&target) {
                    let mut res = Response::new(Body::empty());
                    *res.status_mut() = StatusCode::MOVED_PERMANENTLY;
                    res.headers_mut().insert(LOCATION, location);
                    return Ok(res);
                }
            }

            next.call(req).await
        }) as HandlerFuture
    })
}

fn rewrite_path(req: &mut Request<Body>, path: &str) {
    let mut parts = req.uri().clone().into_parts();
    let path_and_query = match req.uri().query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    if let Ok(pq) = path_and_query.parse() {
        parts.path_and_query = Some(pq);
        if let Ok(uri) = hyper::Uri::from_parts(parts) {
            *req.uri_mut() = uri;
        }
    }
}
