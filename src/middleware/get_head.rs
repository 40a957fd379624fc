use crate::context::{route_context, RouteContext};
use crate::handler::{BoxedHandler, HandlerFuture};
use http::Method;
use hyper::{Body, Request};
use std::sync::Arc;

/// Routes undefined HEAD requests to their GET handlers.
///
/// When a HEAD request has no HEAD route of its own, the router is steered
/// through the GET route while the request keeps its original method, so
/// the handler can skip the body.
pub fn get_head(next: BoxedHandler) -> BoxedHandler {
    Arc::new(move |req: Request<Body>| {
        let next = next.clone();
        Box::pin(async move {
            if req.method() == Method::HEAD {
                if let Some(rctx) = route_context(&req) {
                    let (routes, route_path) = {
                        let ctx = rctx.lock();
                        let path = if !ctx.route_path.is_empty() {
                            ctx.route_path.clone()
                        } else {
                            req.uri().path().to_string()
                        };
                        (ctx.routes.clone(), path)
                    };

                    if let Some(routes) = routes {
                        // look ahead with a scratch context; only reroute
                        // when no HEAD handler exists for this path
                        let mut scratch = RouteContext::new();
                        if !routes.match_route(&mut scratch, "HEAD", &route_path) {
                            let mut ctx = rctx.lock();
                            ctx.route_method = "GET".to_string();
                            ctx.route_path = route_path;
                        }
                    }
                }
            }
            next.call(req).await
        }) as HandlerFuture
    })
}
