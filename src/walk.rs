//! Route traversal: visits every registered route, descending into
//! mounted sub-routers, in deterministic tree order.

use crate::chain::Middlewares;
use crate::context::replace_wildcards;
use crate::handler::BoxedHandler;
use crate::mux::Mux;

/// Error type returned by a walk visitor to stop the traversal.
pub type WalkError = Box<dyn std::error::Error + Send + Sync>;

/// Walks the routes of `mux` depth-first, invoking `visit` with the
/// method name, the full route pattern, the endpoint handler, and the
/// middleware stack leading to it. Composed chains are looked through so
/// the visitor sees the bare endpoint.
pub fn walk<F>(mux: &Mux, mut visit: F) -> Result<(), WalkError>
where
    F: FnMut(&str, &str, &BoxedHandler, &Middlewares) -> Result<(), WalkError>,
{
    walk_routes(mux, "", &Middlewares::default(), &mut visit)
}

fn walk_routes<F>(
    mux: &Mux,
    parent: &str,
    parent_middlewares: &Middlewares,
    visit: &mut F,
) -> Result<(), WalkError>
where
    F: FnMut(&str, &str, &BoxedHandler, &Middlewares) -> Result<(), WalkError>,
{
    for route in mux.routes() {
        let mut middlewares = parent_middlewares.clone();
        middlewares.extend(&mux.middlewares());

        if let Some(sub) = &route.sub_routes {
            let prefix = format!("{}{}", parent, route.pattern);
            walk_routes(sub, &prefix, &middlewares, visit)?;
            continue;
        }

        for (method, handler) in &route.handlers {
            if method == "*" {
                // the per-method entries cover every concrete method
                continue;
            }

            let full_route = replace_wildcards(format!("{}{}", parent, route.pattern));

            match handler.as_chain() {
                Some(chain) => {
                    let mut stack = middlewares.clone();
                    stack.extend(&chain.middlewares);
                    visit(method, &full_route, &chain.endpoint, &stack)?;
                }
                None => visit(method, &full_route, handler, &middlewares)?,
            }
        }
    }

    Ok(())
}
