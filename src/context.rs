//! Per-request routing state: the parameters captured during trie
//! descent, the pattern trail accumulated across mounted sub-routers, and
//! the overrides middlewares may set to steer the next match. Contexts are
//! pooled by the outermost mux and installed into the request's extensions
//! for the lifetime of the handler.

use crate::mux::Mux;
use hyper::{Body, Request};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Ordered URL routing parameters. `keys` and `values` are parallel; the
/// order matches the order of the path segments that produced them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteParams {
    pub keys: Vec<String>,
    pub values: Vec<String>,
}

impl RouteParams {
    /// Appends a URL parameter to the end of the list.
    pub fn add(&mut self, key: &str, value: &str) {
        self.keys.push(key.to_string());
        self.values.push(value.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn clear(&mut self) {
        self.keys.clear();
        self.values.clear();
    }
}

/// The routing state for a single request.
#[derive(Default)]
pub struct RouteContext {
    /// The router servicing the current request, exposed so middlewares
    /// can look ahead with [`Mux::match_route`].
    pub routes: Option<Mux>,

    /// Overrides the request path for the next match. Middlewares set this
    /// to reroute (trailing-slash stripping, mount handoff).
    pub route_path: String,

    /// Overrides the request method for the next match (HEAD-to-GET
    /// remapping and friends).
    pub route_method: String,

    /// The parameters visible to handlers, accumulated across every
    /// sub-router that matched along the way.
    pub url_params: RouteParams,

    /// Pattern fragments matched at each sub-router level, joined by
    /// [`RouteContext::route_pattern`].
    pub route_patterns: Vec<String>,

    /// The fragment matched at the current sub-router level.
    pub(crate) route_pattern: String,

    /// Capture stack for a single trie descent; rewound when a branch is
    /// abandoned.
    pub(crate) route_params: RouteParams,

    /// Set during traversal when a leaf matched the path but not the
    /// method.
    pub(crate) method_not_allowed: bool,
}

impl RouteContext {
    pub fn new() -> RouteContext {
        RouteContext::default()
    }

    /// Clears all state, retaining allocated capacity for reuse.
    pub fn reset(&mut self) {
        self.routes = None;
        self.route_path.clear();
        self.route_method.clear();
        self.url_params.clear();
        self.route_patterns.clear();
        self.route_pattern.clear();
        self.route_params.clear();
        self.method_not_allowed = false;
    }

    /// Returns the value of the URL parameter `key`. The scan runs from
    /// the tail so the capture closest to the handler wins when nested
    /// routers bind the same name.
    pub fn url_param(&self, key: &str) -> Option<&str> {
        for k in (0..self.url_params.keys.len()).rev() {
            if self.url_params.keys[k] == key {
                return self.url_params.values.get(k).map(String::as_str);
            }
        }
        None
    }

    /// Reconstructs the full routing pattern from the mount trail. A
    /// mounted sub-router records its mount pattern ending in `*`; those
    /// connecting wildcards appear mid-trail as the exact sequence `/*/`
    /// and are collapsed away, while asterisks that are part of literal
    /// path bytes survive.
    pub fn route_pattern(&self) -> String {
        let mut pattern = replace_wildcards(self.route_patterns.concat());
        if pattern != "/" {
            if let Some(stripped) = pattern.strip_suffix("//") {
                pattern = stripped.to_string();
            }
            if let Some(stripped) = pattern.strip_suffix('/') {
                pattern = stripped.to_string();
            }
        }
        pattern
    }
}

/// Collapses every occurrence of the connecting-wildcard sequence `/*/`
/// to `/`, repeating until none remain: adjacent mount markers overlap,
/// so a single replacement pass is not enough.
pub(crate) fn replace_wildcards(mut pattern: String) -> String {
    while pattern.contains("/*/") {
        pattern = pattern.replace("/*/", "/");
    }
    pattern
}

/// A shared handle to the routing context, installed into the request's
/// extensions. Cloning is cheap; the underlying context is single-request
/// and must not be retained past the handler.
#[derive(Clone, Default)]
pub struct RouteCtx(pub(crate) Arc<Mutex<RouteContext>>);

impl RouteCtx {
    pub fn new() -> RouteCtx {
        RouteCtx::default()
    }

    /// Locks the underlying context for inspection or mutation.
    pub fn lock(&self) -> MutexGuard<'_, RouteContext> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the value of the URL parameter `key`, owned.
    pub fn url_param(&self, key: &str) -> Option<String> {
        self.lock().url_param(key).map(str::to_string)
    }

    /// See [`RouteContext::route_pattern`].
    pub fn route_pattern(&self) -> String {
        self.lock().route_pattern()
    }
}

/// Returns the routing context handle carried by `req`, if the request is
/// being served by a mux.
pub fn route_context(req: &Request<Body>) -> Option<RouteCtx> {
    req.extensions().get::<RouteCtx>().cloned()
}

/// Returns the value of the URL parameter `key` for the current request.
pub fn url_param(req: &Request<Body>, key: &str) -> Option<String> {
    route_context(req).and_then(|rctx| rctx.url_param(key))
}

/// The context pool owned by the outermost mux. Inline children share
/// their parent's pool and never release; the mux that acquired a context
/// returns it after the handler completes.
#[derive(Default)]
pub(crate) struct ContextPool {
    contexts: Mutex<Vec<RouteCtx>>,
}

impl ContextPool {
    pub(crate) fn new() -> ContextPool {
        ContextPool::default()
    }

    pub(crate) fn get(&self) -> RouteCtx {
        let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        contexts.pop().unwrap_or_default()
    }

    pub(crate) fn put(&self, rctx: RouteCtx) {
        // a handler kept a clone alive; let this one drop instead of
        // handing out an aliased context later
        if Arc::strong_count(&rctx.0) != 1 {
            return;
        }

        rctx.lock().reset();
        let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        contexts.push(rctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_pattern_elides_connecting_wildcards() {
        let mut x = RouteContext::new();
        x.route_patterns = vec![
            "/v1/*".to_string(),
            "/resources/*".to_string(),
            "/{resource_id}".to_string(),
        ];
        assert_eq!(x.route_pattern(), "/v1/resources/{resource_id}");

        // additional wildcards, depending on how the routers nest
        x.route_patterns = vec![
            "/v1/*".to_string(),
            "/resources/*".to_string(),
            "/*".to_string(),
            "/{resource_id}".to_string(),
        ];
        assert_eq!(x.route_pattern(), "/v1/resources/{resource_id}");

        // trailing wildcard is kept
        x.route_patterns = vec![
            "/v1/*".to_string(),
            "/resources/*".to_string(),
            "/*".to_string(),
            "/*".to_string(),
            "/*".to_string(),
            "/{resource_id}/*".to_string(),
        ];
        assert_eq!(x.route_pattern(), "/v1/resources/{resource_id}/*");
    }

    #[test]
    fn route_pattern_keeps_literal_asterisks() {
        let mut x = RouteContext::new();
        x.route_patterns = vec![
            "/v1/*".to_string(),
            "/resources/*".to_string(),
            "/*special_path/*".to_string(),
            "/with_asterisks*/*".to_string(),
            "/{resource_id}".to_string(),
        ];
        assert_eq!(
            x.route_pattern(),
            "/v1/resources/*special_path/with_asterisks*/{resource_id}"
        );
    }

    #[test]
    fn url_param_last_wins() {
        let mut x = RouteContext::new();
        x.url_params.add("id", "outer");
        x.url_params.add("name", "n");
        x.url_params.add("id", "inner");
        assert_eq!(x.url_param("id"), Some("inner"));
        assert_eq!(x.url_param("name"), Some("n"));
        assert_eq!(x.url_param("missing"), None);
    }

    #[test]
    fn reset_clears_everything() {
        let mut x = RouteContext::new();
        x.route_path = "/x".to_string();
        x.route_method = "GET".to_string();
        x.url_params.add("a", "1");
        x.route_params.add("b", "2");
        x.route_patterns.push("/x".to_string());
        x.route_pattern = "/x".to_string();
        x.method_not_allowed = true;

        x.reset();

        assert!(x.route_path.is_empty());
        assert!(x.route_method.is_empty());
        assert!(x.url_params.is_empty());
        assert!(x.route_params.is_empty());
        assert!(x.route_patterns.is_empty());
        assert!(x.route_pattern.is_empty());
        assert!(!x.method_not_allowed);
        assert!(x.routes.is_none());
    }

    #[test]
    fn pool_returns_clean_contexts() {
        let pool = ContextPool::new();
        let rctx = pool.get();
        rctx.lock().url_params.add("id", "42");
        pool.put(rctx);

        let reused = pool.get();
        let ctx = reused.lock();
        assert!(ctx.url_params.is_empty());
        assert!(ctx.route_patterns.is_empty());
    }

    #[test]
    fn pool_drops_retained_contexts() {
        let pool = ContextPool::new();
        let rctx = pool.get();
        let leaked = rctx.clone();
        pool.put(rctx);
        drop(leaked);

        // nothing was pooled, a fresh context comes back
        let fresh = pool.get();
        assert!(fresh.lock().url_params.is_empty());
    }
}
