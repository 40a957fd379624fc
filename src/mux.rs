//! `Mux` is the HTTP route multiplexer: it owns the routing trie, the
//! middleware stack and the context pool, and dispatches each request to
//! the matching handler. Sub-routers created by [`Mux::with`],
//! [`Mux::group`], [`Mux::route`] and [`Mux::mount`] compose into the same
//! tree.
//!
//! The expected lifecycle is construct, register, then serve. Registration
//! is not meant to run concurrently with serving; once the mux computes
//! its terminal handler, further [`Mux::use_middleware`] calls panic.

use crate::chain::{compose, Middleware, Middlewares};
use crate::context::{route_context, ContextPool, RouteContext, RouteCtx};
use crate::handler::{BoxedHandler, Handler, HandlerFuture};
use crate::method::{self, MethodKind, M_CONNECT, M_DELETE, M_GET, M_HEAD, M_OPTIONS, M_PATCH,
    M_POST, M_PUT, M_STUB, M_TRACE};
use crate::tree::{Node, Route};
use hyper::{Body, Request, Response, StatusCode};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
    Weak};

/// An HTTP request multiplexer over a multi-segment radix trie.
///
/// `Mux` is a cheap-to-clone handle; clones share the same routing state.
///
/// ```
/// use hyper::{Body, Request, Response};
/// use trellis::Mux;
///
/// let r = Mux::new();
/// r.get("/hello/{name}", |req: Request<Body>| async move {
///     let name = trellis::url_param(&req, "name").unwrap_or_default();
///     Ok(Response::new(Body::from(format!("hello, {}", name))))
/// });
/// ```
#[derive(Clone)]
pub struct Mux {
    inner: Arc<MuxInner>,
}

struct MuxInner {
    /// The radix trie, shared with inline children.
    tree: Arc<RwLock<Node>>,

    /// Routing context pool, shared with inline children. Only the
    /// outermost mux acquires and releases.
    pool: Arc<ContextPool>,

    /// Computed handler: the middleware stack composed around the routing
    /// step. Present once the first route is registered.
    handler: RwLock<Option<BoxedHandler>>,

    /// The middleware stack.
    middlewares: Mutex<Vec<Middleware>>,

    not_found: RwLock<Option<BoxedHandler>>,
    method_not_allowed: RwLock<Option<BoxedHandler>>,

    /// Whether this mux is an inline group within another mux, sharing its
    /// trie.
    inline: bool,

    /// Back-link to the parent of an inline mux, used only for 404/405
    /// propagation.
    parent: Option<Weak<MuxInner>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for Mux {
    fn default() -> Mux {
        Mux::new()
    }
}

impl Mux {
    /// Returns an empty router.
    pub fn new() -> Mux {
        Mux {
            inner: Arc::new(MuxInner {
                tree: Arc::new(RwLock::new(Node::default())),
                pool: Arc::new(ContextPool::new()),
                handler: RwLock::new(None),
                middlewares: Mutex::new(Vec::new()),
                not_found: RwLock::new(None),
                method_not_allowed: RwLock::new(None),
                inline: false,
                parent: None,
            }),
        }
    }

    /// Serves one request: resolves the handler for its method and path
    /// and runs it inside the middleware stack.
    pub async fn serve(&self, mut req: Request<Body>) -> Result<Response<Body>, hyper::Error> {
        let handler_opt = read(&self.inner.handler).clone();
        let handler = match handler_opt {
            Some(handler) => handler,
            // no routes were ever registered on this mux
            None => return self.not_found_handler().call(req).await,
        };

        // when a parent mux already carries the routing context, reuse it
        // instead of acquiring another one
        if req.extensions().get::<RouteCtx>().is_some() {
            return handler.call(req).await;
        }

        let rctx = self.inner.pool.get();
        {
            let mut ctx = rctx.lock();
            ctx.reset();
            ctx.routes = Some(self.clone());
        }
        req.extensions_mut().insert(rctx.clone());

        let res = handler.call(req).await;
        self.inner.pool.put(rctx);
        res
    }

    /// Appends a middleware to the stack. Middlewares run before routing,
    /// in registration order, so they can respond early, reroute, or set
    /// request-scoped values.
    ///
    /// Panics when called after a route has been registered on this mux.
    pub fn use_middleware<M>(&self, middleware: M)
    where
        M: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
    {
        if read(&self.inner.handler).is_some() {
            panic!("trellis: all middlewares must be defined before routes on a mux");
        }
        lock(&self.inner.middlewares).push(Arc::new(middleware));
    }

    /// Returns an inline child mux sharing this mux's trie, with
    /// `middleware` appended to the inherited stack. Routes registered on
    /// the child are wrapped in the full chain before insertion.
    pub fn with<M>(&self, middleware: M) -> Mux
    where
        M: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
    {
        self.child(vec![Arc::new(middleware) as Middleware])
    }

    /// Adds a fresh inline child along the current routing path, with its
    /// own middleware stack, and applies `f` to it.
    pub fn group<F>(&self, f: F) -> Mux
    where
        F: FnOnce(&Mux),
    {
        let inline = self.child(Vec::new());
        f(&inline);
        inline
    }

    /// Creates a new mux, applies `f` to it, and mounts it at `pattern`.
    pub fn route<F>(&self, pattern: &str, f: F) -> Mux
    where
        F: FnOnce(&Mux),
    {
        let sub = Mux::new();
        f(&sub);
        self.mount(pattern, sub.clone());
        sub
    }

    /// Attaches `handler` as a sub-tree under `pattern`. Mounting installs
    /// a wildcard under the pattern that rewrites the routing path and
    /// continues routing in `handler`, which is usually another `Mux`.
    ///
    /// Panics if a handler is already mounted on `pattern`.
    pub fn mount<H>(&self, pattern: &str, handler: H)
    where
        H: Handler + 'static,
    {
        self.mount_boxed(pattern, Arc::new(handler));
    }

    fn mount_boxed(&self, pattern: &str, handler: BoxedHandler) {
        // refuse overlapping mounts on the same prefix
        {
            let tree = read(&self.inner.tree);
            if tree.find_pattern(&format!("{}*", pattern))
                || tree.find_pattern(&format!("{}/*", pattern))
            {
                panic!(
                    "trellis: attempting to mount a handler on an existing path, '{}'",
                    pattern
                );
            }
        }

        // hand this mux's 404/405 handlers down to sub-routers without
        // their own
        if let Some(sub) = handler.sub_routes() {
            if read(&sub.inner.not_found).is_none() {
                if let Some(h) = read(&self.inner.not_found).clone() {
                    sub.set_not_found(h);
                }
            }
            if read(&sub.inner.method_not_allowed).is_none() {
                if let Some(h) = read(&self.inner.method_not_allowed).clone() {
                    sub.set_method_not_allowed(h);
                }
            }
        }

        tracing::trace!(pattern, "mounting sub-router");

        let delegate = handler.clone();
        let mount_handler: BoxedHandler = Arc::new(move |req: Request<Body>| {
            let delegate = delegate.clone();
            Box::pin(async move {
                if let Some(rctx) = route_context(&req) {
                    let mut ctx = rctx.lock();
                    // shift the routing path past this mount point
                    ctx.route_path = next_route_path(&ctx);
                    // blank the connecting wildcard capture so the
                    // sub-router's own params stand alone
                    let n = ctx.url_params.keys.len();
                    if n > 0
                        && ctx.url_params.keys[n - 1] == "*"
                        && ctx.url_params.values.len() >= n
                    {
                        ctx.url_params.values[n - 1] = String::new();
                    }
                }
                delegate.call(req).await
            }) as HandlerFuture
        });

        let all = method::all_methods();
        let mut pattern = pattern.to_string();
        if pattern.is_empty() || !pattern.ends_with('/') {
            self.add_route(all | M_STUB, &pattern, mount_handler.clone(), None);
            self.add_route(all | M_STUB, &format!("{}/", pattern), mount_handler.clone(), None);
            pattern.push('/');
        }

        let sub = handler.sub_routes().cloned();
        let mut mask = all;
        if sub.is_some() {
            mask = mask | M_STUB;
        }
        self.add_route(mask, &format!("{}*", pattern), mount_handler, sub);
    }

    /// Installs `handler` at `pattern` for every HTTP method.
    pub fn handle<H>(&self, pattern: &str, handler: H)
    where
        H: Handler + 'static,
    {
        self.add_route(method::all_methods(), pattern, Arc::new(handler), None);
    }

    /// Installs `handler` at `pattern` for the named HTTP method.
    ///
    /// Panics when `method` is not a recognized method name; see
    /// [`register_method`](crate::register_method).
    pub fn method<H>(&self, method: &str, pattern: &str, handler: H)
    where
        H: Handler + 'static,
    {
        let kind = match method::method_kind(&method.to_uppercase()) {
            Some(kind) => kind,
            None => panic!("trellis: '{}' http method is not supported", method),
        };
        self.add_route(kind, pattern, Arc::new(handler), None);
    }

    pub fn connect<H: Handler + 'static>(&self, pattern: &str, handler: H) {
        self.add_route(M_CONNECT, pattern, Arc::new(handler), None);
    }

    pub fn delete<H: Handler + 'static>(&self, pattern: &str, handler: H) {
        self.add_route(M_DELETE, pattern, Arc::new(handler), None);
    }

    pub fn get<H: Handler + 'static>(&self, pattern: &str, handler: H) {
        self.add_route(M_GET, pattern, Arc::new(handler), None);
    }

    pub fn head<H: Handler + 'static>(&self, pattern: &str, handler: H) {
        self.add_route(M_HEAD, pattern, Arc::new(handler), None);
    }

    pub fn options<H: Handler + 'static>(&self, pattern: &str, handler: H) {
        self.add_route(M_OPTIONS, pattern, Arc::new(handler), None);
    }

    pub fn patch<H: Handler + 'static>(&self, pattern: &str, handler: H) {
        self.add_route(M_PATCH, pattern, Arc::new(handler), None);
    }

    pub fn post<H: Handler + 'static>(&self, pattern: &str, handler: H) {
        self.add_route(M_POST, pattern, Arc::new(handler), None);
    }

    pub fn put<H: Handler + 'static>(&self, pattern: &str, handler: H) {
        self.add_route(M_PUT, pattern, Arc::new(handler), None);
    }

    pub fn trace<H: Handler + 'static>(&self, pattern: &str, handler: H) {
        self.add_route(M_TRACE, pattern, Arc::new(handler), None);
    }

    /// Overrides the handler invoked when no route matches. The override
    /// propagates into mounted sub-routers that have not set their own.
    pub fn not_found<H>(&self, handler: H)
    where
        H: Handler + 'static,
    {
        self.set_not_found(Arc::new(handler));
    }

    /// Overrides the handler invoked when a route matches the path but not
    /// the method. Propagates like [`Mux::not_found`].
    pub fn method_not_allowed<H>(&self, handler: H)
    where
        H: Handler + 'static,
    {
        self.set_method_not_allowed(Arc::new(handler));
    }

    /// Resolves `(method, path)` against the routing tree without
    /// dispatching, following mounted sub-routers. The context records the
    /// state of the match; reuse one carefully or start from
    /// [`RouteContext::new`].
    pub fn match_route(&self, rctx: &mut RouteContext, method: &str, path: &str) -> bool {
        let kind = match method::method_kind(method) {
            Some(kind) => kind,
            None => return false,
        };

        let found = { read(&self.inner.tree).find_route(rctx, kind, path) };
        match found {
            Some(found) => {
                if let Some(sub) = &found.sub_routes {
                    rctx.route_path = next_route_path(rctx);
                    let next = rctx.route_path.clone();
                    return sub.match_route(rctx, method, &next);
                }
                found.handler.is_some()
            }
            None => false,
        }
    }

    /// Returns routing information for every leaf in the tree.
    pub fn routes(&self) -> Vec<Route> {
        read(&self.inner.tree).routes()
    }

    /// Returns the registered middleware stack.
    pub fn middlewares(&self) -> Middlewares {
        Middlewares(lock(&self.inner.middlewares).clone())
    }

    /// The configured or default 404 responder.
    pub fn not_found_handler(&self) -> BoxedHandler {
        match read(&self.inner.not_found).clone() {
            Some(handler) => handler,
            None => Arc::new(default_not_found),
        }
    }

    /// The configured or default 405 responder.
    pub fn method_not_allowed_handler(&self) -> BoxedHandler {
        match read(&self.inner.method_not_allowed).clone() {
            Some(handler) => handler,
            None => Arc::new(default_method_not_allowed),
        }
    }

    fn child(&self, appended: Vec<Middleware>) -> Mux {
        // a mux handler must be computed at this point, as additional
        // middleware registration on this stack is no longer allowed
        if !self.inner.inline && read(&self.inner.handler).is_none() {
            self.update_route_handler();
        }

        // inline children inherit the parent's inline stack
        let mut middlewares = if self.inner.inline {
            lock(&self.inner.middlewares).clone()
        } else {
            Vec::new()
        };
        middlewares.extend(appended);

        Mux {
            inner: Arc::new(MuxInner {
                tree: self.inner.tree.clone(),
                pool: self.inner.pool.clone(),
                handler: RwLock::new(None),
                middlewares: Mutex::new(middlewares),
                not_found: RwLock::new(read(&self.inner.not_found).clone()),
                method_not_allowed: RwLock::new(read(&self.inner.method_not_allowed).clone()),
                inline: true,
                parent: Some(Arc::downgrade(&self.inner)),
            }),
        }
    }

    /// Registers `handler` in the routing tree for the given method mask.
    fn add_route(
        &self,
        method: MethodKind,
        pattern: &str,
        handler: BoxedHandler,
        sub_routes: Option<Mux>,
    ) {
        if !pattern.starts_with('/') {
            panic!("trellis: routing pattern must begin with '/' in '{}'", pattern);
        }

        if !self.inner.inline && read(&self.inner.handler).is_none() {
            self.update_route_handler();
        }

        // endpoints of an inline mux are wrapped in its chain up front
        let handler = if self.inner.inline {
            *write(&self.inner.handler) = Some(self.route_http_handler());
            Middlewares(lock(&self.inner.middlewares).clone()).handler(handler)
        } else {
            handler
        };

        tracing::trace!(pattern, "inserting route");
        write(&self.inner.tree).insert_route(method, pattern, handler, sub_routes);
    }

    /// The terminal routing step: looks up the handler for the request and
    /// invokes it, or falls back to the 404/405 responders.
    async fn route_http(&self, req: Request<Body>) -> Result<Response<Body>, hyper::Error> {
        let rctx = match route_context(&req) {
            Some(rctx) => rctx,
            None => return self.not_found_handler().call(req).await,
        };

        let (route_path, route_method) = {
            let mut ctx = rctx.lock();
            let path = if !ctx.route_path.is_empty() {
                ctx.route_path.clone()
            } else {
                let path = req.uri().path();
                if path.is_empty() {
                    "/".to_string()
                } else {
                    path.to_string()
                }
            };
            if ctx.route_method.is_empty() {
                ctx.route_method = req.method().as_str().to_string();
            }
            (path, ctx.route_method.clone())
        };

        let method = match method::method_kind(&route_method) {
            Some(method) => method,
            None => return self.method_not_allowed_handler().call(req).await,
        };

        let found = {
            let tree = read(&self.inner.tree);
            let mut ctx = rctx.lock();
            tree.find_route(&mut ctx, method, &route_path)
        };

        if let Some(handler) = found.and_then(|f| f.handler) {
            return handler.call(req).await;
        }
        let method_not_allowed = rctx.lock().method_not_allowed;
        if method_not_allowed {
            self.method_not_allowed_handler().call(req).await
        } else {
            self.not_found_handler().call(req).await
        }
    }

    /// Boxes the routing step, holding the mux weakly so the tree does not
    /// own its own dispatcher.
    fn route_http_handler(&self) -> BoxedHandler {
        let inner = Arc::downgrade(&self.inner);
        Arc::new(move |req: Request<Body>| {
            let inner = inner.clone();
            Box::pin(async move {
                match inner.upgrade() {
                    Some(inner) => Mux { inner }.route_http(req).await,
                    None => default_not_found(req).await,
                }
            }) as HandlerFuture
        })
    }

    /// Builds the single computed handler: the middleware stack from
    /// `use_middleware` composed around the routing step. From this point
    /// on the stack of this mux is frozen.
    fn update_route_handler(&self) {
        let middlewares = lock(&self.inner.middlewares).clone();
        *write(&self.inner.handler) = Some(compose(&middlewares, self.route_http_handler()));
    }

    fn set_not_found(&self, handler: BoxedHandler) {
        let (target, handler) = self.propagation_target(handler);
        *write(&target.inner.not_found) = Some(handler.clone());
        target.for_sub_routers(&mut |sub| {
            if read(&sub.inner.not_found).is_none() {
                sub.set_not_found(handler.clone());
            }
        });
    }

    fn set_method_not_allowed(&self, handler: BoxedHandler) {
        let (target, handler) = self.propagation_target(handler);
        *write(&target.inner.method_not_allowed) = Some(handler.clone());
        target.for_sub_routers(&mut |sub| {
            if read(&sub.inner.method_not_allowed).is_none() {
                sub.set_method_not_allowed(handler.clone());
            }
        });
    }

    /// An inline mux installs fallback handlers on its parent, wrapped in
    /// the inline chain.
    fn propagation_target(&self, handler: BoxedHandler) -> (Mux, BoxedHandler) {
        if self.inner.inline {
            if let Some(parent) = self.inner.parent.as_ref().and_then(Weak::upgrade) {
                let wrapped =
                    Middlewares(lock(&self.inner.middlewares).clone()).handler(handler);
                return (Mux { inner: parent }, wrapped);
            }
        }
        (self.clone(), handler)
    }

    fn for_sub_routers(&self, f: &mut dyn FnMut(&Mux)) {
        for route in self.routes() {
            if let Some(sub) = &route.sub_routes {
                f(sub);
            }
        }
    }
}

impl Handler for Mux {
    fn call(&self, req: Request<Body>) -> HandlerFuture {
        let mux = self.clone();
        Box::pin(async move { mux.serve(req).await })
    }

    fn sub_routes(&self) -> Option<&Mux> {
        Some(self)
    }
}

/// The routing path a mounted sub-router should continue from, recovered
/// from the connecting wildcard capture.
fn next_route_path(ctx: &RouteContext) -> String {
    if let Some(last) = ctx.route_params.keys.len().checked_sub(1) {
        if ctx.route_params.keys[last] == "*" && ctx.route_params.values.len() > last {
            return format!("/{}", ctx.route_params.values[last]);
        }
    }
    "/".to_string()
}

async fn default_not_found(_req: Request<Body>) -> Result<Response<Body>, hyper::Error> {
    tracing::debug!("no route matched");
    let mut res = Response::new(Body::from("404 page not found\n"));
    *res.status_mut() = StatusCode::NOT_FOUND;
    Ok(res)
}

async fn default_method_not_allowed(_req: Request<Body>) -> Result<Response<Body>, hyper::Error> {
    tracing::debug!("route matched but method did not");
    let mut res = Response::new(Body::empty());
    *res.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
    Ok(res)
}
