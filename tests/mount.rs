use hyper::{Body, Request, Response, StatusCode};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use trellis::{handler_fn, BoxedHandler, HandlerFuture, Mux};

fn request(method: &str, path: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

async fn send(r: &Mux, method: &str, path: &str) -> (StatusCode, String) {
    let res = r.serve(request(method, path)).await.unwrap();
    let status = res.status();
    let body = hyper::body::to_bytes(res.into_body()).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn text(body: &'static str) -> BoxedHandler {
    handler_fn(move |_req: Request<Body>| async move {
        Ok(Response::new(Body::from(body)))
    })
}

/// Middleware that appends `name` to a marker list carried in the request
/// extensions.
#[derive(Clone, Default)]
struct Trail(Vec<&'static str>);

fn push_trail(name: &'static str) -> impl Fn(BoxedHandler) -> BoxedHandler {
    move |next: BoxedHandler| {
        Arc::new(move |mut req: Request<Body>| {
            let next = next.clone();
            let mut trail = req.extensions().get::<Trail>().cloned().unwrap_or_default();
            trail.0.push(name);
            req.extensions_mut().insert(trail);
            Box::pin(async move { next.call(req).await }) as HandlerFuture
        }) as BoxedHandler
    }
}

fn trail_of(req: &Request<Body>) -> String {
    req.extensions()
        .get::<Trail>()
        .map(|trail| trail.0.join(","))
        .unwrap_or_default()
}

#[tokio::test]
async fn mounting_shares_parent_params() {
    let shares = Mux::new();
    shares.get("/{hash}", |req: Request<Body>| async move {
        let hash = trellis::url_param(&req, "hash").unwrap_or_default();
        Ok(Response::new(Body::from(format!("/{}", hash))))
    });
    shares.route("/{hash}/share", |share| {
        share.get("/", |req: Request<Body>| async move {
            let hash = trellis::url_param(&req, "hash").unwrap_or_default();
            Ok(Response::new(Body::from(format!("/{}/share", hash))))
        });
        share.get("/{network}", |req: Request<Body>| async move {
            let hash = trellis::url_param(&req, "hash").unwrap_or_default();
            let network = trellis::url_param(&req, "network").unwrap_or_default();
            Ok(Response::new(Body::from(format!("/{}/share/{}", hash, network))))
        });
    });

    let m = Mux::new();
    m.mount("/sharing", shares);

    assert_eq!(
        send(&m, "GET", "/sharing/aBc").await,
        (StatusCode::OK, "/aBc".to_string())
    );
    assert_eq!(
        send(&m, "GET", "/sharing/aBc/share").await,
        (StatusCode::OK, "/aBc/share".to_string())
    );
    assert_eq!(
        send(&m, "GET", "/sharing/aBc/share/twitter").await,
        (StatusCode::OK, "/aBc/share/twitter".to_string())
    );
}

#[tokio::test]
async fn mount_handles_both_trailing_slash_forms() {
    let r = Mux::new();
    r.not_found(|_req: Request<Body>| async {
        let mut res = Response::new(Body::from("nothing here"));
        *res.status_mut() = StatusCode::NOT_FOUND;
        Ok(res)
    });

    let sub = Mux::new();
    sub.get("/", |req: Request<Body>| async move {
        let account = trellis::url_param(&req, "accountID").unwrap_or_default();
        Ok(Response::new(Body::from(account)))
    });

    r.mount("/accounts/{accountID}", sub);

    assert_eq!(
        send(&r, "GET", "/accounts/admin").await,
        (StatusCode::OK, "admin".to_string())
    );
    assert_eq!(
        send(&r, "GET", "/accounts/admin/").await,
        (StatusCode::OK, "admin".to_string())
    );
    assert_eq!(
        send(&r, "GET", "/nothing-here").await,
        (StatusCode::NOT_FOUND, "nothing here".to_string())
    );
}

#[tokio::test]
async fn not_found_propagates_into_sub_routers() {
    let r = Mux::new();
    r.use_middleware(push_trail("mw"));
    r.get("/hi", text("bye"));
    r.with(push_trail("with"))
        .not_found(|req: Request<Body>| async move {
            let mut res = Response::new(Body::from(format!("root 404 {}", trail_of(&req))));
            *res.status_mut() = StatusCode::NOT_FOUND;
            Ok(res)
        });

    let sr1 = Mux::new();
    sr1.get("/sub", text("sub"));
    sr1.group(|group| {
        group.use_middleware(push_trail("mw2"));
        group.not_found(|req: Request<Body>| async move {
            let mut res = Response::new(Body::from(format!("sub 404 {}", trail_of(&req))));
            *res.status_mut() = StatusCode::NOT_FOUND;
            Ok(res)
        });
    });

    let sr2 = Mux::new();
    sr2.get("/sub", text("sub2"));

    r.mount("/admin1", sr1);
    r.mount("/admin2", sr2);

    assert_eq!(send(&r, "GET", "/hi").await, (StatusCode::OK, "bye".to_string()));
    assert_eq!(
        send(&r, "GET", "/nothing-here").await,
        (StatusCode::NOT_FOUND, "root 404 mw,with".to_string())
    );
    assert_eq!(
        send(&r, "GET", "/admin1/sub").await,
        (StatusCode::OK, "sub".to_string())
    );
    assert_eq!(
        send(&r, "GET", "/admin1/nope").await,
        (StatusCode::NOT_FOUND, "sub 404 mw,mw2".to_string())
    );
    assert_eq!(
        send(&r, "GET", "/admin2/sub").await,
        (StatusCode::OK, "sub2".to_string())
    );

    // sub-routers without their own handler bubble up to the root's
    assert_eq!(
        send(&r, "GET", "/admin2/nope").await,
        (StatusCode::NOT_FOUND, "root 404 mw,with".to_string())
    );
}

#[tokio::test]
async fn method_not_allowed_propagates_into_sub_routers() {
    let r = Mux::new();
    r.get("/root", text("root"));
    r.method_not_allowed(|_req: Request<Body>| async {
        let mut res = Response::new(Body::from("root 405"));
        *res.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
        Ok(res)
    });

    let sr1 = Mux::new();
    sr1.get("/sub1", text("sub1"));
    sr1.method_not_allowed(|_req: Request<Body>| async {
        let mut res = Response::new(Body::from("sub1 405"));
        *res.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
        Ok(res)
    });

    let sr2 = Mux::new();
    sr2.get("/sub2", text("sub2"));

    let path_var = Mux::new();
    path_var.get("/{var}", text("pv"));
    path_var.method_not_allowed(|_req: Request<Body>| async {
        let mut res = Response::new(Body::from("pv 405"));
        *res.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
        Ok(res)
    });

    r.mount("/prefix1", sr1);
    r.mount("/prefix2", sr2);
    r.mount("/pathVar", path_var);

    assert_eq!(send(&r, "GET", "/root").await, (StatusCode::OK, "root".to_string()));
    assert_eq!(
        send(&r, "PUT", "/root").await,
        (StatusCode::METHOD_NOT_ALLOWED, "root 405".to_string())
    );
    assert_eq!(
        send(&r, "GET", "/prefix1/sub1").await,
        (StatusCode::OK, "sub1".to_string())
    );
    assert_eq!(
        send(&r, "PUT", "/prefix1/sub1").await,
        (StatusCode::METHOD_NOT_ALLOWED, "sub1 405".to_string())
    );
    assert_eq!(
        send(&r, "GET", "/prefix2/sub2").await,
        (StatusCode::OK, "sub2".to_string())
    );
    assert_eq!(
        send(&r, "PUT", "/prefix2/sub2").await,
        (StatusCode::METHOD_NOT_ALLOWED, "root 405".to_string())
    );
    assert_eq!(
        send(&r, "GET", "/pathVar/myvar").await,
        (StatusCode::OK, "pv".to_string())
    );
    assert_eq!(
        send(&r, "DELETE", "/pathVar/myvar").await,
        (StatusCode::METHOD_NOT_ALLOWED, "pv 405".to_string())
    );
}

#[tokio::test]
async fn sub_router_observes_the_full_pattern_trail() {
    let api = Mux::new();
    api.get("/ping", |req: Request<Body>| async move {
        let pattern = trellis::route_context(&req)
            .map(|rctx| rctx.route_pattern())
            .unwrap_or_default();
        assert_eq!(pattern, "/api/ping");
        Ok(Response::new(Body::from("pong")))
    });

    let r = Mux::new();
    r.mount("/api", api);

    assert_eq!(
        send(&r, "GET", "/api/ping").await,
        (StatusCode::OK, "pong".to_string())
    );
}

#[tokio::test]
async fn nested_mounts_record_every_pattern_fragment() {
    let hubs = Mux::new();
    hubs.get("/hubs/{hubID}/view", text("hub1"));
    hubs.get("/hubs/{hubID}/view/*", text("hub2"));

    let users = Mux::new();
    users.get("/", text("hub3"));
    hubs.mount("/hubs/{hubID}/users", users);
    hubs.get("/hubs/{hubID}/users/", text("hub3 override"));

    let accounts = Mux::new();
    accounts.get("/", text("account1"));
    accounts.get("/hi", text("account2"));

    hubs.route("/accounts/{accountID}", |route| {
        route.get("/", text("account1 direct"));
        route.mount("/", accounts);
    });

    assert_eq!(
        send(&hubs, "GET", "/hubs/123/view").await,
        (StatusCode::OK, "hub1".to_string())
    );
    assert_eq!(
        send(&hubs, "GET", "/hubs/123/view/index.html").await,
        (StatusCode::OK, "hub2".to_string())
    );
    assert_eq!(
        send(&hubs, "GET", "/hubs/123/users").await,
        (StatusCode::OK, "hub3".to_string())
    );
    assert_eq!(
        send(&hubs, "GET", "/hubs/123/users/").await,
        (StatusCode::OK, "hub3 override".to_string())
    );
    assert_eq!(
        send(&hubs, "GET", "/accounts/44").await,
        (StatusCode::OK, "account1 direct".to_string())
    );
    assert_eq!(
        send(&hubs, "GET", "/accounts/44/hi").await,
        (StatusCode::OK, "account2".to_string())
    );

    // drive the request with a caller-owned context and inspect the trail
    let rctx = trellis::RouteCtx::new();
    let mut req = request("GET", "/accounts/44/hi");
    req.extensions_mut().insert(rctx.clone());

    let res = hubs.serve(req).await.unwrap();
    let body = hyper::body::to_bytes(res.into_body()).await.unwrap();
    assert_eq!(&body[..], b"account2");

    let patterns = rctx.lock().route_patterns.clone();
    assert_eq!(
        patterns,
        vec!["/accounts/{accountID}/*", "/*", "/hi"],
    );
}

#[tokio::test]
async fn shadowed_param_names_resolve_to_the_closest_capture() {
    let r = Mux::new();
    r.route("/{id}", |outer| {
        outer.get("/u/{id}", |req: Request<Body>| async move {
            let id = trellis::url_param(&req, "id").unwrap_or_default();
            Ok(Response::new(Body::from(id)))
        });
    });

    assert_eq!(
        send(&r, "GET", "/outer/u/inner").await,
        (StatusCode::OK, "inner".to_string())
    );
}

#[tokio::test]
async fn groups_isolate_their_middleware() {
    let r = Mux::new();
    r.group(|g1| {
        g1.use_middleware(push_trail("g1"));
        g1.get("/g1", |req: Request<Body>| async move {
            Ok(Response::new(Body::from(trail_of(&req))))
        });
    });
    r.group(|g2| {
        g2.use_middleware(push_trail("g2"));
        g2.get("/g2", |req: Request<Body>| async move {
            Ok(Response::new(Body::from(trail_of(&req))))
        });
    });

    assert_eq!(send(&r, "GET", "/g1").await, (StatusCode::OK, "g1".to_string()));
    assert_eq!(send(&r, "GET", "/g2").await, (StatusCode::OK, "g2".to_string()));
}

#[tokio::test]
async fn nested_groups_stack_middleware() {
    let counter_handler = |req: Request<Body>| async move {
        let count = req
            .extensions()
            .get::<Trail>()
            .map(|trail| trail.0.len())
            .unwrap_or(0);
        Ok(Response::new(Body::from(count.to_string())))
    };

    let r = Mux::new();
    r.get("/0", counter_handler);
    r.group(|g| {
        g.use_middleware(push_trail("+"));
        g.get("/1", counter_handler);
        g.with(push_trail("+")).get("/2", counter_handler);

        g.group(|gg| {
            gg.use_middleware(push_trail("+"));
            gg.use_middleware(push_trail("+"));
            gg.get("/3", counter_handler);
        });

        g.route("/", |sub| {
            sub.use_middleware(push_trail("+"));
            sub.use_middleware(push_trail("+"));
            sub.with(push_trail("+")).get("/4", counter_handler);

            sub.group(|sg| {
                sg.use_middleware(push_trail("+"));
                sg.use_middleware(push_trail("+"));
                sg.get("/5", counter_handler);
                sg.with(push_trail("+")).get("/6", counter_handler);
            });
        });
    });

    for expected in ["0", "1", "2", "3", "4", "5", "6"] {
        let path = format!("/{}", expected);
        let (status, body) = send(&r, "GET", &path).await;
        assert_eq!(status, StatusCode::OK, "GET {}", path);
        assert_eq!(body, expected, "GET {}", path);
    }
}

#[tokio::test]
async fn match_route_follows_mounts() {
    let api = Mux::new();
    api.get("/ping", text("pong"));

    let r = Mux::new();
    r.mount("/api", api);

    let mut rctx = trellis::RouteContext::new();
    assert!(r.match_route(&mut rctx, "GET", "/api/ping"));

    let mut rctx = trellis::RouteContext::new();
    assert!(!r.match_route(&mut rctx, "GET", "/api/missing"));
}

#[test]
fn mounting_an_existing_path_panics() {
    let r = Mux::new();
    r.get("/", text("index"));
    r.mount("/hi", text("first"));

    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
        r.mount("/hi", text("second"));
    }));
    assert!(result.is_err());
}
