//! A small REST-style service: a versioned API sub-router mounted under
//! `/api/v1`, with per-group middleware and URL parameters.

use hyper::{Body, Request, Response, StatusCode};
use trellis::{middleware, Mux};

async fn list_articles(_: Request<Body>) -> Result<Response<Body>, hyper::Error> {
    Ok(Response::new(Body::from("[\"article 1\", \"article 2\"]\n")))
}

async fn get_article(req: Request<Body>) -> Result<Response<Body>, hyper::Error> {
    let id = trellis::url_param(&req, "id").unwrap_or_default();
    let pattern = trellis::route_context(&req)
        .map(|rctx| rctx.route_pattern())
        .unwrap_or_default();
    Ok(Response::new(Body::from(format!(
        "{{\"id\": \"{}\", \"route\": \"{}\"}}\n",
        id, pattern
    ))))
}

async fn create_article(_: Request<Body>) -> Result<Response<Body>, hyper::Error> {
    let mut res = Response::new(Body::from("created\n"));
    *res.status_mut() = StatusCode::CREATED;
    Ok(res)
}

fn api() -> Mux {
    let api = Mux::new();
    api.get("/articles", list_articles);
    api.post("/articles", create_article);
    api.get("/articles/{id:[0-9]+}", get_article);
    api.not_found(|_req: Request<Body>| async {
        let mut res = Response::new(Body::from("{\"error\": \"no such endpoint\"}\n"));
        *res.status_mut() = StatusCode::NOT_FOUND;
        Ok(res)
    });
    api
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let r = Mux::new();
    r.use_middleware(middleware::request_id);
    r.use_middleware(middleware::heartbeat("/ping"));
    r.use_middleware(middleware::get_head);
    r.use_middleware(middleware::strip_slashes);

    r.get("/", |_req: Request<Body>| async {
        Ok(Response::new(Body::from("index\n")))
    });
    r.mount("/api/v1", api());

    let addr = ([127, 0, 0, 1], 3000).into();
    println!("listening on http://{}", addr);

    if let Err(err) = hyper::Server::bind(&addr).serve(r.into_service()).await {
        eprintln!("server error: {}", err);
    }
}
