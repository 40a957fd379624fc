//! Prints the route table of a composed router.

use hyper::{Body, Request, Response};
use trellis::{walk, Mux};

async fn stub(_: Request<Body>) -> Result<Response<Body>, hyper::Error> {
    Ok(Response::new(Body::empty()))
}

fn main() {
    let r = Mux::new();
    r.get("/", stub);
    r.get("/articles/{id}", stub);
    r.post("/articles", stub);

    r.route("/admin", |admin| {
        admin.get("/", stub);
        admin.get("/users", stub);
        admin.delete("/users/{userID}", stub);
    });

    let api = Mux::new();
    api.get("/ping", stub);
    api.get("/files/*", stub);
    r.mount("/api", api);

    walk(&r, |method, route, _handler, middlewares| {
        println!("{:7} {} ({} middlewares)", method, route, middlewares.len());
        Ok(())
    })
    .expect("walk failed");
}
