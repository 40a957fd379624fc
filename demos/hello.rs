use hyper::{Body, Request, Response};
use trellis::Mux;

async fn index(_: Request<Body>) -> Result<Response<Body>, hyper::Error> {
    Ok(Response::new(Body::from("hello, world\n")))
}

async fn hello(req: Request<Body>) -> Result<Response<Body>, hyper::Error> {
    let name = trellis::url_param(&req, "name").unwrap_or_default();
    Ok(Response::new(Body::from(format!("hello, {}\n", name))))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let r = Mux::new();
    r.get("/", index);
    r.get("/hello/{name}", hello);

    let addr = ([127, 0, 0, 1], 3000).into();
    println!("listening on http://{}", addr);

    if let Err(err) = hyper::Server::bind(&addr).serve(r.into_service()).await {
        eprintln!("server error: {}", err);
    }
}
