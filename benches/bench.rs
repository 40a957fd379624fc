use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hyper::{Body, Request, Response};
use trellis::{Mux, RouteContext};

static ROUTES: &[&str] = &[
    "/",
    "/signin",
    "/signout",
    "/about",
    "/contact",
    "/legal/terms",
    "/legal/privacy",
    "/articles",
    "/articles/{id}",
    "/articles/{id}/comments",
    "/articles/{id}/comments/{cid}",
    "/articles/{id}/related",
    "/articles/search",
    "/users",
    "/users/{userID}",
    "/users/{userID}/profile",
    "/users/{userID}/posts",
    "/users/{userID}/posts/{postID}",
    "/users/{userID}/followers",
    "/teams/{teamID}/members/{memberID}",
    "/orgs/{orgID}/repos/{repoID}/issues/{issueID}",
    "/repos/{owner}/{repo}",
    "/repos/{owner}/{repo}/tags",
    "/repos/{owner}/{repo}/branches/{branch}",
    "/releases/{version:[0-9]+\\.[0-9]+\\.[0-9]+}",
    "/files/*",
    "/static/assets/*",
];

static PATHS: &[&str] = &[
    "/",
    "/signin",
    "/about",
    "/legal/privacy",
    "/articles",
    "/articles/1908",
    "/articles/1908/comments",
    "/articles/1908/comments/42",
    "/articles/search",
    "/users/jane",
    "/users/jane/posts/99",
    "/teams/ops/members/7",
    "/orgs/acme/repos/site/issues/5",
    "/repos/acme/site",
    "/repos/acme/site/branches/main",
    "/releases/1.12.3",
    "/files/images/logo.png",
    "/static/assets/app/main.css",
];

fn router() -> Mux {
    let r = Mux::new();
    for route in ROUTES {
        r.get(route, |_req: Request<Body>| async {
            Ok(Response::new(Body::empty()))
        });
    }
    r
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("insert routes", |b| {
        b.iter(|| black_box(router()));
    });
}

fn bench_find(c: &mut Criterion) {
    let r = router();
    let mut rctx = RouteContext::new();

    c.bench_function("find routes", |b| {
        b.iter(|| {
            for path in black_box(PATHS) {
                rctx.reset();
                assert!(r.match_route(&mut rctx, "GET", path), "{}", path);
            }
        });
    });
}

criterion_group!(benches, bench_insert, bench_find);
criterion_main!(benches);
