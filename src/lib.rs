#![deny(rust_2018_idioms)]

//! A composable HTTP request multiplexer: given an incoming request, it
//! selects the registered handler whose pattern matches, captures any
//! embedded path parameters, and dispatches through a user-composed
//! middleware chain. It embeds in a host `hyper` server and owns no
//! listening socket.
//!
//! ```
//! use hyper::{Body, Request, Response};
//! use trellis::Mux;
//!
//! let r = Mux::new();
//! r.get("/users/{id}", |req: Request<Body>| async move {
//!     let id = trellis::url_param(&req, "id").unwrap_or_default();
//!     Ok(Response::new(Body::from(id)))
//! });
//! ```
//!
//! ### Patterns
//!
//! A routing pattern begins with `/` and concatenates segments of four
//! kinds:
//!
//! ```text
//! Syntax            Kind
//! /home             static literal
//! /{user}           named parameter, matches up to the next delimiter
//! /{id:[0-9]+}      regex-constrained parameter
//! /files/*          catch-all, matches the entire remainder
//! ```
//!
//! Routes live in a compressing radix trie whose nodes group children by
//! segment kind. Matching tries the groups in a fixed order, which makes
//! tie-breaking deterministic: a static literal always beats a
//! parameterized alternative for the same bytes, and parameters beat
//! catch-alls. Parameter values are captured into a pooled per-request
//! routing context and read back with [`url_param`].
//!
//! ### Middleware and composition
//!
//! A middleware takes the next handler and returns a wrapping handler.
//! [`Mux::use_middleware`] applies one to every route; [`Mux::with`] and
//! [`Mux::group`] build inline chains for a subset of routes over the
//! same tree; [`Mux::route`] and [`Mux::mount`] stitch whole sub-routers
//! in under a prefix, rewriting the routing path as the match crosses the
//! mount point.
//!
//! The expected lifecycle is construct, register, serve: routes and
//! middlewares are registered at startup, then the router serves without
//! further mutation.

mod chain;
mod context;
mod handler;
mod method;
pub mod middleware;
mod mux;
mod service;
mod tree;
mod walk;

pub use chain::{chain, middleware_fn, ChainHandler, Middleware, Middlewares};
pub use context::{route_context, url_param, RouteContext, RouteCtx, RouteParams};
pub use handler::{handler_fn, BoxedHandler, Handler, HandlerFuture};
pub use method::register_method;
pub use mux::Mux;
pub use service::{MakeRouterService, RouterService};
pub use tree::Route;
pub use walk::{walk, WalkError};
