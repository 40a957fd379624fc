//! Optional middlewares that compose with the router through its public
//! surface: the routing-context overrides, look-ahead matching, and
//! request extensions.

mod get_head;
mod heartbeat;
mod no_cache;
mod request_id;
mod strip;

pub use get_head::get_head;
pub use heartbeat::heartbeat;
pub use no_cache::no_cache;
pub use request_id::{get_request_id, request_id, RequestId};
pub use strip::{redirect_slashes, strip_slashes};
