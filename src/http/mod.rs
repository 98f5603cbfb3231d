// HTTP module.
// Request/response model and the network seam used by the caching strategies.

pub mod client;
pub mod types;

pub use client::{DEFAULT_USER_AGENT, HttpNetwork, Network};
pub use types::{Destination, Method, Request, Response, ResponseSource};
