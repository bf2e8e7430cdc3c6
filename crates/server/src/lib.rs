//! HTTP surface of flowsnap: the holder read API and its middleware stack.

pub mod middleware;
pub mod router;
