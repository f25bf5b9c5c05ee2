//! muster-proxy — consistent-hash reverse router.
//!
//! Forwards inbound HTTP requests to a backend chosen by hashing the
//! request path over the current node set. Requests stream through
//! unmodified; backend failures surface as gateway errors. No retry
//! logic lives here — placement-level retries belong to the placer.

pub mod router;

pub use router::{ProxyError, ReverseRouter};
