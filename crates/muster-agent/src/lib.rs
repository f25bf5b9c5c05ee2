//! muster-agent — call admission over remote placement.
//!
//! The LB agent delegates execution to the runner fleet. It pretends
//! to have allocated a slot: `get_call` attaches a `RemoteSlot` whose
//! `exec` performs capacity accounting and placement, so the front end
//! drives a remotely-executing call through the same interface a
//! locally-executing agent exposes.
//!
//! # Architecture
//!
//! ```text
//! front end ── get_call ──► LbAgent ──► delegate (local agent)
//!                              │
//!                              └─ attaches RemoteSlot
//!                                   exec:
//!                                     1. resolve logical group
//!                                     2. CapacityGuard::assign  (released on drop)
//!                                     3. Placer::place_call
//!                                     4. propagate the result
//! ```

pub mod agent;
pub mod error;
pub mod guard;
pub mod local;
pub mod slot;

pub use agent::{Agent, CallListener, LbAgent};
pub use error::AgentError;
pub use guard::CapacityGuard;
pub use local::LocalAgent;
pub use slot::RemoteSlot;
