//! muster-model — shared domain model for the Muster control plane.
//!
//! Defines the types that cross subsystem boundaries: the call being
//! placed, logical group identities, transient capacity claims, and
//! the `Slot` execution handle. Behavior lives in the other crates;
//! this one stays dependency-light so every layer can speak it.

pub mod call;
pub mod capacity;
pub mod group;
pub mod slot;

pub use call::{Call, CallError, CallId, CallModel, HttpExchange};
pub use capacity::CapacityEntry;
pub use group::{GroupResolver, LbGroupId, StaticGroupResolver};
pub use slot::{BoxFuture, ExecError, Slot};
