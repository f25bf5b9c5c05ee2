//! muster-runtime — the container-runtime driver boundary.
//!
//! Everything a runner node needs to go from a call's image and
//! resource limits to a concrete sandbox: image reference parsing,
//! the validate-then-pull protocol, registry error classification,
//! and the resource-limit translation into a `SandboxSpec`. The
//! daemon client itself sits behind the `Sandbox` trait.

pub mod error;
pub mod image;
pub mod pull;
pub mod sandbox;

pub use error::{DriverError, DriverResult, classify_registry_error};
pub use image::ImageRef;
pub use pull::{ImagePull, PullRequest, RegistryAuth};
pub use sandbox::{BoxFuture, Sandbox, SandboxOptions, SandboxSpec};
