//! muster-placer — the admission/retry placement algorithm.
//!
//! Given a call and a logical group, the placer repeatedly asks the
//! pool for candidate runners and offers the call to each until one
//! accepts, a fatal error occurs, or the call's deadline elapses.
//! Runner-level failures are absorbed and retried; deadline expiry is
//! the only terminal failure and surfaces as a distinct busy error so
//! upstream can tell overload from a hard fault.

pub mod placer;

pub use placer::{NaivePlacer, PlaceError, Placer, PlacerConfig, RingPlacer};
