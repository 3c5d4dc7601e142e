//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Telemetry timestamps are naive local device time (`chrono::NaiveDateTime`)
//! - Output frames are addressed by `frame_index`, mapped to telemetry time by `FrameClock`

mod blueprint;
mod error;
mod frame;
mod geo;
mod session;
mod sink;
mod sync;
mod telemetry;
mod track;

pub use blueprint::*;
pub use error::*;
pub use frame::*;
pub use geo::*;
pub use session::*;
pub use sink::*;
pub use sync::*;
pub use telemetry::*;
pub use track::{Gap, Track};
