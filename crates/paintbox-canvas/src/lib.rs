//! Drawing primitives for Paintbox.
//!
//! Each primitive the peer can call is a [`DrawKind`]; its params decode into
//! a typed [`DrawOp`] that is applied to a [`DrawingSurface`].

pub mod command;
pub mod recording;
pub mod surface;

pub use command::{DrawKind, DrawOp, ParamsError};
pub use recording::RecordingSurface;
pub use surface::{DrawingSurface, SurfaceError, SurfaceState};
