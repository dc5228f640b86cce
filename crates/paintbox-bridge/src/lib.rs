//! The Paintbox bridge.
//!
//! A [`Bridge`] holds one WebSocket connection to a peer. Inbound
//! `command.invoke` envelopes are dispatched against the drawing surface and
//! answered with `command.result`; audio flows both ways as base64 PCM16.
//! The [`peer`] module is the other end of that channel.

pub mod batch;
pub mod connection;
pub mod dispatch;
pub mod peer;
pub mod registry;

pub use connection::{Bridge, ConnectionPhase};
pub use dispatch::{CommandError, Dispatcher};
pub use peer::{PeerSession, PeerState, peer_router, serve_peer, start_peer};
pub use registry::{Command, CommandRegistry, Lookup, MetaCommand};
