//! In-memory test harness for roomsync.
//!
//! [`LoopbackHub`] plays the role of a room server inside one process: every
//! [`LoopbackTransport`] it hands out is a peer, and sends are delivered to
//! other peers' queues in call order. [`SimWorld`] is a minimal
//! [`gameplay::EntityWorld`] with point-mass bodies, enough to run spawn,
//! ownership and sync scenarios end to end.
//!
//! Everything is single-threaded and deterministic: nothing is delivered
//! until the receiving peer polls.

mod hub;
mod world;

pub use hub::{LoopbackHub, LoopbackTransport};
pub use world::{SimBody, SimEntity, SimWorld};
