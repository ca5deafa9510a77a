//! Core of the rail-logistics game server: wire protocol and
//! framing, the entity model, the per-game simulation, persistence, and the
//! process-wide registries and session state machine that tie them together.
//! The binary in `railserver` is a thin accept-loop shell around this crate.

pub mod config;
pub mod error;
pub mod game;
pub mod map;
pub mod mapfile;
pub mod model;
pub mod net;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod store;
