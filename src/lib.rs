//! Playback-state bridge between an embedded web player page and its host.

pub mod bridge;
pub mod config;
pub mod host;
pub mod page;
pub mod state;
pub mod timer;
pub mod trace;
