//! Host half of the bridge: commands into the page, updates out of it.

pub mod commands;
pub mod pipe;
pub mod state;
