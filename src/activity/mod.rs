//! Activity resolution: classification catalog and the state machine.

pub mod catalog;
pub mod state;
