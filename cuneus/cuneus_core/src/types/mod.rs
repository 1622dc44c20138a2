//! Shared data types.

pub mod state;

pub use state::{ExtensionState, State, StateLedger, StateValue};
