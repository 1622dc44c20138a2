//! Extension lifecycle: scoped acquisition, the cleanup stack and the
//! orchestrator that drives both.

pub mod orchestrator;
pub mod scope;
pub mod stack;

pub use orchestrator::{Orchestrator, Phase};
pub use scope::{register, ActiveExtension, ExtensionScope};
pub use stack::{CleanupStack, ShutdownFailure, ShutdownReport};
