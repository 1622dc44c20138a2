//! Application composition, capability collection and shutdown signalling.

pub mod application;
pub mod builder;
pub mod collector;
pub mod shutdown;

pub use application::Application;
pub use builder::{build_app, ApplicationBuilder};
pub use collector::CapabilityCollector;
pub use shutdown::{ShutdownError, ShutdownHandle, ShutdownSignal};
