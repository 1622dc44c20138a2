//! Extension inputs and the default set.

pub mod defaults;
pub mod input;

pub use defaults::{default_extensions, with_defaults};
pub use input::{ExtensionInput, InputKind};
