//! Interfaces implemented by extensions.
//!
//! - `Extension`: the lifecycle every extension has
//! - `MiddlewareProvider`, `CliProvider`, `ExceptionHandlerProvider`: optional
//!   capabilities, discovered through the `as_*` accessors on `Extension`

pub mod extension;

pub use extension::{
    short_type_name, CliProvider, ExceptionHandlerProvider, ExceptionRegistrar, Extension,
    ExtensionContext, FromContext, MiddlewareProvider,
};
