//! Scoped acquisition of one extension.
//!
//! Entering a scope runs the extension's startup. Only a successful entry
//! hands back an [`ActiveExtension`], and only an active extension can be
//! released, so shutdown is never called for an extension whose startup
//! failed and never called twice.

use std::sync::Arc;

use cuneus_core::registry::ServiceRegistry;
use cuneus_core::serving::App;
use cuneus_core::traits::Extension;
use cuneus_core::types::ExtensionState;

/// Wrap an extension in a scope bound to `registry` and `app`.
pub fn register(
    extension: Arc<dyn Extension>,
    registry: Arc<ServiceRegistry>,
    app: App,
) -> ExtensionScope {
    ExtensionScope {
        extension,
        registry,
        app,
    }
}

/// An extension that has not started yet.
pub struct ExtensionScope {
    extension: Arc<dyn Extension>,
    registry: Arc<ServiceRegistry>,
    app: App,
}

impl ExtensionScope {
    /// Name of the wrapped extension.
    pub fn name(&self) -> &str {
        self.extension.name()
    }

    /// Run startup.
    ///
    /// On success, returns the extension's state contribution and the
    /// handle that performs its shutdown.
    pub async fn enter(self) -> anyhow::Result<(ExtensionState, ActiveExtension)> {
        let state = self.extension.startup(&self.registry, &self.app).await?;
        Ok((
            state,
            ActiveExtension {
                extension: self.extension,
                app: self.app,
            },
        ))
    }
}

/// A started extension awaiting shutdown.
pub struct ActiveExtension {
    extension: Arc<dyn Extension>,
    app: App,
}

impl ActiveExtension {
    /// Name of the extension.
    pub fn name(&self) -> &str {
        self.extension.name()
    }

    /// Run shutdown, consuming the handle.
    pub async fn release(self) -> anyhow::Result<()> {
        self.extension.shutdown(&self.app).await
    }
}
