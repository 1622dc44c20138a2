//! Service registry.
//!
//! Extensions register typed services during startup; request handlers and
//! other extensions look them up by type. Services may also register a
//! health probe, which the health extension pings.
//!
//! The registry is shared by reference across all extensions. Startup is
//! sequential, so extensions never race on it; the internal lock only
//! protects lookups made by concurrently served requests.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::RegistryError;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type SharedService = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn() -> BoxFuture<anyhow::Result<SharedService>> + Send + Sync>;

/// A health check for a registered service.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Succeeds when the service is healthy.
    async fn ping(&self) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into a [`HealthProbe`].
pub struct FnProbe<F>(pub F);

#[async_trait]
impl<F, Fut> HealthProbe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn ping(&self) -> anyhow::Result<()> {
        (self.0)().await
    }
}

/// A named health probe.
#[derive(Clone)]
pub struct Ping {
    name: String,
    probe: Arc<dyn HealthProbe>,
}

impl Ping {
    /// Name of the probed service.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the probe.
    pub async fn ping(&self) -> anyhow::Result<()> {
        self.probe.ping().await
    }
}

enum Registration {
    Value(SharedService),
    Factory(Factory),
}

/// Registry of typed services and their health probes.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<TypeId, Registration>>,
    pings: RwLock<Vec<Ping>>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a ready-made value. Replaces any earlier registration of `T`.
    pub fn register_value<T: Send + Sync + 'static>(&self, value: T) {
        debug!("Registering value for {}", type_name::<T>());
        self.services
            .write()
            .insert(TypeId::of::<T>(), Registration::Value(Arc::new(value)));
    }

    /// Register a value together with a health probe for it.
    pub fn register_value_with_ping<T, P>(&self, value: T, name: impl Into<String>, probe: P)
    where
        T: Send + Sync + 'static,
        P: HealthProbe + 'static,
    {
        self.register_value(value);
        self.register_ping(name, probe);
    }

    /// Register an async factory that produces a fresh `T` on every lookup.
    pub fn register_factory<T, F, Fut>(&self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        debug!("Registering factory for {}", type_name::<T>());
        let factory: Factory = Arc::new(move || {
            let fut = factory();
            Box::pin(async move { fut.await.map(|value| Arc::new(value) as SharedService) })
                as BoxFuture<anyhow::Result<SharedService>>
        });
        self.services
            .write()
            .insert(TypeId::of::<T>(), Registration::Factory(factory));
    }

    /// Register a named health probe.
    pub fn register_ping<P: HealthProbe + 'static>(&self, name: impl Into<String>, probe: P) {
        let name = name.into();
        debug!("Registering health probe '{}'", name);
        let mut pings = self.pings.write();
        pings.retain(|ping| ping.name != name);
        pings.push(Ping {
            name,
            probe: Arc::new(probe),
        });
    }

    /// Whether a service of type `T` is registered.
    pub fn contains<T: 'static>(&self) -> bool {
        self.services.read().contains_key(&TypeId::of::<T>())
    }

    /// Look up a service of type `T`.
    pub async fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, RegistryError> {
        // Clone the factory out so the lock is not held across the await.
        let factory = {
            let services = self.services.read();
            match services.get(&TypeId::of::<T>()) {
                None => return Err(RegistryError::ServiceNotFound(type_name::<T>())),
                Some(Registration::Value(value)) => {
                    return value
                        .clone()
                        .downcast::<T>()
                        .map_err(|_| RegistryError::TypeMismatch(type_name::<T>()));
                }
                Some(Registration::Factory(factory)) => factory.clone(),
            }
        };

        let value = factory()
            .await
            .map_err(|source| RegistryError::FactoryFailed {
                service: type_name::<T>(),
                source,
            })?;

        value
            .downcast::<T>()
            .map_err(|_| RegistryError::TypeMismatch(type_name::<T>()))
    }

    /// All health probes, in registration order.
    pub fn pings(&self) -> Vec<Ping> {
        self.pings.read().clone()
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    /// Whether no service is registered.
    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}
