//! Health check extension.
//!
//! Mounts three routes under the configured prefix:
//!
//! - `GET {prefix}`: pings every registered probe and reports each service
//! - `GET {prefix}/live`: liveness, always 200
//! - `GET {prefix}/ready`: readiness, 503 on the first unhealthy service

use std::sync::Arc;

use async_trait::async_trait;
use cuneus_core::registry::ServiceRegistry;
use cuneus_core::serving::{App, Response, Router};
use cuneus_core::traits::{Extension, ExtensionContext, FromContext};
use cuneus_core::types::ExtensionState;
use cuneus_core::Logger;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Overall or per-service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Probe succeeded
    Healthy,
    /// Probe failed
    Unhealthy,
}

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    /// Probe name
    pub name: String,
    /// Probe outcome
    pub status: HealthStatus,
    /// Failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of the full health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Healthy only if every service is
    pub status: HealthStatus,
    /// Application version
    pub version: Option<String>,
    /// Per-service results, in registration order
    #[serde(default)]
    pub services: Vec<ServiceHealth>,
}

impl HealthResponse {
    /// Whether every service is healthy.
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Ping every probe in `registry`.
pub async fn check_health(
    registry: &ServiceRegistry,
    version: Option<String>,
    logger: &Logger,
) -> HealthResponse {
    let mut services = Vec::new();
    let mut healthy = true;

    for ping in registry.pings() {
        match ping.ping().await {
            Ok(()) => services.push(ServiceHealth {
                name: ping.name().to_string(),
                status: HealthStatus::Healthy,
                message: None,
            }),
            Err(err) => {
                logger.warn(format!("Health check failed for {}: {}", ping.name(), err));
                healthy = false;
                services.push(ServiceHealth {
                    name: ping.name().to_string(),
                    status: HealthStatus::Unhealthy,
                    message: Some(err.to_string()),
                });
            }
        }
    }

    HealthResponse {
        status: if healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
        version,
        services,
    }
}

/// The first probe that fails, with its error.
async fn first_unhealthy(registry: &ServiceRegistry) -> Option<(String, anyhow::Error)> {
    for ping in registry.pings() {
        if let Err(err) = ping.ping().await {
            return Some((ping.name().to_string(), err));
        }
    }
    None
}

/// Health, liveness and readiness routes.
pub struct HealthExtension {
    enabled: bool,
    prefix: String,
    version: Option<String>,
    logger: Logger,
}

impl HealthExtension {
    /// Create the extension from the health settings in `context`.
    pub fn new(context: &ExtensionContext) -> Self {
        let settings = context.settings();
        Self {
            enabled: settings.health_enabled,
            prefix: settings.health_prefix.clone(),
            version: settings.version.clone(),
            logger: context.logger("health"),
        }
    }

    /// Route prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn router(&self, registry: &Arc<ServiceRegistry>) -> Router {
        let health_registry = registry.clone();
        let health_logger = self.logger.clone();
        let version = self.version.clone();

        let ready_registry = registry.clone();
        let ready_logger = self.logger.clone();

        Router::with_prefix(self.prefix.as_str())
            .get("", move |_| {
                let registry = health_registry.clone();
                let logger = health_logger.clone();
                let version = version.clone();
                async move {
                    let report = check_health(&registry, version, &logger).await;
                    let status = if report.is_healthy() { 200 } else { 503 };
                    Ok::<_, anyhow::Error>(Response::from_serialize(status, &report))
                }
            })
            .get("/live", |_| async {
                Ok::<_, anyhow::Error>(Response::ok(json!({ "status": "ok" })))
            })
            .get("/ready", move |_| {
                let registry = ready_registry.clone();
                let logger = ready_logger.clone();
                async move {
                    let response = match first_unhealthy(&registry).await {
                        None => Response::ok(json!({ "status": "ok" })),
                        Some((name, err)) => {
                            logger.warn(format!("Readiness check failed for {}: {}", name, err));
                            Response::json(
                                503,
                                json!({
                                    "status": "unavailable",
                                    "detail": format!("{} unhealthy", name),
                                }),
                            )
                        }
                    };
                    Ok::<_, anyhow::Error>(response)
                }
            })
    }
}

impl Default for HealthExtension {
    fn default() -> Self {
        Self::new(&ExtensionContext::default())
    }
}

impl FromContext for HealthExtension {
    fn from_context(context: &ExtensionContext) -> anyhow::Result<Self> {
        Ok(Self::new(context))
    }
}

#[async_trait]
impl Extension for HealthExtension {
    async fn startup(
        &self,
        registry: &Arc<ServiceRegistry>,
        app: &App,
    ) -> anyhow::Result<ExtensionState> {
        if !self.enabled {
            self.logger.debug("Health routes disabled");
            return Ok(ExtensionState::new());
        }

        app.include_router(self.router(registry));
        self.logger
            .info(format!("Health routes mounted under {}", self.prefix));
        Ok(ExtensionState::new())
    }
}
