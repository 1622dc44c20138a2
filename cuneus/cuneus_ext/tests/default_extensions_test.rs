use std::sync::Arc;

use cuneus_core::registry::{FnProbe, ServiceRegistry};
use cuneus_core::serving::{App, Request, Response, Router, ServingOptions};
use cuneus_core::traits::{ExceptionRegistrar, Extension, ExtensionContext};
use cuneus_core::Settings;
use cuneus_ext::{AppException, ExceptionExtension, HealthExtension, LoggingExtension};

/// Wire the default trio by hand, the way the runtime does.
async fn compose(settings: &Settings, registry: Arc<ServiceRegistry>) -> App {
    let context = ExtensionContext::from_settings(settings.clone());
    let logging = LoggingExtension::new(&context);
    let health = HealthExtension::new(&context);
    let exceptions = ExceptionExtension::new(&context);

    let middleware = logging
        .as_middleware_provider()
        .map(|provider| provider.middleware())
        .unwrap_or_default();
    let app = App::new(ServingOptions::new(), middleware);

    logging.startup(&registry, &app).await.unwrap();
    health.startup(&registry, &app).await.unwrap();
    exceptions.startup(&registry, &app).await.unwrap();

    let mut registrar = ExceptionRegistrar::new(&app, exceptions.name());
    exceptions
        .as_exception_handler_provider()
        .unwrap()
        .add_exception_handlers(&mut registrar);

    app.include_router(
        Router::new()
            .get("/orders", |_| async {
                Ok::<_, anyhow::Error>(Response::ok(serde_json::json!([])))
            })
            .get("/orders/locked", |_| async {
                Err::<Response, _>(anyhow::Error::new(AppException::conflict("Order is locked")))
            }),
    );
    app
}

#[tokio::test]
async fn test_health_reports_healthy_with_correlation_header() {
    let app = compose(&Settings::default(), Arc::new(ServiceRegistry::new())).await;

    let response = app.handle(Request::get("/healthz")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["status"], "healthy");
    assert!(response.headers.contains("X-Request-ID"));

    let response = app.handle(Request::get("/orders")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.headers.get("x-request-id").map(str::len), Some(8));
}

#[tokio::test]
async fn test_error_body_carries_the_request_id() {
    let app = compose(&Settings::default(), Arc::new(ServiceRegistry::new())).await;

    let response = app
        .handle(Request::get("/orders/locked").with_header("X-Request-ID", "trace-7"))
        .await;

    assert_eq!(response.status, 409);
    assert_eq!(response.body["error"]["code"], "conflict");
    assert_eq!(response.body["error"]["request_id"], "trace-7");
    assert_eq!(response.headers.get("X-Request-ID"), Some("trace-7"));
}

#[tokio::test]
async fn test_unhealthy_probe_is_reported() {
    let registry = Arc::new(ServiceRegistry::new());
    registry.register_ping(
        "database",
        FnProbe(|| async { Err::<(), _>(anyhow::anyhow!("timeout")) }),
    );
    let app = compose(&Settings::default(), registry).await;

    let response = app.handle(Request::get("/healthz")).await;
    assert_eq!(response.status, 503);
    assert_eq!(response.body["services"][0]["name"], "database");
    assert_eq!(response.body["services"][0]["status"], "unhealthy");
}
