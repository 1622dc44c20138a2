//! Inspection commands
//!
//! Routes are only mounted while extensions are running, so `routes` and
//! `call` start the application, do their work and shut it down again.

use anyhow::Context;
use clap::Args;
use cuneus_core::serving::{Method, Request};
use cuneus_runtime::Application;

/// Arguments for the call command
#[derive(Args, Debug)]
pub struct CallArgs {
    /// Request path
    pub path: String,

    /// Request method
    #[clap(long, short = 'X', default_value = "GET")]
    pub method: String,

    /// Request header as NAME=VALUE; may be repeated
    #[clap(long = "header", short = 'H', value_name = "NAME=VALUE")]
    pub headers: Vec<String>,

    /// JSON request body
    #[clap(long)]
    pub body: Option<String>,
}

/// Implementation of the routes command
pub async fn execute_routes(application: &Application) -> anyhow::Result<()> {
    application.start().await.context("startup failed")?;

    let routes = application.app().routes();
    if routes.is_empty() {
        println!("No routes mounted");
    }
    for route in routes {
        println!("{} {}", route.method, route.path);
    }

    application.shutdown().await;
    Ok(())
}

/// Implementation of the settings command
pub fn execute_settings(application: &Application) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(application.settings().as_ref())?;
    println!("{}", rendered);
    Ok(())
}

/// Implementation of the call command
pub async fn execute_call(args: &CallArgs, application: &Application) -> anyhow::Result<()> {
    let request = build_request(args)?;

    application.start().await.context("startup failed")?;
    let response = application.handle(request).await;
    application.shutdown().await;

    println!("{}", response.status);
    for (name, value) in response.headers.iter() {
        println!("{}: {}", name, value);
    }
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    Ok(())
}

fn build_request(args: &CallArgs) -> anyhow::Result<Request> {
    let method: Method = args
        .method
        .parse()
        .map_err(|err: String| anyhow::anyhow!(err))?;

    let mut request = Request::new(method, args.path.as_str());
    for header in &args.headers {
        let (name, value) = header
            .split_once('=')
            .with_context(|| format!("header '{}' is not NAME=VALUE", header))?;
        request = request.with_header(name.trim(), value.trim());
    }
    if let Some(body) = &args.body {
        let body = serde_json::from_str(body).context("body is not valid JSON")?;
        request = request.with_body(body);
    }
    Ok(request)
}
