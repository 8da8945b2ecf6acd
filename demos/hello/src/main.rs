//! Hello Server Demo
//!
//! A small Switchyard application showing the layer stack:
//!
//! ```text
//! use  /             request logger (passes on)
//! GET  /             greeting
//! GET  /hello/:name  greeting with a path param
//! GET  /boom         fails, handled by the error handler below
//! /api               mounted router
//!   GET /users/:id   JSON, honours ?fields=
//! use  /   (error)   logs and forwards to the final handler
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package hello-server -- --port 8080
//! curl localhost:8080/api/users/7?fields=name
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use switchyard::prelude::*;
use switchyard::runtime::RuntimeBuilder;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "hello-server", about = "Switchyard demo server")]
struct Args {
    /// Configuration file (defaults to ./switchyard.toml if present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override.
    #[arg(short, long)]
    port: Option<u16>,
}

async fn log_request(ctx: Arc<RequestContext>, next: Next) -> Flow {
    info!(method = %ctx.method(), url = %ctx.original_url(), "incoming");
    next.pass()
}

async fn greet(ctx: Arc<RequestContext>, next: Next) -> Flow {
    let name = ctx.param("name").unwrap_or_else(|| "world".to_string());
    ctx.send_text(StatusCode::OK, format!("Hello, {name}!\n"));
    next.end()
}

async fn boom(_ctx: Arc<RequestContext>, next: Next) -> Flow {
    next.fail(HandlerError::with_code(
        StatusCode::IM_A_TEAPOT,
        "short and stout",
    ))
}

async fn user(ctx: Arc<RequestContext>, next: Next) -> Flow {
    let Some(id) = ctx.param("id") else {
        return next.pass();
    };
    let Ok(id) = id.parse::<u64>() else {
        return next.fail(HandlerError::with_code(
            StatusCode::BAD_REQUEST,
            format!("invalid user id {id:?}"),
        ));
    };

    let mut body = serde_json::json!({ "id": id, "name": format!("user-{id}") });
    if let Some(fields) = ctx.query_param("fields")
        && let Some(object) = body.as_object_mut()
    {
        object.retain(|key, _| fields.split(',').any(|f| f == key));
    }
    ctx.send_json(StatusCode::OK, &body);
    next.end()
}

async fn report(error: HandlerError, ctx: Arc<RequestContext>, next: Next) -> Flow {
    warn!(path = %ctx.path(), status = %error.response_status(), error = %error, "request failed");
    next.fail(error)
}

fn api() -> Result<Router> {
    let mut router = Router::new();
    router.get("/users/:id", user)?;
    Ok(router)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = RuntimeBuilder::new().with_env();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    } else if let Ok(cwd) = std::env::current_dir() {
        builder = builder.search_path(cwd);
    }
    if let Some(port) = args.port {
        builder = builder.set("server.port", port);
    }
    let runtime = builder.build()?;

    let mut app = runtime.application()?;
    app.use_handler("/", log_request)?;
    app.get("/", greet)?;
    app.get("/hello/:name", greet)?;
    app.get("/boom", boom)?;
    app.mount("/api", api()?)?;
    app.use_error("/", report)?;

    runtime.run(app).await?;
    Ok(())
}
