//! Echoes the method, target and body of every request.
//!
//! ```text
//! cargo run --example echo -- 127.0.0.1:8080
//! curl -d hello http://127.0.0.1:8080/path
//! ```
use std::io::Read;
use std::sync::Arc;

use http_provider::{Context, HandlerFunc, HttpProvider, Provider, StatusCode, Values};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "http_provider=debug,echo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_owned());

    let echo = HandlerFunc::new(|ctx: &mut dyn Context| {
        let request = ctx.request();
        let mut line = format!("{} {}\n", request.method(), request.request_uri());
        if let Some(body) = request.body() {
            let _ = body.read_to_string(&mut line);
        }
        tracing::info!(target: "echo", bytes = line.len(), "echoing request");

        let response = ctx.response();
        response.header_mut().add("Content-Type", "text/plain; charset=utf-8");
        response.write_header(StatusCode::OK);
        let _ = response.write(line.as_bytes());
    });

    let provider = Arc::new(HttpProvider::new());
    provider.listen_and_serve(addr, Arc::new(echo)).await?;
    Ok(())
}
