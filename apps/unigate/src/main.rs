use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

mod cli;
mod data_dir;

use unigate_core::Gateway;
use unigate_router::{api_router, unified_router};

use crate::cli::Cli;
use crate::data_dir::resolve_data_dir;

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("unigate failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(&cli.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data dir {data_dir}"))?;
    info!(data_dir = %data_dir, "data dir ready");

    let gateway = Arc::new(Gateway::new(Path::new(&data_dir))?);

    let app = axum::Router::new()
        .merge(api_router(gateway.clone()))
        .merge(unified_router(gateway));

    let bind = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(addr = %bind, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("unigate=info,client=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
