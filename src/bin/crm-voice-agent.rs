// ABOUTME: Server binary for the CRM voice agent HTTP API
// ABOUTME: Loads configuration, builds shared resources and serves until interrupted
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # CRM Voice Agent Server Binary
//!
//! Serves the chat streaming, speech and session endpoints.

use anyhow::Result;
use clap::Parser;
use crm_voice_agent::{config::ServerConfig, logging, resources::ServerResources, routes};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "crm-voice-agent")]
#[command(about = "CRM voice agent - model routing, tool calling and streamed answers")]
pub struct Args {
    /// Override HTTP port
    #[arg(long, env = "HTTP_PORT")]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;
    info!("Starting CRM voice agent");
    info!("{}", config.summary());

    let port = config.http_port;
    let resources = Arc::new(ServerResources::from_config(config).await?);
    let app = routes::router(resources);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_owned());
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = TcpListener::bind(addr).await?;

    info!("=== Available API Endpoints ===");
    info!("   Chat (SSE):   POST   http://{addr}/api/voice/chat");
    info!("   TTS:          POST   http://{addr}/api/voice/tts");
    info!("   Transcribe:   POST   http://{addr}/api/voice/transcribe");
    info!("   Clear:        DELETE http://{addr}/api/voice/sessions/{{session_id}}");
    info!("   Health:       GET    http://{addr}/health");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        return;
    }
    info!("Shutdown signal received");
}
