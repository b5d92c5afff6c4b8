// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use anyhow::{anyhow, Result};
use dotenv::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mys_social_client::app::{sandbox_session, seed_sandbox, App, Command, Reply};
use mys_social_client::config::{Config, GatewayMode};
use mys_social_client::gateway::{InMemoryGateway, RpcGateway, SharedGateway};
use mys_social_client::notify::{spawn_printer, Notifier};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    dotenv().ok();

    // LOG_FORMAT=json switches to structured output; all logs go to stderr
    let json_logs = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,mys_social_client=debug".into()),
        ))
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    let config = Config::from_env()?;
    info!("Initialized configuration ({:?} gateway)", config.gateway.mode);

    let (gateway, session, seeded) = match config.gateway.mode {
        GatewayMode::Memory => {
            let session = sandbox_session(&config);
            let viewer = session
                .capability()
                .ok_or_else(|| anyhow!("Sandbox viewer has no usable session"))?;
            let sandbox = InMemoryGateway::new();
            let seeded = seed_sandbox(&sandbox, &config, &viewer).await;
            let gateway: SharedGateway = Arc::new(sandbox);
            (gateway, session, seeded)
        }
        GatewayMode::Rpc => {
            let gateway: SharedGateway = Arc::new(RpcGateway::connect(&config.gateway)?);
            (gateway, config.session(), Vec::new())
        }
    };

    if session.capability().is_none() {
        warn!("No usable wallet session; actions are disabled");
    }

    let (notifier, notifications) = Notifier::channel();
    let printer = spawn_printer(notifications);

    let app = App::new(gateway, notifier, session, &config);
    app.load(&seeded).await?;

    println!("Type `help` for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Shutdown signal received"),
                    Err(e) => error!("Failed to listen for shutdown signal: {}", e),
                }
                break;
            }
        };

        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match app.handle(command).await {
            Ok(Reply::Text(text)) => println!("{}", text),
            Ok(Reply::Nothing) => {}
            Ok(Reply::Quit) => break,
            Err(e) => println!("Error: {:#}", e),
        }
    }

    app.feed().clear().await;
    drop(app);
    if let Err(e) = printer.await {
        error!("Notification printer failed: {}", e);
    }

    info!("MySocial client shutdown complete");
    Ok(())
}
