// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Warden server binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
use warden_server::{build_state, create_router, jobs, logging, version};

/// Warden - authorization, token and device-code server.
#[derive(Parser, Debug)]
#[command(name = "warden-server", about = "Warden authorization server", version)]
struct Args {
	/// Config file; overrides WARDEN_SERVER_CONFIG.
	#[arg(long, short, env = "WARDEN_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the HTTP server (default)
	Serve,
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => warden_server_config::load_config_with_file(path)?,
		None => warden_server_config::load_config()?,
	};
	logging::init(&config.logging)?;

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		role = ?config.authz.role,
		"starting warden-server"
	);

	let pool = warden_server_db::create_pool(&config.database.url, config.database.max_connections).await?;
	warden_server_db::run_migrations(&pool).await?;

	let (state, background) = build_state(&config, pool).await?;
	let sweep = jobs::spawn_device_sweep(state.device_flow.clone(), config.device.sweep_interval());

	let app = create_router(state).layer(TraceLayer::new_for_http()).layer(
		CorsLayer::new()
			.allow_origin(Any)
			.allow_methods(Any)
			.allow_headers(Any),
	);

	let addr = config.socket_addr();
	let listener = tokio::net::TcpListener::bind(&addr).await?;
	tracing::info!("listening on {}", addr);

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("received shutdown signal");
		}
	}

	sweep.shutdown().await;
	background.shutdown().await;
	tracing::info!("server shutdown complete");
	Ok(())
}
