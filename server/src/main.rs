use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use http_body_util::BodyExt;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use sso_server::handlers::http::build_router;
use sso_server::handlers::http::utils::internal_error;
use sso_server::{AppState, users};
use sso_shared::config::load_config;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Parser, Debug)]
#[command(name = "sso-server", version, about = "Session and token login server")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (the default).
    Serve,
    /// Print the Argon2 hash of a password, for users.json.
    HashPassword { password: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::HashPassword { password } => {
            println!("{}", users::hash_password(&password)?);
            Ok(())
        }
        Command::Serve => serve(cli.config).await,
    }
}

async fn serve(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let addr = config.server.addr();

    let state = AppState::from_config(config).await?;
    let router = Arc::new(build_router());

    spawn_session_pruner(state.clone());

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let state = state.clone();
        let router = router.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                let state = state.clone();
                let router = router.clone();
                async move {
                    let req = req.map(|body| body.boxed());
                    let method = req.method().clone();
                    let path = req.uri().path().to_string();
                    match router.route(req, state).await {
                        Ok(res) => Ok::<_, anyhow::Error>(res),
                        Err(e) => {
                            error!("{} {} failed: {:#}", method, path, e);
                            internal_error()
                        }
                    }
                }
            });

            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, service)
                .await
            {
                warn!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}

/// Drop expired sessions once an hour.
fn spawn_session_pruner(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            match state.sessions.prune_expired().await {
                Ok(0) => {}
                Ok(n) => info!("Pruned {} expired sessions", n),
                Err(e) => error!("Session prune failed: {}", e),
            }
        }
    });
}
