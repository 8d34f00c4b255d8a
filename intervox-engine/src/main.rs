//! Intervox interview engine service
//!
//! Hosts the interview session engine behind an HTTP API plus a separate SSE
//! notification endpoint.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use intervox_common::config::Config;
use intervox_engine::api::server::{api_router, serve, sse_router, AppContext};
use intervox_engine::cache;
use intervox_engine::clients::{HttpGenScore, HttpSpeech};
use intervox_engine::engine::{EngineSettings, SessionEngine};
use intervox_engine::notify::Notifier;
use intervox_engine::store::{sqlite, Repository};

/// Intervox - AI mock-interview session engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Port to bind the API to (overrides configuration)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("intervox_engine={},intervox_common={}", log_level, log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Intervox interview engine starting...");

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let db_path = config.db.resolve_path();
    let pool = sqlite::init_database(&db_path).await?;
    let repo = Repository::sqlite(pool);

    let genscore = Arc::new(HttpGenScore::new(config.genscore.url.clone())?);
    let speech = Arc::new(HttpSpeech::new(config.speech.url.clone())?);
    let notifier = Arc::new(Notifier::new());
    let cache = cache::from_config(&config.redis);

    let engine = SessionEngine::new(
        repo,
        genscore,
        speech,
        Arc::clone(&notifier),
        cache,
        EngineSettings::from_config(&config),
    );

    let ctx = AppContext { engine, notifier };

    let api_addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let sse_addr = SocketAddr::from(([0, 0, 0, 0], config.server.sseport));

    let api = serve(api_addr, api_router(ctx.clone()));
    let sse = serve(sse_addr, sse_router(ctx));

    tokio::try_join!(api, sse)?;
    Ok(())
}
