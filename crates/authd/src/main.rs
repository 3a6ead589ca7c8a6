// authd - SRP-6a network authentication core
//
// Wires together the credential store, session store, and UDP listener for
// the authentication handshake: SERVER_NEGOTIATE -> SERVER_EPHEMERAL ->
// SERVER_PROOF.

mod handler;
mod protocol;
mod session;
mod listener;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use authd_shared::auth::Srp6Server;
use authd_shared::config::get_config;
use authd_shared::database::{CredentialStore, Database};
use authd_shared::log::initialize_logging;

use handler::Handler;
use session::SessionStore;

const DEFAULT_PORT: i32 = 16666;
const DEFAULT_CONFIG: &str = "authd.conf";

#[derive(Parser, Debug)]
#[command(name = "authd")]
#[command(about = "SRP-6a authentication core")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    {
        let mut config = get_config().lock();
        if !config.set_source(&args.config, "AUTHD_") {
            eprintln!("Could not find configuration file {}.", args.config);
            std::process::exit(1);
        }
    }

    let log_dir = {
        let config = get_config().lock();
        let dir = config.get_string_default("logs_dir", "");
        if dir.is_empty() { None } else { Some(dir) }
    };
    initialize_logging(log_dir.as_deref(), "info");

    tracing::info!("authd v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!("using configuration file: {}", args.config);

    let db_uri = {
        let config = get_config().lock();
        config.get_string("database.uri")
    };

    if db_uri.is_empty() {
        tracing::error!("database.uri not specified in configuration");
        std::process::exit(1);
    }

    let mut db = Database::new("credentials");
    if let Err(e) = db.initialize(&db_uri).await {
        tracing::error!("cannot connect to database: {}", e);
        std::process::exit(1);
    }

    let credentials = CredentialStore::new(db);
    let sessions = SessionStore::new();
    let srp = Srp6Server::new();

    let (bind_ip, port, ttl_secs, sweep_secs) = {
        let config = get_config().lock();
        (
            config.get_string_default("auth.bind_ip", "0.0.0.0"),
            config.get_int_default("auth.port", DEFAULT_PORT),
            config.get_int_default("auth.session_ttl_seconds", 30) as u64,
            config.get_int_default("auth.sweep_interval_seconds", 10) as u64,
        )
    };

    let session_ttl = Duration::from_secs(ttl_secs);
    let sweep_interval = Duration::from_secs(sweep_secs);

    let handler = Arc::new(Handler {
        credentials,
        sessions,
        srp,
        session_ttl,
    });

    let bind_addr: SocketAddr = format!("{}:{}", bind_ip, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address {}:{}: {}", bind_ip, port, e))?;

    if let Err(e) = listener::run(bind_addr, handler, sweep_interval, session_ttl).await {
        tracing::error!("listener failed: {}", e);
        std::process::exit(1);
    }

    tracing::info!("authd shutting down");
    Ok(())
}
