/// Songless Server - backend for the track-guessing game
use clap::{Parser, Subcommand};
use songless_server::{
    config::{missing_env_vars, ServerConfig},
    create_router,
    state::AppState,
};
use songless_spotify::{AuthClient, PlaylistClient};
use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "songless-server")]
#[command(about = "Songless track-guessing game server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Verify that the required Spotify environment variables are set
    CheckEnv,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "songless_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            serve().await?;
        }
        Commands::CheckEnv => {
            check_env();
        }
    }

    Ok(())
}

async fn serve() -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::load()?;
    config.validate()?;

    tracing::info!("Starting Songless Server");
    tracing::info!("Host: {}", config.server.host);
    tracing::info!("Port: {}", config.server.port);

    let auth = Arc::new(AuthClient::new(
        config.spotify.client_id.clone(),
        config.spotify.client_secret.clone(),
    ));
    let playlists = Arc::new(PlaylistClient::new());
    tracing::info!("Spotify clients initialized");

    // Build application state and router
    let config = Arc::new(config);
    let app_state = AppState::new(Arc::clone(&config), auth, playlists);
    let app = create_router(app_state);

    // Create server address
    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    tracing::info!("Server listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Print which required variables are set and exit non-zero if any is
/// missing, so deployment scripts can gate on it.
fn check_env() {
    let missing = missing_env_vars();

    for name in songless_server::REQUIRED_ENV_VARS {
        if missing.contains(&name) {
            println!("✗ {name} is not set");
        } else {
            println!("✓ {name} is set");
        }
    }

    if missing.is_empty() {
        println!("Environment OK");
    } else {
        println!("Missing {} required variable(s)", missing.len());
        std::process::exit(1);
    }
}
