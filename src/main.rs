//! Subsonic-to-Jellyfin protocol gateway.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use jellysub::api::{AppState, create_router};
use jellysub::jellyfin::JellyfinClient;

/// Subsonic-compatible gateway in front of a Jellyfin server.
#[derive(Parser)]
#[command(name = "jellysub")]
#[command(about = "Expose a Jellyfin server through the Subsonic API")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value = "4040", env = "JELLYSUB_HTTP_PORT")]
    port: u16,

    /// Base URL of the upstream Jellyfin server
    #[arg(long, env = "JELLYSUB_UPSTREAM_URL")]
    upstream: Url,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jellysub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let upstream = cli.upstream.clone();
    let client = match JellyfinClient::new(cli.upstream) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to create upstream client: {}", e);
            std::process::exit(1);
        }
    };

    let app = create_router(AppState::new(client));

    let addr = format!("0.0.0.0:{}", cli.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            tracing::error!("Is another process already using port {}?", cli.port);
            std::process::exit(1);
        }
    };
    tracing::info!("jellysub listening on {}, proxying {}", addr, upstream);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
