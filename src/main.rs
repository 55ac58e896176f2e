//! DocVault Server
//!
//! A document vault and sharing server. Users verify their email with a
//! one-time code, upload documents, and share them with other users at
//! view or edit level.
//!
//! # Configuration
//!
//! Environment variables:
//! - `DOCVAULT_PORT`: Port to listen on (default: 8080)
//! - `DOCVAULT_DATABASE_PATH`: SQLite database location
//! - `DOCVAULT_CONTENT_DIR`: Directory for stored document content
//! - `DOCVAULT_PUBLIC_URL`: Base URL used in file links
//! - `DOCVAULT_JWT_SECRET`: Secret for signing session tokens
//! - `DOCVAULT_CONFIG`: Path to config file (default: ~/.config/docvault/config.yaml)

use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docvault::auth::{OtpManager, TokenService};
use docvault::config::Config;
use docvault::db::{init_db, DocumentRepository, UserRepository};
use docvault::server::{self, AppState, ContentStore, EmailSender};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docvault=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match Config::load(None) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if config.jwt_secret == "change-me" {
        tracing::warn!("Using the default JWT secret; set DOCVAULT_JWT_SECRET in production");
    }

    // Ensure content directory exists
    if let Err(e) = std::fs::create_dir_all(&config.content_dir) {
        tracing::error!("Failed to create content directory: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Database: {}", config.database_path.display());
    tracing::info!("Content directory: {}", config.content_dir.display());

    // Connect and run migrations
    let pool = match init_db(config.database_path.clone()).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    // Build app state
    let users = UserRepository::new(pool.clone());
    let state = AppState {
        users: users.clone(),
        documents: DocumentRepository::new(pool),
        otp: OtpManager::new(users, config.otp_ttl_minutes),
        tokens: TokenService::new(&config.jwt_secret, config.token_ttl_hours),
        email: EmailSender::new(config.email.clone()),
        content: ContentStore::new(&config.content_dir, config.public_url.clone()),
    };

    let app = server::router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
