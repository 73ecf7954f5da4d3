use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use crux_auth::{AuthSettings, DatabaseConfig, KeySetError, create_router, create_state};

#[derive(Parser)]
#[command(name = "crux-auth")]
#[command(about = "Multi-provider authentication and session service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        #[arg(short, long, default_value = "8080")]
        port: u16,
        #[arg(long, default_value = "memory")]
        db_url: String,
        /// Symmetric secret for locally-issued session tokens
        #[arg(long, env = "AUTH_SECRET_KEY")]
        secret_key: Option<String>,
        /// Key-set endpoint of the federated issuer
        #[arg(long, env = "AUTH_FEDERATED_JWKS_URL")]
        jwks_url: Option<String>,
        /// Expected issuer of federated tokens
        #[arg(long, env = "AUTH_FEDERATED_ISSUER")]
        issuer: Option<String>,
        /// Expected audience of federated tokens
        #[arg(long, env = "AUTH_FEDERATED_AUDIENCE")]
        audience: Option<String>,
        /// Accept federated claims on the sync endpoint without signature
        /// verification (legacy migrations only)
        #[arg(long, default_value_t = false)]
        allow_unverified_sync: bool,
    },
    /// Initialize the database schema
    Init {
        #[arg(long, default_value = "memory")]
        db_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("crux_auth=info".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            db_url,
            secret_key,
            jwks_url,
            issuer,
            audience,
            allow_unverified_sync,
        } => {
            let mut settings = AuthSettings::default();
            if let Some(secret) = secret_key {
                settings.secret_key = secret;
            }
            if jwks_url.is_some() {
                settings.federated.jwks_url = jwks_url;
            }
            if issuer.is_some() {
                settings.federated.issuer = issuer;
            }
            if audience.is_some() {
                settings.federated.audience = audience;
            }
            if allow_unverified_sync {
                settings.allow_unverified_sync = true;
            }

            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Using database url: {}", db_config.url);

            let state = create_state(db_config, settings).await?;

            // Warm the key-set cache so the first federated request does
            // not pay the fetch round trip. Failure is not fatal: the
            // cache refreshes on demand.
            match state.key_set.warm().await {
                Ok(()) => info!("key-set cache warmed"),
                Err(KeySetError::Unconfigured) => {}
                Err(e) => warn!("key-set warm-up failed: {}", e),
            }

            let app = create_router(state);

            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
            info!("Auth server listening on http://0.0.0.0:{}", port);

            axum::serve(listener, app).await?;
        }
        Commands::Init { db_url } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            let db = crux_auth::create_connection(db_config).await?;
            crux_auth::ensure_schema(&db).await?;
            println!("Database schema initialized");
        }
    }

    Ok(())
}
