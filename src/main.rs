use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use recipe_api::config::Config;
use recipe_api::{db, identity, worker};

/// Recipe API server
#[derive(Parser)]
#[command(name = "recipe-api")]
#[command(about = "Recipe API - users, tags, ingredients and recipes over HTTP")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply migrations and start the HTTP server
    Serve,
    /// Create an active staff superuser
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Block until the database accepts connections
    WaitForDb {
        /// Connection attempts before giving up
        #[arg(long, default_value_t = 30)]
        attempts: u32,
        /// Seconds between attempts
        #[arg(long, default_value_t = 1)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(&config.log_level)
        }))
        .init();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::CreateSuperuser { email, password } => {
            let pool = db::connect(&config.database_url).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            let user = identity::create_superuser(&pool, &email, &password).await?;
            println!("Superuser {} created", user.email);
            Ok(())
        }
        Commands::WaitForDb {
            attempts,
            interval_secs,
        } => {
            tracing::info!("Waiting for database...");
            let url = config.database_url.clone();
            db::retry_connect(
                || db::connect(&url),
                attempts,
                Duration::from_secs(interval_secs),
            )
            .await?;
            tracing::info!("Database available");
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting Recipe API");

    let pool = db::connect(&config.database_url).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied");

    tokio::fs::create_dir_all(&config.media_root).await?;

    let addr = SocketAddr::new(config.host, config.port);
    let (app, state) = recipe_api::build_app(pool, config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let housekeeping = tokio::spawn(worker::run(state, shutdown_rx));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = housekeeping.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
