//! Shelf Server - store-management backend over the shelf-engine mapping layer.

use shelf_engine::{MemoryStore, PersistenceAdapter, Reconciler};
use shelf_server::config::{Config, ConfigError, StorageBackend};
use shelf_server::db::{self, PgStore};
use shelf_server::{models, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "shelf_server=debug,shelf_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        "Starting Shelf Server on {}:{} ({:?} backend)",
        config.host,
        config.port,
        config.backend
    );

    // Select the persistence backend
    let adapter: Arc<dyn PersistenceAdapter> = match config.backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(ConfigError::MissingDatabaseUrl)?;
            let pool = db::create_pool(url, config.max_connections).await?;

            tracing::info!("Running database migrations...");
            db::run_migrations(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory backend; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Compile the catalog and let the backend build indexes
    let registry = models::catalog(adapter.clone())?;
    registry.prepare_all().await?;
    let registry = Arc::new(registry);

    let sweeper = match config.reconcile_interval {
        Some(every) if !adapter.capabilities().transactional => {
            let reconciler = Reconciler::new(registry.models());
            tracing::info!(
                collections = ?reconciler.collections(),
                every_secs = every.as_secs(),
                "Starting invariant reconciliation"
            );
            Some(reconciler.spawn(every))
        }
        Some(_) => {
            tracing::info!("Backend is transactional; reconciliation sweep disabled");
            None
        }
        None => None,
    };

    let app = shelf_server::app(AppState::new(registry, adapter.name()));

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    Ok(())
}
