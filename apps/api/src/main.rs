use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use account_cell::AccountState;
use appointment_cell::SchedulingState;
use shared_config::{AppConfig, StorageBackend};
use shared_database::directory::{DirectoryStore, MemoryDirectory, SupabaseDirectory};
use shared_database::supabase::SupabaseClient;

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting MedLink scheduling API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    // Pick the storage backend
    let (scheduling, directory): (SchedulingState, Arc<dyn DirectoryStore>) = match config.storage_backend {
        StorageBackend::Supabase => {
            info!("Using Supabase storage at {}", config.supabase_url);
            let supabase = Arc::new(SupabaseClient::new(&config));
            let directory: Arc<dyn DirectoryStore> = Arc::new(SupabaseDirectory::new(supabase.clone()));
            (
                SchedulingState::with_supabase(config.clone(), supabase, directory.clone()),
                directory,
            )
        }
        StorageBackend::Memory => {
            let memory = match &config.directory_seed_path {
                Some(path) => match MemoryDirectory::load_seed(path) {
                    Ok(directory) => directory,
                    Err(e) => {
                        error!("Failed to load directory seed: {:#}", e);
                        return;
                    }
                },
                None => {
                    warn!("No DIRECTORY_SEED_PATH set, starting with an empty directory");
                    MemoryDirectory::new()
                }
            };
            let directory: Arc<dyn DirectoryStore> = Arc::new(memory);
            (SchedulingState::in_memory(config.clone(), directory.clone()), directory)
        }
    };

    let accounts = match AccountState::new(config.clone(), directory) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize account provisioning: {}", e);
            return;
        }
    };

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(Arc::new(scheduling), Arc::new(accounts))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}
