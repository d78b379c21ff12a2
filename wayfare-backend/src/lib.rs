use axum::{
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use wayfare_auth::{CredentialService, SigningKey};

// Re-export shared types from wayfare-types
pub use wayfare_types::*;

pub mod accounts;
pub mod auth;
pub mod config;
pub mod coordinator;
pub mod database;
pub mod error;
pub mod geocoding;
pub mod handlers;
pub mod storage;

use config::Config;
use coordinator::PlaceCoordinator;
use database::setup_database;
use error::{AppError, Result};
use geocoding::{FixedGeocoder, Geocoder};
use storage::ImageStorage;

// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub credentials: Arc<CredentialService>,
    pub places: PlaceCoordinator,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        config: Config,
        credentials: Arc<CredentialService>,
        geocoder: Arc<dyn Geocoder>,
    ) -> Self {
        let places = PlaceCoordinator::new(
            db.clone(),
            geocoder,
            ImageStorage::new(&config.upload_dir),
            config.geocode_timeout,
        );

        Self {
            db,
            credentials,
            places,
        }
    }
}

pub async fn run_server() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;

    // Setup database
    let db = setup_database(&config.database_url).await?;

    // Setup image storage
    ImageStorage::new(&config.upload_dir).init().await?;

    // Setup credentials
    let signing_key = config.jwt_secret.as_deref().map(SigningKey::new);
    let credentials = Arc::new(CredentialService::new(signing_key)?);
    if !credentials.has_signing_key() {
        tracing::warn!("⚠️  JWT_SECRET is not set; signup and login will fail");
    }

    // Extract config values before moving state
    let server_address = config.server_address.clone();
    let upload_dir = config.upload_dir.clone();

    // Create application state
    let state = AppState::new(db, config, credentials, Arc::new(FixedGeocoder::default()));

    // Build the application router
    let app = create_app(state);

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(&server_address)
        .await
        .map_err(|e| AppError::Server(format!("Failed to bind to {}: {}", server_address, e)))?;

    tracing::info!("🚀 Wayfare backend server starting on {}", server_address);
    tracing::info!("📁 Upload directory: {}", upload_dir);

    // Start the server
    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Server(format!("Server error: {}", e)))?;

    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        // Place operations
        .route("/api/places", post(handlers::create_place))
        .route(
            "/api/places/:pid",
            get(handlers::get_place_by_id)
                .patch(handlers::update_place)
                .delete(handlers::delete_place),
        )
        .route("/api/places/user/:uid", get(handlers::get_places_by_user_id))
        // User operations
        .route("/api/users", get(handlers::get_users))
        .route("/api/users/signup", post(handlers::signup))
        .route("/api/users/login", post(handlers::login))
        // Health check
        .route("/health", get(handlers::health_check))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}
