use std::sync::{Arc, Mutex};

use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use tourhub::config::AppConfig;
use tourhub::db;
use tourhub::handlers;
use tourhub::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/register/tourist",
            post(handlers::registration::register_tourist),
        )
        .route(
            "/api/register/vendor",
            post(handlers::registration::register_vendor),
        )
        .route("/api/services", get(handlers::catalog::search_services))
        .route("/api/services/:id", get(handlers::catalog::get_service))
        .route(
            "/api/services/:id/reviews",
            get(handlers::catalog::get_service_reviews),
        )
        .route(
            "/api/services/:id/reviews",
            post(handlers::catalog::post_review),
        )
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/my/bookings", get(handlers::bookings::my_bookings))
        .route(
            "/api/my/bookings/:id/cancel",
            post(handlers::bookings::cancel_my_booking),
        )
        .route("/api/vendor/me", get(handlers::vendor::me))
        .route(
            "/api/vendor/services",
            get(handlers::vendor::list_services),
        )
        .route(
            "/api/vendor/services",
            post(handlers::vendor::create_service),
        )
        .route(
            "/api/vendor/services/:id",
            patch(handlers::vendor::update_service),
        )
        .route(
            "/api/vendor/services/:id",
            delete(handlers::vendor::deactivate_service),
        )
        .route(
            "/api/vendor/bookings",
            get(handlers::vendor::list_bookings),
        )
        .route(
            "/api/vendor/bookings/:id/status",
            post(handlers::vendor::update_booking_status),
        )
        .route("/api/vendor/wallet", get(handlers::vendor::wallet))
        .route(
            "/api/vendor/transactions",
            get(handlers::vendor::list_transactions),
        )
        .route(
            "/api/vendor/withdrawals",
            post(handlers::vendor::request_withdrawal),
        )
        .route("/api/admin/stats", get(handlers::admin::get_stats))
        .route("/api/admin/vendors", get(handlers::admin::list_vendors))
        .route(
            "/api/admin/vendors/:id/status",
            post(handlers::admin::set_vendor_status),
        )
        .route("/api/admin/bookings", get(handlers::admin::list_bookings))
        .route(
            "/api/admin/bookings/:id/status",
            post(handlers::admin::update_booking_status),
        )
        .route(
            "/api/admin/transactions",
            get(handlers::admin::list_transactions),
        )
        .route(
            "/api/admin/withdrawals/:id/status",
            post(handlers::admin::decide_withdrawal),
        )
        .route("/api/admin/reconcile", post(handlers::admin::reconcile))
        .route("/api/admin/reviews", get(handlers::admin::list_reviews))
        .route(
            "/api/admin/reviews/:id/status",
            post(handlers::admin::set_review_status),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
