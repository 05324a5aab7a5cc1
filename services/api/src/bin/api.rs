//! services/api/src/bin/api.rs

use api_lib::{
    adapters::FireflyClient,
    config::Config,
    error::ApiError,
    web::{
        auth_url_handler, child_view_handler, diagnostics_handler, list_children_handler,
        refresh_handler, rest::ApiDoc, snapshot_handler, state::AppState, statistics_handler,
    },
};
use axum::{
    http::{header::{ACCEPT, CONTENT_TYPE}, Method},
    routing::{get, post},
    Router,
};
use firefly_core::{CoordinatorOptions, UpdateCoordinator, ViewOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize the Firefly Adapter ---
    let firefly = Arc::new(FireflyClient::new(
        config.firefly_host.clone(),
        config.device_id.clone(),
        config.secret.clone(),
        config.app_id.clone(),
    )?);
    match firefly.verify_credentials().await {
        Ok(true) => info!("Firefly credentials verified"),
        Ok(false) => warn!("Firefly credentials rejected; re-authentication will be required"),
        Err(e) => warn!(error = %e, "could not verify Firefly credentials at startup"),
    }

    // --- 3. Build the Update Coordinator ---
    let options = CoordinatorOptions {
        view: ViewOptions {
            timezone: config.timezone,
            lookahead_days: config.task_lookahead_days,
            show_class_times: config.show_class_times,
        },
        scan_interval: Duration::from_secs(config.scan_interval_minutes * 60),
    };
    let coordinator = Arc::new(UpdateCoordinator::new(
        firefly.clone(),
        config.children.clone(),
        options,
    ));

    // Prime the first snapshot before serving; a failed first cycle is not
    // fatal, the background loop keeps retrying on its cadence.
    if let Err(e) = coordinator.run_cycle().await {
        warn!(error = %e, "initial refresh cycle failed");
    }

    let cancel = CancellationToken::new();
    let loop_handle = tokio::spawn(coordinator.clone().run(cancel.clone()));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        coordinator,
        firefly,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/children", get(list_children_handler))
        .route("/children/{guid}/views/{kind}", get(child_view_handler))
        .route("/snapshot", get(snapshot_handler))
        .route("/statistics", get(statistics_handler))
        .route("/diagnostics", get(diagnostics_handler))
        .route("/auth/url", get(auth_url_handler))
        .route("/refresh", post(refresh_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    // The refresh loop observed the cancellation; wait for it to finish.
    if let Err(e) = loop_handle.await {
        warn!(error = %e, "refresh loop task did not shut down cleanly");
    }
    Ok(())
}

/// Resolves on Ctrl-C and cancels the refresh loop so both halves stop together.
async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
    cancel.cancel();
}
