//! Router setup with all API routes and middleware.

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use argo_core::config::ArgoConfig;
use argo_core::error::ArgoError;

use crate::handlers;
use crate::state::AppState;

/// Body limit for routes that carry file bytes.
const ATTACHMENT_BODY_LIMIT: usize = 20 * 1024 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Allow the bundled web client on the API port and port+1.
    let port = state.config.general.port;
    let dev_port = port.saturating_add(1);
    let origins: Vec<HeaderValue> = [port, dev_port]
        .iter()
        .flat_map(|p| {
            [
                format!("http://127.0.0.1:{}", p),
                format!("http://localhost:{}", p),
            ]
        })
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    let public_routes = Router::new().route("/health", get(handlers::health));

    let protected_routes = Router::new()
        .route(
            "/chat",
            post(handlers::chat).layer(DefaultBodyLimit::max(ATTACHMENT_BODY_LIMIT)),
        )
        .route("/chat/extract-days", post(handlers::extract_days))
        .route(
            "/chat/upload",
            post(handlers::upload).layer(DefaultBodyLimit::max(ATTACHMENT_BODY_LIMIT)),
        )
        .route(
            "/chat/history",
            get(handlers::list_history).post(handlers::create_history),
        )
        .route(
            "/chat/history/{id}",
            get(handlers::get_history).put(handlers::put_history),
        )
        .route("/bank/transactions", get(handlers::bank_transactions))
        .route("/bank/accounts", get(handlers::bank_accounts))
        .route("/bank/investments", get(handlers::bank_investments))
        .route("/bank/link-token", post(handlers::create_link_token))
        .route("/bank/exchange", post(handlers::exchange_public_token))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve on 127.0.0.1 at the configured port until `shutdown` resolves.
pub async fn start_server<F>(config: &ArgoConfig, state: AppState, shutdown: F) -> Result<(), ArgoError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("127.0.0.1:{}", config.general.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
