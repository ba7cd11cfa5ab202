// Server module - HTTP server setup and routing
pub mod handlers;
pub mod mock_api;
pub mod state;

use std::net::SocketAddr;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use self::state::AppState;
use crate::config::create_cors_layer;

/// Create the Axum application router with all routes and middleware
pub fn create_app(state: AppState, cors_origins: &[String]) -> Router {
    let public = ServeDir::new(state.store().root());

    let api = Router::new()
        .route("/generate/jdl", post(handlers::generate_jdl))
        .route("/generate/json", post(handlers::generate_json))
        .route("/generate/prototype", post(handlers::generate_prototype))
        .route("/generate/json-server", post(handlers::generate_json_server))
        .route("/generate/crud", post(handlers::generate_crud))
        .route("/generate/project", post(handlers::generate_project))
        .route("/generate/code", post(handlers::generate_code))
        .route("/validate/jdl", post(handlers::validate_jdl))
        .route("/validate/requirements", post(handlers::validate_requirements))
        .route("/research/entities", post(handlers::research_entities))
        .route("/research/requirements", post(handlers::research_requirements))
        .route("/projects", get(handlers::list_projects))
        .route(
            "/projects/:name",
            get(handlers::get_project).delete(handlers::delete_project),
        );

    let mock = Router::new()
        .route(
            "/:project/:collection",
            get(mock_api::list).post(mock_api::create),
        )
        .route(
            "/:project/:collection/:id",
            get(mock_api::show)
                .put(mock_api::replace)
                .patch(mock_api::update)
                .delete(mock_api::remove),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api-docs", get(handlers::api_docs))
        .nest("/api", api)
        .nest("/mock", mock)
        .nest_service("/public", public)
        .fallback(handlers::not_found)
        .layer(create_cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the server on the specified address until Ctrl-C
pub async fn run_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    info!("Server listening on {}", addr);
    info!("- API docs: http://{}/api-docs", addr);
    info!("- Health endpoint: http://{}/health", addr);
    info!("- Mock backend: http://{}/mock/<project>/<collection>", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
