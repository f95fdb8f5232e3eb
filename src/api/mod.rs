mod handlers;
pub mod middleware;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::db::Database;

/// Router with a permissive CORS policy.
pub fn create_router(db: Database) -> Router {
    create_router_with_cors(db, None)
}

pub fn create_router_with_cors(db: Database, cors_origins: Option<&[String]>) -> Router {
    let notes = Router::new()
        .route("/notes", get(handlers::list_notes))
        .route("/notes", post(handlers::create_note))
        .route("/notes/{id}", put(handlers::update_note))
        .route("/notes/{id}", delete(handlers::delete_trashed_note))
        .route("/notes/{id}/trash", post(handlers::trash_note))
        .route("/trash", delete(handlers::empty_trash))
        .route_layer(from_fn_with_state(db.clone(), middleware::require_session));

    let api = Router::new()
        .merge(notes)
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::cors_layer(cors_origins)),
        )
        .with_state(db)
}
