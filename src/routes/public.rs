use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a bearer token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check; never touches the database.
        .route("/health", get(handlers::health))
        // POST /signup
        // Account creation. Children must link to an existing parent.
        .route("/signup", post(handlers::signup))
        // POST /login
        // Issues the bearer token used by every authenticated route.
        .route("/login", post(handlers::login))
}
