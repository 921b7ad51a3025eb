use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every route here sits behind the `auth_middleware` layer, so handlers always receive
/// a resolved `AuthUser`. Reads are open to both roles (scoped by ownership or parent
/// link); writes are reserved for the owning child.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The caller's profile; parents also get their linked children.
        .route("/me", get(handlers::get_me))
        // --- Folders ---
        .route(
            "/folders",
            post(handlers::create_folder).get(handlers::list_folders),
        )
        .route(
            "/folders/{id}",
            get(handlers::get_folder).delete(handlers::delete_folder),
        )
        // --- Notes ---
        // GET /notes?folder_id=...&tag=...
        .route(
            "/notes",
            post(handlers::create_note).get(handlers::list_notes),
        )
        .route(
            "/notes/{id}",
            get(handlers::get_note)
                .put(handlers::update_note)
                .delete(handlers::delete_note),
        )
}
