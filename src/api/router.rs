//! Route table.

use axum::Router;
use axum::routing::{get, patch, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let proposal_routes = Router::new()
        .route(
            "/proposals",
            get(handlers::list_proposals).post(handlers::create_proposal),
        )
        .route("/proposals/pending", get(handlers::list_pending))
        .route("/proposals/pending/count", get(handlers::pending_count))
        .route("/proposals/approved", get(handlers::list_approved))
        .route("/proposals/all", get(handlers::list_by_update))
        .route(
            "/proposals/{id}",
            get(handlers::get_proposal)
                .patch(handlers::update_proposal)
                .delete(handlers::delete_proposal),
        )
        .route(
            "/proposals/{id}/vote",
            post(handlers::cast_vote).delete(handlers::retract_vote),
        );

    let admin_routes = Router::new()
        .route(
            "/admin/proposals",
            get(handlers::admin_list_proposals).post(handlers::create_approved),
        )
        .route(
            "/admin/users",
            get(handlers::list_users).post(handlers::upsert_user),
        )
        .route(
            "/admin/users/{id}",
            patch(handlers::set_admin).delete(handlers::delete_user),
        )
        .route("/admin/users/{id}/api-key", post(handlers::issue_api_key))
        .route("/admin/audit", get(handlers::list_audit))
        .route("/setlist/reorder", patch(handlers::reorder_setlist))
        .route(
            "/settings",
            get(handlers::get_settings).patch(handlers::update_settings),
        );

    Router::new()
        .merge(proposal_routes)
        .merge(admin_routes)
        .route("/stream", get(handlers::event_stream))
        .route("/health", get(handlers::health))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
