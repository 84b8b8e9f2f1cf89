use axum::Router;
use domain_users::{UsersState, handlers};

pub mod health;

/// Creates the API routes without the `/api` prefix.
/// The `/api` prefix will be added by the `create_router` helper.
pub fn routes(state: &crate::state::AppState) -> eyre::Result<Router> {
    let pagination = state.config.pagination;
    let users = UsersState::new(state.user_service()?)
        .with_page_sizes(pagination.default_per_page, pagination.max_per_page);

    Ok(handlers::router(users))
}

/// Creates a router with the /ready endpoint that performs actual health checks.
///
/// This router has state applied and can be merged with the stateless app router
/// from `create_router`.
pub fn ready_router(state: crate::state::AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}
