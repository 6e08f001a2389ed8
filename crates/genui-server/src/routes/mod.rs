// Export route modules
pub mod auth;
pub mod data;
pub mod reply;

use crate::state::AppState;
use axum::Router;

// Function to configure all routes
pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(reply::routes(state.clone()))
        .merge(auth::routes(state.clone()))
        .merge(data::routes(state))
}
