//! API endpoints.

mod admin;
mod ballot;
mod students;
mod verification;

use axum::{Router, middleware};

use crate::middleware::AppState;
use crate::rate_limit::{RateLimiterState, verification_rate_limit};

/// Create the API router.
pub fn router(limiter: RateLimiterState) -> Router<AppState> {
    Router::new()
        .nest(
            "/verification",
            verification::router().route_layer(middleware::from_fn_with_state(
                limiter,
                verification_rate_limit,
            )),
        )
        .nest("/students", students::router())
        .nest("/ballot", ballot::router())
        .nest("/admin", admin::router())
}
