// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, attempt},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Every route requires a bearer token; quiz publishing also requires the admin role.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let quiz_routes = Router::new().route("/{quiz_id}/attempts", post(attempt::start_attempt));

    let attempt_routes = Router::new()
        .route("/{session_id}", get(attempt::get_status))
        .route("/{session_id}/questions", get(attempt::list_questions))
        .route("/{session_id}/answers", post(attempt::submit_answer))
        .route("/{session_id}/finalize", post(attempt::finalize_attempt))
        .route(
            "/{session_id}/result",
            get(attempt::get_result).delete(attempt::clear_result),
        );

    let admin_routes = Router::new()
        .route("/quizzes", post(admin::publish_quiz))
        // Auth runs first, then the admin check
        .layer(middleware::from_fn(admin_middleware));

    Router::new()
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/attempts", attempt_routes)
        .nest("/api/admin", admin_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
