// src/routes.rs

use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::{
    docs::ApiDoc,
    handlers::{admin, auth, exam},
    state::AppState,
    utils::jwt::{admin_middleware, candidate_middleware},
};

/// Assembles the main application router.
///
/// * Merges the auth, exam and admin sub-routers.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (database pool and config).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let auth_routes = Router::new().route("/login", post(auth::login));

    let exam_routes = Router::new()
        .route("/questions", get(exam::get_questions))
        .route("/start", post(exam::start_exam))
        .route("/submit", post(exam::submit_exam))
        .route("/result", get(exam::get_result))
        .route("/attempt", get(exam::get_attempt))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            candidate_middleware,
        ));

    let admin_routes = Router::new()
        .route("/upload-users", post(admin::upload_users))
        .route(
            "/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route(
            "/questions/{id}",
            put(admin::update_question)
                .patch(admin::update_question)
                .delete(admin::delete_question),
        )
        .route(
            "/config",
            get(admin::get_config)
                .post(admin::update_config)
                .put(admin::update_config),
        )
        .route("/results", get(admin::list_results))
        .route(
            "/candidates/{id}/eligibility",
            put(admin::update_eligibility),
        )
        .route(
            "/candidates/{id}/attempt",
            get(admin::get_candidate_attempt),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_middleware,
        ))
        // Token exchange sits outside the admin guard.
        .route("/login", post(admin::admin_login));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/exam", exam_routes)
        .nest("/api/admin", admin_routes)
        .route(
            "/api/docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
