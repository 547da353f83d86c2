// src/docs.rs

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::handlers::{admin, auth, exam};

/// OpenAPI description of the whole HTTP surface, served at `/api/docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        exam::get_questions,
        exam::start_exam,
        exam::submit_exam,
        exam::get_result,
        exam::get_attempt,
        admin::admin_login,
        admin::upload_users,
        admin::list_questions,
        admin::create_question,
        admin::update_question,
        admin::delete_question,
        admin::get_config,
        admin::update_config,
        admin::list_results,
        admin::update_eligibility,
        admin::get_candidate_attempt,
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Candidate login"),
        (name = "exam", description = "Candidate exam session"),
        (name = "admin", description = "Roster, question bank, config and results"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
