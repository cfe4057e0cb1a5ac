pub mod cache;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::pipeline::handlers as generate;
use crate::resume::handlers as resume;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Generation
        .route(
            "/generate_resume",
            post(generate::handle_generate_resume).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Current resume
        .route("/resume/content", get(resume::handle_get_content))
        .route("/resume/download", get(resume::handle_download))
        .route("/resume/edit-section", post(resume::handle_edit_section))
        .route("/resume/edit-item-field", post(resume::handle_edit_item_field))
        .route(
            "/resume/edit-bullet-point",
            post(resume::handle_edit_bullet_point),
        )
        .route(
            "/resume/edit-bullet-with-ai",
            post(resume::handle_edit_bullet_with_ai),
        )
        .route("/resume/manage-bullet", post(resume::handle_manage_bullet))
        .route("/resume/manage-item", post(resume::handle_manage_item))
        // Step cache
        .route(
            "/cache",
            get(cache::handle_cache_stats).delete(cache::handle_clear_cache),
        )
        .with_state(state)
}
