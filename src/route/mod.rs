use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api;
use crate::state::SharedState;

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        // AI queues
        .route("/api/ai/queues", get(api::ai::get_queue_status))
        .route("/api/ai/queues/{queue_id}", get(api::ai::get_queue_detail))
        .route(
            "/api/ai/queues/{queue_id}/retry",
            post(api::ai::retry_queue_failed_items),
        )
        .route("/api/ai/items/{item_id}/retry", post(api::ai::retry_task_item))
        .route("/api/ai/items/{item_id}", delete(api::ai::ignore_task_item))
        // Providers
        .route(
            "/api/ai/providers",
            get(api::providers::list_providers).post(api::providers::create_provider),
        )
        .route(
            "/api/ai/providers/{provider_id}",
            put(api::providers::update_provider).delete(api::providers::delete_provider),
        )
        .route(
            "/api/ai/providers/{provider_id}/test",
            post(api::ai::test_provider_connection),
        )
        // Search
        .route("/api/search/semantic", post(api::search::semantic_search))
        .route(
            "/api/search/optimize-prompt",
            post(api::search::optimize_prompt),
        )
        // Settings
        .route(
            "/api/settings",
            get(api::settings::get_settings).put(api::settings::update_settings),
        )
        // Storage migrations
        .route(
            "/api/migrations",
            get(api::migrations::list_migrations).post(api::migrations::create_migration),
        )
        .route(
            "/api/migrations/preview",
            post(api::migrations::preview_migration),
        )
        .route(
            "/api/migrations/{task_id}/pause",
            post(api::migrations::pause_migration),
        )
        .route(
            "/api/migrations/{task_id}/resume",
            post(api::migrations::resume_migration),
        )
        .route(
            "/api/migrations/{task_id}/retry",
            post(api::migrations::retry_failed_files),
        )
        .route(
            "/api/migrations/{task_id}",
            delete(api::migrations::dismiss_migration),
        )
        .route(
            "/api/migrations/{task_id}/failures",
            get(api::migrations::get_failed_file_records),
        )
        // Smart albums
        .route(
            "/api/smart-albums/tasks",
            post(api::smart_albums::submit_smart_album_task),
        )
        .route(
            "/api/smart-albums/tasks/current",
            get(api::smart_albums::get_current_task_status),
        )
        // Push channel
        .route("/api/ws", get(api::ws::ws_handler))
        .route("/health", get(|| async { "ok" }))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
