// 命令模块：HTTP 路由与共享状态

pub mod system;
pub mod upload;
pub mod stems;

use crate::config::FetchConfig;
use crate::jobs::JobRegistry;
use crate::storage::StorageLayout;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub layout: Arc<StorageLayout>,
    pub jobs: Arc<JobRegistry>,
    pub separator_program: String,
    pub fetch: FetchConfig,
    pub max_upload_bytes: usize,
}

pub fn app_router(state: AppState) -> Router {
    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        .route(
            "/upload",
            post(upload::upload_audio).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/audio/{song}/{stem}", get(stems::get_audio))
        .route("/download/{song}/{stem}", get(stems::download_audio))
        .route("/status/{song}", get(system::get_status))
        .route("/health", get(system::health))
        // 允许任意来源并携带凭据：回显请求的 Origin/Headers
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
