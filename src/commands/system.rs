// 系统命令

use crate::audio::separator::check_separator;
use crate::commands::AppState;
use crate::error::{AppError, AppResult};
use crate::jobs::JobRecord;
use crate::utils::DependencyCheck;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::info;

// demucs 可用性缓存（进程生命周期内只检测一次）
static SEPARATOR_CHECK_CACHE: OnceLock<DependencyCheck> = OnceLock::new();

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub separator: DependencyCheck,
}

/// 检测 demucs（带缓存）
pub fn detect_separator(program: &str) -> DependencyCheck {
    SEPARATOR_CHECK_CACHE
        .get_or_init(|| {
            let check = check_separator(program);
            info!("[SYSTEM] demucs 检测结果: available={}, {}", check.available, check.message);
            check
        })
        .clone()
}

/// 启动时在后台预检测 demucs，避免首次 /health 阻塞
pub fn preload_separator_check(program: String) {
    std::thread::spawn(move || {
        detect_separator(&program);
    });
}

/// 服务状态
pub async fn health(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let program = state.separator_program.clone();
    let separator = tokio::task::spawn_blocking(move || detect_separator(&program)).await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        separator,
    }))
}

/// 查询某首歌最近一次分离任务
pub async fn get_status(
    State(state): State<AppState>,
    Path(song): Path<String>,
) -> AppResult<Json<JobRecord>> {
    state
        .jobs
        .get(&song)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("没有该歌曲的分离任务: {}", song)))
}
