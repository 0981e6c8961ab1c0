// StemSplit - MP3 音轨分离 HTTP 服务
// 主入口文件

mod audio;
mod commands;
mod config;
mod error;
mod jobs;
mod logging;
mod storage;
mod utils;

#[cfg(all(test, unix))]
mod test_support;

use crate::audio::separator::resolve_separator_path;
use crate::commands::AppState;
use crate::config::CONFIG_FILE_NAME;
use crate::error::AppResult;
use crate::jobs::JobRegistry;
use crate::storage::StorageLayout;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn, error};

#[tokio::main]
async fn main() -> ExitCode {
    let base_dir = utils::get_base_dir();
    if let Err(e) = std::fs::create_dir_all(&base_dir) {
        eprintln!("创建服务目录失败 {:?}: {}", base_dir, e);
        return ExitCode::FAILURE;
    }

    // guard 必须保持存活，否则异步日志线程会退出
    let _log_guard = logging::init_logging(&base_dir);

    info!("StemSplit 启动中...");
    info!("服务目录: {:?}", base_dir);

    match run(&base_dir).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("服务运行失败: {}", e);
            eprintln!("服务运行失败: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(base_dir: &Path) -> AppResult<()> {
    config::init_config(&base_dir.join(CONFIG_FILE_NAME))?;
    let config = config::get_config();

    let layout = StorageLayout::new(base_dir, &config.separation.model);
    layout.ensure_dirs()?;

    let separator_program = resolve_separator_path(&config.separation.program);
    info!("demucs 路径: {}", separator_program);
    info!("分离模型: {}", config.separation.model);

    // 异步预检测 demucs，避免首次查询时阻塞
    commands::system::preload_separator_check(separator_program.clone());

    let state = AppState {
        layout: Arc::new(layout),
        jobs: Arc::new(JobRegistry::new()),
        separator_program,
        fetch: config.fetch.clone(),
        max_upload_bytes: config.max_upload_bytes,
    };
    let app = commands::app_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("StemSplit 已启动，监听 {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("StemSplit 已停止");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("收到退出信号，正在停止..."),
        Err(e) => {
            warn!("无法监听退出信号: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
