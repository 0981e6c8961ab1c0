// StemSplit - 日志管理模块
// 文件日志按天轮转，异步写入

use std::path::Path;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use crate::config::{ServerConfig, LogLevel, CONFIG_FILE_NAME};

/// 日志保留天数
const LOG_RETENTION_DAYS: u64 = 7;

/// 日志文件名前缀
const LOG_FILE_PREFIX: &str = "stemsplit.log";

/// 从配置文件读取日志级别（此时配置模块尚未初始化）
fn read_log_level_from_config(base_dir: &Path) -> LogLevel {
    fs::read_to_string(base_dir.join(CONFIG_FILE_NAME))
        .ok()
        .and_then(|content| serde_json::from_str::<ServerConfig>(&content).ok())
        .map(|config| config.log_level)
        .unwrap_or_default()
}

/// 初始化日志系统
///
/// 返回 WorkerGuard，必须在 main 中保持存活，否则异步日志线程会提前退出
pub fn init_logging(base_dir: &Path) -> WorkerGuard {
    let log_dir = base_dir.join("logs");

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("创建日志目录失败: {}", e);
    }

    cleanup_old_logs(&log_dir);

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let log_level = read_log_level_from_config(base_dir);

    // RUST_LOG 优先；否则使用配置级别，hyper 只记录 warn
    let filter_string = format!("{},hyper=warn,tower_http=info", log_level.as_str());
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&filter_string));

    let file_layer = fmt::layer()
        .with_writer(non_blocking_writer)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(true);

    // 控制台日志层 - 仅在 debug 模式下启用
    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }

    guard
}

/// 清理超过保留期限的旧日志文件
fn cleanup_old_logs(log_dir: &Path) {
    let now = std::time::SystemTime::now();
    let retention = std::time::Duration::from_secs(LOG_RETENTION_DAYS * 24 * 60 * 60);

    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|name| name.starts_with(LOG_FILE_PREFIX))
            .unwrap_or(false);
        if !is_log {
            continue;
        }

        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => continue,
        };

        if let Ok(age) = now.duration_since(modified) {
            if age > retention {
                if let Err(e) = fs::remove_file(&path) {
                    eprintln!("删除旧日志文件失败 {:?}: {}", path, e);
                }
            }
        }
    }
}
