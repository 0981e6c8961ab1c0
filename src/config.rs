// 配置管理模块

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::fs;
use std::time::Duration;
use crate::error::{AppError, AppResult};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::info;

static CONFIG: OnceCell<RwLock<ServerConfig>> = OnceCell::new();

/// 配置文件名（位于服务根目录）
pub const CONFIG_FILE_NAME: &str = "config.json";

/// 日志级别
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// 转换为 tracing 过滤器字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// 音轨分离配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    /// demucs 可执行文件，留空时自动查找
    pub program: String,
    /// 模型名称，同时决定输出子目录
    pub model: String,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            model: "htdemucs".to_string(),
        }
    }
}

/// 音频获取轮询配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// 最多检查次数
    pub poll_attempts: u32,
    /// 两次检查之间的间隔 (毫秒)
    pub poll_interval_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            poll_attempts: 120,
            poll_interval_ms: 1000,
        }
    }
}

/// 单次音频获取最长等待时间，超大配置值按此截断
pub const MAX_FETCH_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

impl FetchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 总等待窗口 = 次数 × 间隔，不超过 MAX_FETCH_WINDOW
    pub fn wait_window(&self) -> Duration {
        self.poll_interval()
            .saturating_mul(self.poll_attempts)
            .min(MAX_FETCH_WINDOW)
    }
}

/// 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub bind_addr: String,
    /// 音轨分离配置
    pub separation: SeparationConfig,
    /// 音频获取轮询配置
    pub fetch: FetchConfig,
    /// 上传请求体上限 (字节)
    pub max_upload_bytes: usize,
    /// 日志级别
    pub log_level: LogLevel,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            separation: SeparationConfig::default(),
            fetch: FetchConfig::default(),
            max_upload_bytes: 512 * 1024 * 1024,
            log_level: LogLevel::default(),
        }
    }
}

/// 读取配置文件，文件不存在时写入默认配置
pub fn load_config(config_path: &Path) -> AppResult<ServerConfig> {
    if config_path.exists() {
        let content = fs::read_to_string(config_path)?;
        Ok(serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("配置文件 JSON 解析失败: {}，使用默认配置", e);
            ServerConfig::default()
        }))
    } else {
        let config = ServerConfig::default();
        let content = serde_json::to_string_pretty(&config)?;
        fs::write(config_path, content)?;
        Ok(config)
    }
}

/// 初始化配置
pub fn init_config(config_path: &Path) -> AppResult<()> {
    let config = load_config(config_path)?;

    if config.separation.model.trim().is_empty() {
        return Err(AppError::Config("separation.model 不能为空".to_string()));
    }

    info!("[CONFIG] 配置已加载: {}", config_path.display());

    CONFIG.set(RwLock::new(config))
        .map_err(|_| AppError::Config("配置已初始化".to_string()))?;

    Ok(())
}

/// 获取配置
pub fn get_config() -> ServerConfig {
    CONFIG.get()
        .map(|c| c.read().clone())
        .unwrap_or_default()
}
