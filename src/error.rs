// 错误处理模块

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("上传解析错误: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("音轨分离错误: {0}")]
    Separation(String),

    #[error("依赖缺失: {0}")]
    DependencyMissing(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("未找到: {0}")]
    NotFound(String),

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl AppError {
    /// 对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidArgument(_) | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回给客户端的说明文字（不带错误分类前缀）
    fn detail(&self) -> String {
        match self {
            AppError::NotFound(msg) | AppError::InvalidArgument(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// 错误响应体，与 {"detail": "..."} 格式保持一致
#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("请求处理失败: {}", self);
        }
        (status, Json(ErrorBody { detail: self.detail() })).into_response()
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("后台任务异常退出: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;
