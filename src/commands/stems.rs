// 音轨读取命令

use crate::commands::AppState;
use crate::error::{AppError, AppResult};
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use std::path::Path as StdPath;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

const AUDIO_MIME: &str = "audio/mpeg";

/// 获取音轨：文件出现前持续轮询，超过等待窗口返回 404
///
/// 处理中、失败、从未上传三种情况都表现为 404
pub async fn get_audio(
    State(state): State<AppState>,
    Path((song, stem)): Path<(String, String)>,
) -> AppResult<Response> {
    let path = state.layout.stem_path(&song, &stem)?;

    let interval = state.fetch.poll_interval();
    let deadline = Instant::now() + state.fetch.wait_window();

    loop {
        if file_exists(&path).await {
            info!("[AUDIO] {}/{} 已就绪", song, stem);
            let bytes = tokio::fs::read(&path).await?;
            return Ok(([(CONTENT_TYPE, HeaderValue::from_static(AUDIO_MIME))], bytes).into_response());
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }

        // 有任务结束时提前复查一次，等待窗口不变
        tokio::select! {
            _ = sleep_until(next_check(now, interval, deadline)) => {}
            _ = state.jobs.wait_any_finished() => {
                debug!("[AUDIO] 收到任务结束通知，复查 {}/{}", song, stem);
            }
        }
    }

    info!("[AUDIO] {}/{} 等待超时", song, stem);
    Err(AppError::NotFound("音频尚未就绪".to_string()))
}

/// 下载音轨：只检查一次，不等待
pub async fn download_audio(
    State(state): State<AppState>,
    Path((song, stem)): Path<(String, String)>,
) -> AppResult<Response> {
    let path = state.layout.stem_path(&song, &stem)?;

    if !file_exists(&path).await {
        return Err(AppError::NotFound("文件不存在".to_string()));
    }

    let bytes = tokio::fs::read(&path).await?;
    let disposition = HeaderValue::from_str(&attachment_disposition(&format!("{}.mp3", stem)))
        .map_err(|e| AppError::Internal(format!("无效的文件名: {}", e)))?;

    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static(AUDIO_MIME)),
            (CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// 下一次检查的时间点，不晚于截止时间
fn next_check(now: Instant, interval: Duration, deadline: Instant) -> Instant {
    now.checked_add(interval)
        .map_or(deadline, |next| next.min(deadline))
}

async fn file_exists(path: &StdPath) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// 生成 attachment 形式的 Content-Disposition；
/// 非 ASCII 或含引号的文件名使用 RFC 5987 编码
fn attachment_disposition(filename: &str) -> String {
    let plain = filename
        .chars()
        .all(|c| c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\');
    if plain {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let mut encoded = String::new();
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    format!("attachment; filename*=utf-8''{}", encoded)
}
