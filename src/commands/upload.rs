// 上传命令

use crate::audio::separator::SeparationRequest;
use crate::commands::AppState;
use crate::error::{AppError, AppResult};
use crate::jobs::spawn_separation;
use crate::storage::AUDIO_EXT;
use crate::utils::{generate_id, song_name_from_filename};
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// 上传表单中文件字段的名称
const FILE_FIELD: &str = "file";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub song: String,
}

/// 上传 MP3 并在后台启动分离，立即返回歌曲标识
pub async fn upload_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidArgument("缺少文件名".to_string()))?;

        // 只看扩展名，不校验内容
        if !filename.ends_with(&format!(".{}", AUDIO_EXT)) {
            return Err(AppError::InvalidArgument("仅支持 MP3 文件".to_string()));
        }

        let song = song_name_from_filename(&filename);
        let input_path = state.layout.upload_path(&song);
        info!("[UPLOAD] 接收文件: {:?} -> {}", filename, input_path.display());

        // 同名文件直接覆盖；上传中断时保留原文件
        let written = save_field(&mut field, &input_path).await?;
        info!("[UPLOAD] 已保存 {} 字节", written);

        let run_id = state.jobs.begin(&song);
        let request = SeparationRequest {
            program: state.separator_program.clone(),
            model: state.layout.model().to_string(),
            output_dir: state.layout.outputs_dir().to_path_buf(),
            input_path,
        };
        spawn_separation(state.jobs.clone(), song.clone(), run_id, request);

        return Ok(Json(UploadResponse { song }));
    }

    Err(AppError::InvalidArgument(format!("缺少 {} 字段", FILE_FIELD)))
}

/// 先写入同目录下的临时文件，完整接收后再改名覆盖目标
async fn save_field(field: &mut Field<'_>, target: &Path) -> AppResult<u64> {
    let part_path = target.with_extension(format!("{}.{}.part", AUDIO_EXT, generate_id()));

    let result = write_field(field, &part_path).await;
    let written = match result {
        Ok(written) => written,
        Err(e) => {
            warn!("[UPLOAD] 接收中断，丢弃临时文件 {}: {}", part_path.display(), e);
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(e);
        }
    };

    if let Err(e) = tokio::fs::rename(&part_path, target).await {
        let _ = tokio::fs::remove_file(&part_path).await;
        return Err(e.into());
    }
    Ok(written)
}

async fn write_field(field: &mut Field<'_>, path: &Path) -> AppResult<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written: u64 = 0;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
