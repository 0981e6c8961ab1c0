// 存储目录布局
//
// <base>/uploads/<song>.mp3                 上传的原始文件
// <base>/outputs/<model>/<song>/<stem>.mp3  demucs 输出的音轨

use crate::error::{AppError, AppResult};
use crate::utils::is_plain_component;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// 上传与输出使用的音频扩展名
pub const AUDIO_EXT: &str = "mp3";

#[derive(Debug, Clone)]
pub struct StorageLayout {
    uploads_dir: PathBuf,
    outputs_dir: PathBuf,
    model: String,
}

impl StorageLayout {
    pub fn new(base_dir: &Path, model: &str) -> Self {
        Self {
            uploads_dir: base_dir.join("uploads"),
            outputs_dir: base_dir.join("outputs"),
            model: model.to_string(),
        }
    }

    /// 创建上传目录与输出目录（已存在时不做任何事）
    pub fn ensure_dirs(&self) -> AppResult<()> {
        fs::create_dir_all(&self.uploads_dir)?;
        fs::create_dir_all(&self.outputs_dir)?;
        info!("上传目录: {}", self.uploads_dir.display());
        info!("输出目录: {}", self.outputs_dir.display());
        Ok(())
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs_dir
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// 上传文件保存位置
    pub fn upload_path(&self, song: &str) -> PathBuf {
        self.uploads_dir.join(format!("{}.{}", song, AUDIO_EXT))
    }

    /// 某首歌的输出目录
    pub fn song_output_dir(&self, song: &str) -> PathBuf {
        self.outputs_dir.join(&self.model).join(song)
    }

    /// 某个音轨文件的期望路径
    ///
    /// song/stem 来自 URL，必须是单个普通路径段，否则视为不存在
    pub fn stem_path(&self, song: &str, stem: &str) -> AppResult<PathBuf> {
        if !is_plain_component(song) || !is_plain_component(stem) {
            return Err(AppError::NotFound(format!("文件不存在: {}/{}", song, stem)));
        }
        Ok(self.song_output_dir(song).join(format!("{}.{}", stem, AUDIO_EXT)))
    }
}

/// 列出目录中的 MP3 音轨名（按名称排序），目录不存在时为空
pub fn list_stems_in(dir: &Path) -> Vec<String> {
    let mut stems: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| {
                    path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(AUDIO_EXT)
                })
                .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().to_string()))
                .collect()
        })
        .unwrap_or_default();
    stems.sort();
    stems
}
