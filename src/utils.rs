// 工具模块

use std::path::{Component, Path, PathBuf};
use std::process::Command;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;

/// Windows 下隐藏控制台窗口的标志
#[cfg(target_os = "windows")]
pub const CREATE_NO_WINDOW: u32 = 0x08000000;

/// 服务根目录环境变量
pub const HOME_ENV: &str = "STEMSPLIT_HOME";

/// 文件名中不安全的字符
static UNSAFE_NAME_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^a-zA-Z0-9_-]").expect("静态正则表达式无效")
});

/// 创建一个隐藏控制台窗口的 Command（Windows 专用）
/// 在非 Windows 平台上等同于 Command::new
#[cfg(target_os = "windows")]
pub fn hidden_command(program: &str) -> Command {
    let mut cmd = Command::new(program);
    cmd.creation_flags(CREATE_NO_WINDOW);
    cmd
}

#[cfg(not(target_os = "windows"))]
pub fn hidden_command(program: &str) -> Command {
    Command::new(program)
}

/// 依赖检查结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyCheck {
    pub name: String,
    pub available: bool,
    pub path: Option<String>,
    pub message: String,
}

/// 生成 UUID
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 获取可执行文件所在目录
pub fn get_exe_dir() -> Option<PathBuf> {
    std::env::current_exe().ok()?.parent().map(|p| p.to_path_buf())
}

/// 获取服务根目录（uploads/outputs/logs/config.json 所在位置）
pub fn get_base_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }

    if let Some(exe_dir) = get_exe_dir() {
        // 开发模式下，exe 在 target/{debug,release} 目录，需要回到项目根目录
        let in_target = ["debug", "release"].iter().any(|profile| {
            exe_dir.ends_with(Path::new("target").join(profile))
        });
        if in_target {
            if let Some(root) = exe_dir.parent().and_then(|p| p.parent()) {
                return root.to_path_buf();
            }
        }
        return exe_dir;
    }

    // 回退到当前工作目录
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// 将任意名称转换为文件系统安全的标识：
/// `[A-Za-z0-9_-]` 以外的每个字符替换为 `_`
pub fn sanitize_name(name: &str) -> String {
    UNSAFE_NAME_CHARS.replace_all(name, "_").into_owned()
}

/// 去掉上传文件名的扩展名后生成歌曲标识
pub fn song_name_from_filename(filename: &str) -> String {
    sanitize_name(strip_extension(filename))
}

/// 去掉最后一个扩展名；文件名部分开头的点不算扩展名分隔符，
/// 因此 `.mp3`、`..mp3`、`a/.mp3` 保持原样
fn strip_extension(filename: &str) -> &str {
    let name_start = filename.rfind('/').map(|i| i + 1).unwrap_or(0);
    let dot = match filename.rfind('.') {
        Some(dot) if dot >= name_start => dot,
        _ => return filename,
    };
    if filename[name_start..dot].chars().any(|c| c != '.') {
        &filename[..dot]
    } else {
        filename
    }
}

/// 路径参数是否为单个普通路径段（不含分隔符、不是 `.`/`..`）
pub fn is_plain_component(segment: &str) -> bool {
    if segment.is_empty() || segment.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
