// 音轨分离模块 - 调用 demucs

use crate::error::{AppError, AppResult};
use crate::storage::list_stems_in;
use crate::utils::{DependencyCheck, get_exe_dir, hidden_command};
use std::path::PathBuf;
use std::process::Stdio;
use tracing::{info, error, debug};

/// 失败时保留的 stderr 末尾字符数
const STDERR_TAIL_CHARS: usize = 500;

/// 一次分离的参数
#[derive(Debug, Clone)]
pub struct SeparationRequest {
    /// demucs 可执行文件
    pub program: String,
    /// 模型名称 (-n)
    pub model: String,
    /// 输出根目录 (-o)
    pub output_dir: PathBuf,
    /// 输入音频
    pub input_path: PathBuf,
}

impl SeparationRequest {
    /// demucs 的命令行参数
    pub fn args(&self) -> Vec<String> {
        vec![
            "-n".to_string(),
            self.model.clone(),
            "--mp3".to_string(),
            "-o".to_string(),
            self.output_dir.to_string_lossy().to_string(),
            self.input_path.to_string_lossy().to_string(),
        ]
    }

    /// demucs 输出约定: <output_dir>/<model>/<输入文件名去扩展名>/
    pub fn stems_dir(&self) -> PathBuf {
        let input_stem = self.input_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        self.output_dir.join(&self.model).join(input_stem)
    }
}

/// 分离结果
#[derive(Debug, Clone)]
pub struct SeparationResult {
    pub stems_dir: PathBuf,
    pub stems: Vec<String>,
}

/// 执行音轨分离，阻塞直到 demucs 进程退出（无超时）
pub fn separate_stems(request: &SeparationRequest) -> AppResult<SeparationResult> {
    info!("=== 开始音轨分离 (demucs) ===");
    info!("输入文件: {}", request.input_path.display());
    info!("输出目录: {}", request.output_dir.display());

    std::fs::create_dir_all(&request.output_dir)?;

    let args = request.args();
    info!("demucs 命令: {} {}", request.program, args.join(" "));

    let output = hidden_command(&request.program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            error!("启动 demucs 失败: {}", e);
            AppError::DependencyMissing(format!("启动 {} 失败: {}", request.program, e))
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        debug!("demucs stderr: {}", line);
    }

    info!("demucs 进程退出码: {:?}", output.status.code());

    if !output.status.success() {
        let tail = stderr_tail(&stderr);
        error!("demucs 处理失败，退出码: {:?}", output.status.code());
        let error_msg = if tail.is_empty() {
            format!("demucs 处理失败，退出码 {:?}（无详细错误信息）", output.status.code())
        } else {
            format!("demucs 处理失败，退出码 {:?}: {}", output.status.code(), tail)
        };
        return Err(AppError::Separation(error_msg));
    }

    let stems_dir = request.stems_dir();
    let stems = list_stems_in(&stems_dir);
    info!("demucs 处理成功，生成音轨: {:?}", stems);

    Ok(SeparationResult { stems_dir, stems })
}

/// 取 stderr 最后一段，便于记录失败原因
fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let count = trimmed.chars().count();
    trimmed.chars().skip(count.saturating_sub(STDERR_TAIL_CHARS)).collect()
}

/// 解析 demucs 路径
/// 配置优先，其次打包版本，否则使用系统 PATH 中的版本
pub fn resolve_separator_path(configured: &str) -> String {
    if !configured.trim().is_empty() {
        return configured.to_string();
    }

    if let Some(exe_dir) = get_exe_dir() {
        let exe_name = if cfg!(windows) { "demucs.exe" } else { "demucs" };
        let bundled_path = exe_dir.join("demucs").join(exe_name);
        if bundled_path.exists() {
            return bundled_path.to_string_lossy().to_string();
        }
    }

    "demucs".to_string()
}

/// 检查 demucs 是否可用
pub fn check_separator(program: &str) -> DependencyCheck {
    match hidden_command(program)
        .arg("--help")
        .stdin(Stdio::null())
        .output()
    {
        Ok(output) if output.status.success() => DependencyCheck {
            name: "demucs".to_string(),
            available: true,
            path: Some(program.to_string()),
            message: "demucs 可用".to_string(),
        },
        Ok(output) => DependencyCheck {
            name: "demucs".to_string(),
            available: false,
            path: Some(program.to_string()),
            message: format!("demucs 运行异常，退出码 {:?}", output.status.code()),
        },
        Err(e) => DependencyCheck {
            name: "demucs".to_string(),
            available: false,
            path: None,
            message: format!("未找到 demucs ({}): {}", program, e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn request(dir: &Path, program: &str) -> SeparationRequest {
        SeparationRequest {
            program: program.to_string(),
            model: "htdemucs".to_string(),
            output_dir: dir.join("outputs"),
            input_path: dir.join("uploads").join("My_Song__.mp3"),
        }
    }

    #[test]
    fn test_args_match_demucs_cli() {
        let req = request(Path::new("/srv"), "demucs");
        assert_eq!(
            req.args(),
            vec!["-n", "htdemucs", "--mp3", "-o", "/srv/outputs", "/srv/uploads/My_Song__.mp3"]
        );
        assert_eq!(req.stems_dir(), Path::new("/srv/outputs/htdemucs/My_Song__"));
    }

    #[test]
    fn test_stderr_tail_keeps_end() {
        let long = format!("{}END", "x".repeat(STDERR_TAIL_CHARS * 2));
        let tail = stderr_tail(&long);
        assert_eq!(tail.chars().count(), STDERR_TAIL_CHARS);
        assert!(tail.ends_with("END"));
        assert_eq!(stderr_tail("  short \n"), "short");
    }

    #[test]
    fn test_missing_program_is_dependency_error() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), "/nonexistent/demucs-binary");
        let err = separate_stems(&req).unwrap_err();
        assert!(matches!(err, AppError::DependencyMissing(_)));
        // 输出目录在调用工具之前就已创建
        assert!(dir.path().join("outputs").is_dir());
    }

    #[test]
    fn test_check_missing_program() {
        let check = check_separator("/nonexistent/demucs-binary");
        assert!(!check.available);
        assert!(check.path.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let script = crate::test_support::write_script(
            dir.path(),
            "fail.sh",
            "echo 'model not found' >&2\nexit 3\n",
        );
        let req = request(dir.path(), &script);
        let err = separate_stems(&req).unwrap_err();
        match err {
            AppError::Separation(msg) => {
                assert!(msg.contains("Some(3)"), "{}", msg);
                assert!(msg.contains("model not found"), "{}", msg);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_success_lists_stems() {
        let dir = tempfile::tempdir().unwrap();
        let script = crate::test_support::fake_demucs(dir.path());
        let req = request(dir.path(), &script);
        std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
        std::fs::write(&req.input_path, b"ID3 fake").unwrap();

        let result = separate_stems(&req).unwrap();
        assert_eq!(result.stems, vec!["bass", "drums", "other", "vocals"]);
        assert_eq!(
            std::fs::read(result.stems_dir.join("vocals.mp3")).unwrap(),
            b"ID3 fake"
        );
    }
}
