// 测试辅助：用 shell 脚本模拟 demucs

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// 写入可执行脚本，返回脚本路径
pub fn write_script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().to_string()
}

/// 与 `demucs -n <model> --mp3 -o <out> <input>` 参数一致的假实现：
/// 把输入文件复制为 vocals/drums/bass/other 四个音轨（先写临时文件再改名）
pub fn fake_demucs(dir: &Path) -> String {
    write_script(
        dir,
        "fake-demucs.sh",
        r#"model="$2"
out="$5"
input="$6"
name=$(basename "$input" .mp3)
target="$out/$model/$name"
mkdir -p "$target"
for stem in vocals drums bass other; do
    cp "$input" "$target/$stem.part"
    mv "$target/$stem.part" "$target/$stem.mp3"
done
"#,
    )
}

/// 总是失败的 demucs
pub fn failing_demucs(dir: &Path) -> String {
    write_script(dir, "failing-demucs.sh", "echo 'CUDA out of memory' >&2\nexit 1\n")
}
