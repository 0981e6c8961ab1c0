// 音频处理模块
//
// 子模块：
// - separator: 音轨分离（调用 demucs，输出 vocals/drums/bass/other 等 MP3 音轨）

pub mod separator;
