// 分离任务登记
//
// 按歌曲名记录最近一次分离任务的状态。读取接口仍以文件是否存在为准，
// 这里的记录只用于 /status 诊断和唤醒等待中的 /audio 请求。

use crate::audio::separator::{self, SeparationRequest};
use crate::error::AppError;
use crate::utils::generate_id;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, error, warn};

/// 任务状态
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Failed,
}

/// 任务记录
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub song: String,
    pub run_id: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stems: Vec<String>,
    pub error: Option<String>,
}

/// 已结束任务记录的默认保留数量
pub const MAX_FINISHED_RECORDS: usize = 1024;

pub struct JobRegistry {
    jobs: Mutex<HashMap<String, JobRecord>>,
    // 任意任务结束时通知
    finished: Notify,
    max_finished: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_capacity(MAX_FINISHED_RECORDS)
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 最多保留 max_finished 条已结束记录，进行中的任务不受限制
    pub fn with_capacity(max_finished: usize) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            finished: Notify::new(),
            max_finished,
        }
    }

    /// 登记一次新的分离，覆盖同名歌曲之前的记录，返回 run_id
    pub fn begin(&self, song: &str) -> String {
        let run_id = generate_id();
        let record = JobRecord {
            song: song.to_string(),
            run_id: run_id.clone(),
            state: JobState::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            stems: Vec::new(),
            error: None,
        };

        let mut jobs = self.jobs.lock();
        if let Some(previous) = jobs.insert(song.to_string(), record) {
            if matches!(previous.state, JobState::Pending | JobState::Running) {
                warn!("[JOB] {} 上一次分离尚未结束 (run_id={})，新的上传将与其竞争输出文件",
                    song, previous.run_id);
            }
        }
        Self::prune_finished(&mut jobs, self.max_finished);
        run_id
    }

    /// 按结束时间淘汰最旧的已结束记录
    fn prune_finished(jobs: &mut HashMap<String, JobRecord>, max_finished: usize) {
        let mut finished: Vec<(DateTime<Utc>, String)> = jobs
            .values()
            .filter(|r| matches!(r.state, JobState::Done | JobState::Failed))
            .map(|r| (r.finished_at.unwrap_or(r.created_at), r.song.clone()))
            .collect();
        if finished.len() <= max_finished {
            return;
        }

        finished.sort();
        let excess = finished.len() - max_finished;
        for (_, song) in finished.into_iter().take(excess) {
            jobs.remove(&song);
        }
        debug!("[JOB] 已淘汰 {} 条旧任务记录", excess);
    }

    pub fn mark_running(&self, song: &str, run_id: &str) -> bool {
        self.update(song, run_id, |record| {
            record.state = JobState::Running;
            record.started_at = Some(Utc::now());
        })
    }

    pub fn finish_ok(&self, song: &str, run_id: &str, stems: Vec<String>) -> bool {
        let applied = self.update(song, run_id, |record| {
            record.state = JobState::Done;
            record.finished_at = Some(Utc::now());
            record.stems = stems;
        });
        self.finished.notify_waiters();
        applied
    }

    pub fn finish_err(&self, song: &str, run_id: &str, message: String) -> bool {
        let applied = self.update(song, run_id, |record| {
            record.state = JobState::Failed;
            record.finished_at = Some(Utc::now());
            record.error = Some(message);
        });
        self.finished.notify_waiters();
        applied
    }

    /// 获取某首歌的任务快照
    pub fn get(&self, song: &str) -> Option<JobRecord> {
        self.jobs.lock().get(song).cloned()
    }

    /// 等待下一次任意任务结束
    pub async fn wait_any_finished(&self) {
        self.finished.notified().await;
    }

    /// 仅当 run_id 仍是该歌曲最新一次任务时才更新，过期任务不能覆盖新状态
    fn update(&self, song: &str, run_id: &str, apply: impl FnOnce(&mut JobRecord)) -> bool {
        let mut jobs = self.jobs.lock();
        match jobs.get_mut(song) {
            Some(record) if record.run_id == run_id => {
                apply(record);
                true
            }
            _ => {
                info!("[JOB] 忽略过期任务的状态更新: song={}, run_id={}", song, run_id);
                false
            }
        }
    }
}

/// 在后台执行分离，不等待结果；成功、失败或 panic 都记录到登记表
pub fn spawn_separation(
    registry: Arc<JobRegistry>,
    song: String,
    run_id: String,
    request: SeparationRequest,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        registry.mark_running(&song, &run_id);
        info!("[JOB] 开始分离: song={}, run_id={}", song, run_id);

        let result = tokio::task::spawn_blocking(move || separator::separate_stems(&request))
            .await
            .map_err(AppError::from)
            .and_then(|inner| inner);

        match result {
            Ok(separated) => {
                info!("[JOB] 分离完成: song={}, 目录={}, 音轨={:?}",
                    song, separated.stems_dir.display(), separated.stems);
                registry.finish_ok(&song, &run_id, separated.stems);
            }
            Err(e) => {
                error!("[JOB] 分离失败: song={}, run_id={}: {}", song, run_id, e);
                registry.finish_err(&song, &run_id, e.to_string());
            }
        }
    })
}
