//! Background report generation
//!
//! A single worker drains an mpsc channel of jobs. Every submitted job gets a
//! `watch` channel that carries its state, so handlers can either poll the
//! stored status or await the handle. The file is written under a temporary
//! name and renamed before the store records `completed` with its URL.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::export::{self, RenderOptions, Table};
use shared::models::{ReportFormat, ReportStatus, ReportType};
use shared::types::DateRange;

/// Persistence seen by the worker
#[async_trait]
pub trait ReportStore: Send + Sync + 'static {
    async fn mark_generating(&self, report_id: Uuid) -> AppResult<()>;
    async fn load_table(&self, job: &ReportJob) -> AppResult<Table>;
    async fn mark_completed(&self, report_id: Uuid, file_path: &str, file_url: &str) -> AppResult<()>;
    async fn mark_failed(&self, report_id: Uuid, error: &str) -> AppResult<()>;
}

#[derive(Debug, Clone)]
pub struct ReportJob {
    pub report_id: Uuid,
    pub title: String,
    pub report_type: ReportType,
    pub format: ReportFormat,
    pub date_range: Option<DateRange>,
    pub filters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Generating,
    Completed { file_url: String },
    Failed { error: String },
}

impl JobState {
    pub fn status(&self) -> ReportStatus {
        match self {
            JobState::Pending => ReportStatus::Pending,
            JobState::Generating => ReportStatus::Generating,
            JobState::Completed { .. } => ReportStatus::Completed,
            JobState::Failed { .. } => ReportStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
}

/// Receiving side of one job's state channel
pub struct ReportHandle {
    report_id: Uuid,
    state: watch::Receiver<JobState>,
}

impl ReportHandle {
    pub fn report_id(&self) -> Uuid {
        self.report_id
    }

    pub fn state(&self) -> JobState {
        self.state.borrow().clone()
    }

    /// Wait for a terminal state.
    ///
    /// Returns the last observed state if the worker goes away first.
    pub async fn wait(mut self) -> JobState {
        loop {
            let current = self.state.borrow_and_update().clone();
            if current.is_terminal() {
                return current;
            }
            if self.state.changed().await.is_err() {
                return self.state.borrow().clone();
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub output_dir: PathBuf,
    pub render: RenderOptions,
}

type JobChannels = Arc<Mutex<HashMap<Uuid, watch::Sender<JobState>>>>;

#[derive(Clone)]
pub struct ReportQueue {
    sender: mpsc::Sender<ReportJob>,
    jobs: JobChannels,
}

pub fn download_url(report_id: Uuid) -> String {
    format!("/api/reports/{}/download", report_id)
}

impl ReportQueue {
    /// Spawn the worker and return the queue feeding it
    pub fn start(
        store: Arc<dyn ReportStore>,
        settings: ReportSettings,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let jobs: JobChannels = Arc::new(Mutex::new(HashMap::new()));

        let worker = tokio::spawn(run_worker(receiver, store, settings, jobs.clone()));

        (Self { sender, jobs }, worker)
    }

    pub async fn submit(&self, job: ReportJob) -> AppResult<ReportHandle> {
        let report_id = job.report_id;
        let (tx, rx) = watch::channel(JobState::Pending);
        self.jobs.lock().await.insert(report_id, tx);

        if self.sender.send(job).await.is_err() {
            self.jobs.lock().await.remove(&report_id);
            return Err(AppError::Internal("report queue is not running".to_string()));
        }

        tracing::debug!(report_id = %report_id, "Report job queued");
        Ok(ReportHandle {
            report_id,
            state: rx,
        })
    }

    /// Handle for a job that is still queued or running
    pub async fn subscribe(&self, report_id: Uuid) -> Option<ReportHandle> {
        self.jobs
            .lock()
            .await
            .get(&report_id)
            .map(|tx| ReportHandle {
                report_id,
                state: tx.subscribe(),
            })
    }
}

async fn publish(jobs: &JobChannels, report_id: Uuid, state: JobState) {
    if let Some(tx) = jobs.lock().await.get(&report_id) {
        tx.send_replace(state);
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<ReportJob>,
    store: Arc<dyn ReportStore>,
    settings: ReportSettings,
    jobs: JobChannels,
) {
    tracing::info!(output_dir = %settings.output_dir.display(), "Report worker started");

    while let Some(job) = receiver.recv().await {
        let report_id = job.report_id;

        let final_state = match generate(store.as_ref(), &settings, &job, &jobs).await {
            Ok(file_url) => {
                tracing::info!(report_id = %report_id, file_url = %file_url, "Report completed");
                JobState::Completed { file_url }
            }
            Err(err) => {
                tracing::error!(report_id = %report_id, error = %err, "Report generation failed");
                let error = err.public_message();
                if let Err(store_err) = store.mark_failed(report_id, &error).await {
                    tracing::error!(report_id = %report_id, error = %store_err, "Could not record report failure");
                }
                JobState::Failed { error }
            }
        };

        if let Some(tx) = jobs.lock().await.remove(&report_id) {
            tx.send_replace(final_state);
        }
    }

    tracing::info!("Report worker stopped");
}

async fn generate(
    store: &dyn ReportStore,
    settings: &ReportSettings,
    job: &ReportJob,
    jobs: &JobChannels,
) -> AppResult<String> {
    store.mark_generating(job.report_id).await?;
    publish(jobs, job.report_id, JobState::Generating).await;

    let table = store.load_table(job).await?;

    let format = job.format;
    let render = settings.render.clone();
    let bytes = tokio::task::spawn_blocking(move || export::render(format, &table, &render))
        .await
        .map_err(|e| AppError::ReportGeneration(format!("render task failed: {}", e)))??;

    let path = write_report_file(&settings.output_dir, job, &bytes).await?;
    let file_url = download_url(job.report_id);

    if let Err(err) = store
        .mark_completed(job.report_id, &path.to_string_lossy(), &file_url)
        .await
    {
        // The row is gone or no longer generating; the file has no owner.
        let _ = tokio::fs::remove_file(&path).await;
        return Err(err);
    }

    Ok(file_url)
}

fn storage_err(e: std::io::Error) -> AppError {
    AppError::StorageError(e.to_string())
}

async fn write_report_file(dir: &Path, job: &ReportJob, bytes: &[u8]) -> AppResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await.map_err(storage_err)?;

    let file_name = format!("{}.{}", job.report_id, job.format.extension());
    let final_path = dir.join(&file_name);
    let temp_path = dir.join(format!("{}.tmp", file_name));

    tokio::fs::write(&temp_path, bytes).await.map_err(storage_err)?;
    if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(storage_err(e));
    }

    Ok(final_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::export::{Cell, INCIDENT_COLUMNS};
    use std::sync::Mutex as StdMutex;

    struct MemoryStore {
        fail_load: bool,
        events: StdMutex<Vec<ReportStatus>>,
        completed_path: StdMutex<Option<String>>,
    }

    impl MemoryStore {
        fn new(fail_load: bool) -> Arc<Self> {
            Arc::new(Self {
                fail_load,
                events: StdMutex::new(Vec::new()),
                completed_path: StdMutex::new(None),
            })
        }

        fn events(&self) -> Vec<ReportStatus> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReportStore for MemoryStore {
        async fn mark_generating(&self, _report_id: Uuid) -> AppResult<()> {
            self.events.lock().unwrap().push(ReportStatus::Generating);
            Ok(())
        }

        async fn load_table(&self, job: &ReportJob) -> AppResult<Table> {
            if self.fail_load {
                return Err(AppError::ReportGeneration("data set unavailable".to_string()));
            }
            Ok(Table {
                title: job.title.clone(),
                sheet_name: "البلاغات",
                columns: INCIDENT_COLUMNS,
                rows: vec![vec![
                    "1".into(),
                    "fire".into(),
                    "حريق".into(),
                    "الرصيف 3".into(),
                    Cell::Label { ar: "عالية", en: "high" },
                    Cell::Label { ar: "جديد", en: "new" },
                    "سالم".into(),
                    "2024-05-01".into(),
                ]],
            })
        }

        async fn mark_completed(&self, _report_id: Uuid, file_path: &str, _file_url: &str) -> AppResult<()> {
            self.events.lock().unwrap().push(ReportStatus::Completed);
            *self.completed_path.lock().unwrap() = Some(file_path.to_string());
            Ok(())
        }

        async fn mark_failed(&self, _report_id: Uuid, _error: &str) -> AppResult<()> {
            self.events.lock().unwrap().push(ReportStatus::Failed);
            Ok(())
        }
    }

    fn job(format: ReportFormat) -> ReportJob {
        ReportJob {
            report_id: Uuid::new_v4(),
            title: "تقرير البلاغات".to_string(),
            report_type: ReportType::Incidents,
            format,
            date_range: None,
            filters: Map::new(),
        }
    }

    fn settings(dir: &Path) -> ReportSettings {
        ReportSettings {
            output_dir: dir.to_path_buf(),
            render: RenderOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_csv_report_completes_and_file_is_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(false);
        let (queue, _worker) = ReportQueue::start(store.clone(), settings(dir.path()), 4);

        let job = job(ReportFormat::Csv);
        let report_id = job.report_id;
        let handle = queue.submit(job).await.unwrap();
        assert_eq!(handle.report_id(), report_id);

        let state = handle.wait().await;
        assert_eq!(
            state,
            JobState::Completed {
                file_url: download_url(report_id)
            }
        );
        assert_eq!(
            store.events(),
            vec![ReportStatus::Generating, ReportStatus::Completed]
        );

        let path = dir.path().join(format!("{}.csv", report_id));
        assert_eq!(
            store.completed_path.lock().unwrap().as_deref(),
            Some(&*path.to_string_lossy())
        );
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(&[0xEF, 0xBB, 0xBF]));
        assert!(String::from_utf8_lossy(&bytes).contains("رقم البلاغ"));
        assert!(!dir.path().join(format!("{}.csv.tmp", report_id)).exists());
    }

    #[tokio::test]
    async fn test_failed_load_marks_report_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(true);
        let (queue, _worker) = ReportQueue::start(store.clone(), settings(dir.path()), 4);

        let job = job(ReportFormat::Excel);
        let report_id = job.report_id;
        let state = queue.submit(job).await.unwrap().wait().await;

        match state {
            JobState::Failed { error } => assert!(error.contains("data set unavailable")),
            other => panic!("unexpected state: {:?}", other),
        }
        assert_eq!(store.events(), vec![ReportStatus::Generating, ReportStatus::Failed]);
        assert!(!dir.path().join(format!("{}.xlsx", report_id)).exists());
    }

    #[tokio::test]
    async fn test_pdf_without_font_fails_on_arabic_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(false);
        let (queue, _worker) = ReportQueue::start(store.clone(), settings(dir.path()), 4);

        let job = job(ReportFormat::Pdf);
        let report_id = job.report_id;
        let state = queue.submit(job).await.unwrap().wait().await;

        match state {
            JobState::Failed { error } => assert!(error.contains("pdf_font_path")),
            other => panic!("unexpected state: {:?}", other),
        }
        assert_eq!(store.events(), vec![ReportStatus::Generating, ReportStatus::Failed]);
        assert!(!dir.path().join(format!("{}.pdf", report_id)).exists());
        assert!(!dir.path().join(format!("{}.pdf.tmp", report_id)).exists());
    }

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(false);
        let (queue, _worker) = ReportQueue::start(store.clone(), settings(dir.path()), 1);

        let first = queue.submit(job(ReportFormat::Csv)).await.unwrap();
        let second = queue.submit(job(ReportFormat::Csv)).await.unwrap();

        assert!(matches!(second.wait().await, JobState::Completed { .. }));
        assert!(matches!(first.state(), JobState::Completed { .. }));
        assert!(queue.subscribe(Uuid::new_v4()).await.is_none());
    }
}
