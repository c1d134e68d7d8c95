use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    CrackRequest, RequestCounts, RequestStatus, StateStore, StoreError, StoreResult, TaskCounts,
    TaskProgress, TaskRecord, TaskState,
};

/// In-memory backend, used by tests and single-node local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    db: Arc<Mutex<InMemoryDb>>,
}

#[derive(Debug, Default)]
struct InMemoryDb {
    requests: HashMap<String, CrackRequest>,
    tasks: HashMap<String, TaskRecord>,
}

impl InMemoryDb {
    fn request_mut(&mut self, request_id: &str) -> StoreResult<&mut CrackRequest> {
        self.requests.get_mut(request_id).ok_or(StoreError::NoData)
    }

    fn task_mut(&mut self, task_id: &str) -> StoreResult<&mut TaskRecord> {
        self.tasks.get_mut(task_id).ok_or(StoreError::NoData)
    }
}

#[async_trait::async_trait]
impl StateStore for InMemoryStore {
    async fn insert_request(&self, request: &CrackRequest) -> StoreResult<()> {
        let mut db = self.db.lock().await;
        debug!(request_id = %request.request_id, "inserting request");
        db.requests
            .insert(request.request_id.clone(), request.clone());
        Ok(())
    }

    async fn insert_tasks(&self, tasks: &[TaskRecord]) -> StoreResult<()> {
        let mut db = self.db.lock().await;
        for task in tasks {
            db.tasks.insert(task.task_id.clone(), task.clone());
        }
        Ok(())
    }

    async fn get_request(&self, request_id: &str) -> StoreResult<Option<CrackRequest>> {
        let db = self.db.lock().await;
        Ok(db.requests.get(request_id).cloned())
    }

    async fn mark_task_queued(&self, task_id: &str) -> StoreResult<()> {
        let mut db = self.db.lock().await;
        let task = db.task_mut(task_id)?;
        task.status = TaskState::Queued;
        task.needs_retry = true;
        Ok(())
    }

    async fn complete_task(
        &self,
        task_id: &str,
        status: TaskState,
        results: &[String],
    ) -> StoreResult<()> {
        let mut db = self.db.lock().await;
        let task = db.task_mut(task_id)?;
        if task.status.is_terminal() {
            return Ok(());
        }
        task.status = status;
        task.completed_at = Some(Utc::now());
        if !results.is_empty() {
            task.results = results.to_vec();
        }
        Ok(())
    }

    async fn add_request_results(&self, request_id: &str, results: &[String]) -> StoreResult<()> {
        let mut db = self.db.lock().await;
        let request = db.request_mut(request_id)?;
        for result in results {
            if !request.results.contains(result) {
                request.results.push(result.clone());
            }
        }
        request.updated_at = Utc::now();
        Ok(())
    }

    async fn request_task_counts(&self, request_id: &str) -> StoreResult<TaskProgress> {
        let db = self.db.lock().await;
        let mut progress = TaskProgress::default();
        for task in db.tasks.values().filter(|t| t.request_id == request_id) {
            progress.total += 1;
            if task.status == TaskState::Done {
                progress.done += 1;
            }
            if task.status.is_terminal() {
                progress.terminal += 1;
            }
        }
        Ok(progress)
    }

    async fn mark_request_ready(&self, request_id: &str) -> StoreResult<bool> {
        let mut db = self.db.lock().await;
        let request = db.request_mut(request_id)?;
        if request.status != RequestStatus::InProgress {
            return Ok(false);
        }
        let now = Utc::now();
        request.status = RequestStatus::Ready;
        request.completed_at = Some(now);
        request.updated_at = now;
        Ok(true)
    }

    async fn mark_request_error(&self, request_id: &str) -> StoreResult<()> {
        let mut db = self.db.lock().await;
        let request = db.request_mut(request_id)?;
        if request.status == RequestStatus::InProgress {
            let now = Utc::now();
            request.status = RequestStatus::Error;
            request.completed_at = Some(now);
            request.updated_at = now;
        }
        Ok(())
    }

    async fn tasks_needing_retry(&self) -> StoreResult<Vec<TaskRecord>> {
        let db = self.db.lock().await;
        Ok(db
            .tasks
            .values()
            .filter(|t| t.needs_retry && t.status == TaskState::Queued)
            .cloned()
            .collect())
    }

    async fn clear_retry_flag(&self, task_id: &str) -> StoreResult<()> {
        let mut db = self.db.lock().await;
        db.task_mut(task_id)?.needs_retry = false;
        Ok(())
    }

    async fn request_counts(&self) -> StoreResult<RequestCounts> {
        let db = self.db.lock().await;
        let mut counts = RequestCounts::default();
        for request in db.requests.values() {
            counts.total += 1;
            match request.status {
                RequestStatus::InProgress => counts.in_progress += 1,
                RequestStatus::Ready => counts.completed += 1,
                RequestStatus::Error => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn task_counts(&self) -> StoreResult<TaskCounts> {
        let db = self.db.lock().await;
        let mut counts = TaskCounts::default();
        for task in db.tasks.values() {
            counts.total += 1;
            match task.status {
                TaskState::Pending => counts.pending += 1,
                TaskState::Queued => counts.queued += 1,
                TaskState::Done => counts.done += 1,
                TaskState::Error => counts.error += 1,
            }
        }
        Ok(counts)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
