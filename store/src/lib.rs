use chrono::{DateTime, Utc};
use hashcrack_lib::{
    keyspace::Partition,
    message::{ResultStatus, TaskMessage},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub use mem_db::InMemoryStore;
pub use mongo_db::{MongoStore, MongoStoreOpts};

mod mem_db;
mod mongo_db;

// Types
// ----------------------------------------------------------------
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document store error: {0}")]
    Backend(String),
    #[error("no data for key")]
    NoData,
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<mongodb::error::Error> for StoreError {
    fn from(error: mongodb::error::Error) -> StoreError {
        StoreError::Backend(error.to_string())
    }
}

/// Lifecycle of one client submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    InProgress,
    Ready,
    Error,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::InProgress => "IN_PROGRESS",
            RequestStatus::Ready => "READY",
            RequestStatus::Error => "ERROR",
        }
    }
}

/// Lifecycle of one dispatched task.
///
/// `Pending` means the task row exists and its message was handed to the
/// broker; `Queued` means the publish failed and the retry sweeper owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Queued,
    Done,
    Error,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Queued => "QUEUED",
            TaskState::Done => "DONE",
            TaskState::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Error)
    }
}

impl From<ResultStatus> for TaskState {
    fn from(status: ResultStatus) -> TaskState {
        match status {
            ResultStatus::Done => TaskState::Done,
            ResultStatus::Error => TaskState::Error,
        }
    }
}

/// One client submission: the target digest and the length bound to search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrackRequest {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub hash: String,
    #[serde(rename = "maxLength")]
    pub max_length: u8,
    pub status: RequestStatus,
    pub results: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl CrackRequest {
    /// `hash` must already be normalized to lowercase hex.
    pub fn new(hash: String, max_length: u8) -> Self {
        let now = Utc::now();
        Self {
            request_id: Uuid::new_v4().to_string(),
            hash,
            max_length,
            status: RequestStatus::InProgress,
            results: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// One contiguous slice of a request's keyspace, dispatched to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(rename = "taskId")]
    pub task_id: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(rename = "startIndex")]
    pub start_index: u64,
    pub count: u64,
    #[serde(rename = "targetHash")]
    pub target_hash: String,
    #[serde(rename = "maxLength")]
    pub max_length: u8,
    pub status: TaskState,
    pub results: Vec<String>,
    pub needs_retry: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(request: &CrackRequest, partition: Partition) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            request_id: request.request_id.clone(),
            start_index: partition.start_index,
            count: partition.count,
            target_hash: request.hash.clone(),
            max_length: request.max_length,
            status: TaskState::Pending,
            results: Vec::new(),
            needs_retry: false,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn to_message(&self) -> TaskMessage {
        TaskMessage {
            task_id: self.task_id.clone(),
            request_id: self.request_id.clone(),
            start_index: self.start_index,
            count: self.count,
            target_hash: self.target_hash.clone(),
            max_length: self.max_length,
        }
    }
}

/// Primary-read task tallies for one request, used by the completion check
/// and the progress computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskProgress {
    pub total: u64,
    pub done: u64,
    pub terminal: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, ToSchema)]
pub struct RequestCounts {
    pub total: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, ToSchema)]
pub struct TaskCounts {
    pub total: u64,
    pub pending: u64,
    pub queued: u64,
    pub done: u64,
    pub error: u64,
}

// Store interface
// ----------------------------------------------------------------
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    async fn insert_request(&self, request: &CrackRequest) -> StoreResult<()>;

    async fn insert_tasks(&self, tasks: &[TaskRecord]) -> StoreResult<()>;

    /// Status reads may be served from a secondary.
    async fn get_request(&self, request_id: &str) -> StoreResult<Option<CrackRequest>>;

    /// Marks a task whose publish failed; the retry sweeper picks it up.
    async fn mark_task_queued(&self, task_id: &str) -> StoreResult<()>;

    /// Record a worker result on the task row. A task already in a terminal
    /// state is left unchanged so redeliveries are no-ops.
    async fn complete_task(
        &self,
        task_id: &str,
        status: TaskState,
        results: &[String],
    ) -> StoreResult<()>;

    /// Set-union append of discovered preimages onto the owning request.
    async fn add_request_results(&self, request_id: &str, results: &[String]) -> StoreResult<()>;

    /// Task tallies for `request_id`; must observe the store's own writes.
    async fn request_task_counts(&self, request_id: &str) -> StoreResult<TaskProgress>;

    /// `IN_PROGRESS` to `READY`; idempotent, never reverts a terminal state.
    /// Returns whether this call performed the transition.
    async fn mark_request_ready(&self, request_id: &str) -> StoreResult<bool>;

    /// Terminal marker for submission-path infrastructure failures.
    async fn mark_request_error(&self, request_id: &str) -> StoreResult<()>;

    /// Tasks flagged `needs_retry` that are still `QUEUED`.
    async fn tasks_needing_retry(&self) -> StoreResult<Vec<TaskRecord>>;

    async fn clear_retry_flag(&self, task_id: &str) -> StoreResult<()>;

    async fn request_counts(&self) -> StoreResult<RequestCounts>;

    async fn task_counts(&self) -> StoreResult<TaskCounts>;

    async fn ping(&self) -> StoreResult<()>;
}

// Backend dispatch
// ----------------------------------------------------------------
#[derive(Clone)]
pub enum Store {
    InMemory(InMemoryStore),
    Mongo(MongoStore),
}

#[async_trait::async_trait]
impl StateStore for Store {
    async fn insert_request(&self, request: &CrackRequest) -> StoreResult<()> {
        match self {
            Store::InMemory(store) => store.insert_request(request).await,
            Store::Mongo(store) => store.insert_request(request).await,
        }
    }

    async fn insert_tasks(&self, tasks: &[TaskRecord]) -> StoreResult<()> {
        match self {
            Store::InMemory(store) => store.insert_tasks(tasks).await,
            Store::Mongo(store) => store.insert_tasks(tasks).await,
        }
    }

    async fn get_request(&self, request_id: &str) -> StoreResult<Option<CrackRequest>> {
        match self {
            Store::InMemory(store) => store.get_request(request_id).await,
            Store::Mongo(store) => store.get_request(request_id).await,
        }
    }

    async fn mark_task_queued(&self, task_id: &str) -> StoreResult<()> {
        match self {
            Store::InMemory(store) => store.mark_task_queued(task_id).await,
            Store::Mongo(store) => store.mark_task_queued(task_id).await,
        }
    }

    async fn complete_task(
        &self,
        task_id: &str,
        status: TaskState,
        results: &[String],
    ) -> StoreResult<()> {
        match self {
            Store::InMemory(store) => store.complete_task(task_id, status, results).await,
            Store::Mongo(store) => store.complete_task(task_id, status, results).await,
        }
    }

    async fn add_request_results(&self, request_id: &str, results: &[String]) -> StoreResult<()> {
        match self {
            Store::InMemory(store) => store.add_request_results(request_id, results).await,
            Store::Mongo(store) => store.add_request_results(request_id, results).await,
        }
    }

    async fn request_task_counts(&self, request_id: &str) -> StoreResult<TaskProgress> {
        match self {
            Store::InMemory(store) => store.request_task_counts(request_id).await,
            Store::Mongo(store) => store.request_task_counts(request_id).await,
        }
    }

    async fn mark_request_ready(&self, request_id: &str) -> StoreResult<bool> {
        match self {
            Store::InMemory(store) => store.mark_request_ready(request_id).await,
            Store::Mongo(store) => store.mark_request_ready(request_id).await,
        }
    }

    async fn mark_request_error(&self, request_id: &str) -> StoreResult<()> {
        match self {
            Store::InMemory(store) => store.mark_request_error(request_id).await,
            Store::Mongo(store) => store.mark_request_error(request_id).await,
        }
    }

    async fn tasks_needing_retry(&self) -> StoreResult<Vec<TaskRecord>> {
        match self {
            Store::InMemory(store) => store.tasks_needing_retry().await,
            Store::Mongo(store) => store.tasks_needing_retry().await,
        }
    }

    async fn clear_retry_flag(&self, task_id: &str) -> StoreResult<()> {
        match self {
            Store::InMemory(store) => store.clear_retry_flag(task_id).await,
            Store::Mongo(store) => store.clear_retry_flag(task_id).await,
        }
    }

    async fn request_counts(&self) -> StoreResult<RequestCounts> {
        match self {
            Store::InMemory(store) => store.request_counts().await,
            Store::Mongo(store) => store.request_counts().await,
        }
    }

    async fn task_counts(&self) -> StoreResult<TaskCounts> {
        match self {
            Store::InMemory(store) => store.task_counts().await,
            Store::Mongo(store) => store.task_counts().await,
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        match self {
            Store::InMemory(store) => store.ping().await,
            Store::Mongo(store) => store.ping().await,
        }
    }
}
