use std::time::Duration;

use chrono::Utc;
use futures_util::TryStreamExt;
use hashcrack_lib::retry::{run_with_retries, RetryPolicy};
use mongodb::{
    bson::{doc, to_bson, Bson},
    options::{
        Acknowledgment, ClientOptions, CollectionOptions, IndexOptions, ReadPreference,
        SelectionCriteria, ServerAddress, WriteConcern,
    },
    Client, Collection, Database, IndexModel,
};
use tracing::info;

use crate::{
    CrackRequest, RequestCounts, RequestStatus, StateStore, StoreResult, TaskCounts, TaskProgress,
    TaskRecord, TaskState,
};

const DB_NAME: &str = "hashcrack";
const REQUESTS: &str = "requests";
const TASKS: &str = "tasks";

const OP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct MongoStoreOpts {
    pub host: String,
    pub port: u16,
    /// Replica set name; `None` for a standalone server.
    pub replica_set: Option<String>,
    pub retry: RetryPolicy,
}

/// MongoDB backend.
///
/// Writes go through majority write concern with a 5 s timeout. Status
/// reads are served through a secondary-preferred handle; the completion
/// check and retry queries read from the primary so the manager observes
/// its own writes.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
    requests: Collection<CrackRequest>,
    requests_secondary: Collection<CrackRequest>,
    tasks: Collection<TaskRecord>,
}

impl MongoStore {
    pub async fn connect(opts: &MongoStoreOpts) -> StoreResult<Self> {
        let client_options = ClientOptions::builder()
            .hosts(vec![ServerAddress::Tcp {
                host: opts.host.clone(),
                port: Some(opts.port),
            }])
            .repl_set_name(opts.replica_set.clone())
            .server_selection_timeout(OP_TIMEOUT)
            .connect_timeout(OP_TIMEOUT)
            .build();
        let client = Client::with_options(client_options)?;
        let db = client.database(DB_NAME);

        let write_concern = WriteConcern::builder()
            .w(Acknowledgment::Majority)
            .w_timeout(OP_TIMEOUT)
            .build();
        let primary = CollectionOptions::builder()
            .write_concern(write_concern.clone())
            .build();
        let secondary_preferred = CollectionOptions::builder()
            .write_concern(write_concern)
            .selection_criteria(SelectionCriteria::ReadPreference(
                ReadPreference::SecondaryPreferred {
                    options: Default::default(),
                },
            ))
            .build();

        let store = Self {
            requests: db.collection_with_options(REQUESTS, primary.clone()),
            requests_secondary: db.collection_with_options(REQUESTS, secondary_preferred),
            tasks: db.collection_with_options(TASKS, primary),
            db,
        };

        run_with_retries(&opts.retry, || store.ping()).await?;
        store.create_indexes().await?;
        info!(host = %opts.host, port = opts.port, "connected to MongoDB");
        Ok(store)
    }

    async fn create_indexes(&self) -> StoreResult<()> {
        let unique = IndexOptions::builder().unique(true).build();

        self.requests
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "requestId": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await?;
        self.requests
            .create_index(IndexModel::builder().keys(doc! { "status": 1 }).build())
            .await?;
        self.requests
            .create_index(IndexModel::builder().keys(doc! { "created_at": 1 }).build())
            .await?;

        self.tasks
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "taskId": 1 })
                    .options(unique)
                    .build(),
            )
            .await?;
        for keys in [
            doc! { "requestId": 1 },
            doc! { "status": 1 },
            doc! { "needs_retry": 1 },
        ] {
            self.tasks
                .create_index(IndexModel::builder().keys(keys).build())
                .await?;
        }
        Ok(())
    }

    fn now() -> Bson {
        // Same serde representation as the entities' chrono fields.
        to_bson(&Utc::now()).unwrap_or_else(|_| Bson::Null)
    }
}

#[async_trait::async_trait]
impl StateStore for MongoStore {
    async fn insert_request(&self, request: &CrackRequest) -> StoreResult<()> {
        self.requests.insert_one(request).await?;
        Ok(())
    }

    async fn insert_tasks(&self, tasks: &[TaskRecord]) -> StoreResult<()> {
        if tasks.is_empty() {
            return Ok(());
        }
        self.tasks.insert_many(tasks).await?;
        Ok(())
    }

    async fn get_request(&self, request_id: &str) -> StoreResult<Option<CrackRequest>> {
        Ok(self
            .requests_secondary
            .find_one(doc! { "requestId": request_id })
            .await?)
    }

    async fn mark_task_queued(&self, task_id: &str) -> StoreResult<()> {
        self.tasks
            .update_one(
                doc! { "taskId": task_id },
                doc! { "$set": {
                    "status": TaskState::Queued.as_str(),
                    "needs_retry": true,
                } },
            )
            .await?;
        Ok(())
    }

    async fn complete_task(
        &self,
        task_id: &str,
        status: TaskState,
        results: &[String],
    ) -> StoreResult<()> {
        // The terminal-state guard in the filter makes redeliveries no-ops.
        let filter = doc! {
            "taskId": task_id,
            "status": { "$nin": [TaskState::Done.as_str(), TaskState::Error.as_str()] },
        };
        let mut set = doc! {
            "status": status.as_str(),
            "completed_at": Self::now(),
        };
        if !results.is_empty() {
            set.insert("results", results.to_vec());
        }
        self.tasks.update_one(filter, doc! { "$set": set }).await?;
        Ok(())
    }

    async fn add_request_results(&self, request_id: &str, results: &[String]) -> StoreResult<()> {
        self.requests
            .update_one(
                doc! { "requestId": request_id },
                doc! {
                    "$addToSet": { "results": { "$each": results.to_vec() } },
                    "$set": { "updated_at": Self::now() },
                },
            )
            .await?;
        Ok(())
    }

    async fn request_task_counts(&self, request_id: &str) -> StoreResult<TaskProgress> {
        let total = self
            .tasks
            .count_documents(doc! { "requestId": request_id })
            .await?;
        let done = self
            .tasks
            .count_documents(doc! {
                "requestId": request_id,
                "status": TaskState::Done.as_str(),
            })
            .await?;
        let terminal = self
            .tasks
            .count_documents(doc! {
                "requestId": request_id,
                "status": { "$in": [TaskState::Done.as_str(), TaskState::Error.as_str()] },
            })
            .await?;
        Ok(TaskProgress {
            total,
            done,
            terminal,
        })
    }

    async fn mark_request_ready(&self, request_id: &str) -> StoreResult<bool> {
        let now = Self::now();
        let update = self
            .requests
            .update_one(
                doc! {
                    "requestId": request_id,
                    "status": RequestStatus::InProgress.as_str(),
                },
                doc! { "$set": {
                    "status": RequestStatus::Ready.as_str(),
                    "completed_at": now.clone(),
                    "updated_at": now,
                } },
            )
            .await?;
        Ok(update.modified_count > 0)
    }

    async fn mark_request_error(&self, request_id: &str) -> StoreResult<()> {
        let now = Self::now();
        self.requests
            .update_one(
                doc! {
                    "requestId": request_id,
                    "status": RequestStatus::InProgress.as_str(),
                },
                doc! { "$set": {
                    "status": RequestStatus::Error.as_str(),
                    "completed_at": now.clone(),
                    "updated_at": now,
                } },
            )
            .await?;
        Ok(())
    }

    async fn tasks_needing_retry(&self) -> StoreResult<Vec<TaskRecord>> {
        let cursor = self
            .tasks
            .find(doc! {
                "needs_retry": true,
                "status": TaskState::Queued.as_str(),
            })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn clear_retry_flag(&self, task_id: &str) -> StoreResult<()> {
        self.tasks
            .update_one(
                doc! { "taskId": task_id },
                doc! { "$set": { "needs_retry": false } },
            )
            .await?;
        Ok(())
    }

    async fn request_counts(&self) -> StoreResult<RequestCounts> {
        Ok(RequestCounts {
            total: self.requests.count_documents(doc! {}).await?,
            in_progress: self
                .requests
                .count_documents(doc! { "status": RequestStatus::InProgress.as_str() })
                .await?,
            completed: self
                .requests
                .count_documents(doc! { "status": RequestStatus::Ready.as_str() })
                .await?,
            failed: self
                .requests
                .count_documents(doc! { "status": RequestStatus::Error.as_str() })
                .await?,
        })
    }

    async fn task_counts(&self) -> StoreResult<TaskCounts> {
        Ok(TaskCounts {
            total: self.tasks.count_documents(doc! {}).await?,
            pending: self
                .tasks
                .count_documents(doc! { "status": TaskState::Pending.as_str() })
                .await?,
            queued: self
                .tasks
                .count_documents(doc! { "status": TaskState::Queued.as_str() })
                .await?,
            done: self
                .tasks
                .count_documents(doc! { "status": TaskState::Done.as_str() })
                .await?,
            error: self
                .tasks
                .count_documents(doc! { "status": TaskState::Error.as_str() })
                .await?,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
