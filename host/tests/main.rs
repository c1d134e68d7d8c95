use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use hashcrack_broker::{BrokerError, BrokerResult, Publisher};
use hashcrack_host::{consumer, submission, sweeper};
use hashcrack_lib::{
    generate, hasher,
    message::{ResultMessage, ResultStatus, TaskMessage},
};
use hashcrack_store::{InMemoryStore, RequestStatus, StateStore};
use pretty_assertions::assert_eq;

/// Captures published task messages; optionally fails publishes by their
/// zero-based sequence number, which is how broker outages are scripted.
#[derive(Default)]
struct RecordingPublisher {
    tasks: Mutex<Vec<TaskMessage>>,
    fail_when: Option<fn(usize) -> bool>,
    calls: AtomicUsize,
}

impl RecordingPublisher {
    fn flaky(fail_when: fn(usize) -> bool) -> Self {
        Self {
            fail_when: Some(fail_when),
            ..Default::default()
        }
    }

    fn published(&self) -> Vec<TaskMessage> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Publisher for RecordingPublisher {
    async fn publish_task(&self, message: &TaskMessage) -> BrokerResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_when.is_some_and(|fails| fails(call)) {
            return Err(BrokerError::Unconfirmed);
        }
        self.tasks.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn publish_result(&self, _message: &ResultMessage) -> BrokerResult<()> {
        Ok(())
    }
}

/// What a worker would do with the task, minus the broker round trip.
fn run_task(message: &TaskMessage) -> ResultMessage {
    let results = generate::candidates(message.start_index, message.count, message.max_length)
        .map(|candidate| candidate.expect("task range stays inside the keyspace"))
        .filter(|candidate| hasher::matches(candidate, &message.target_hash))
        .collect();
    ResultMessage {
        task_id: message.task_id.clone(),
        request_id: message.request_id.clone(),
        status: ResultStatus::Done,
        results,
    }
}

async fn ingest_all(store: &InMemoryStore, tasks: &[TaskMessage]) -> Vec<ResultMessage> {
    let mut results = Vec::new();
    for task in tasks {
        let result = run_task(task);
        consumer::ingest(store, &result).await.unwrap();
        results.push(result);
    }
    results
}

#[tokio::test]
async fn search_finds_the_preimage() {
    let store = InMemoryStore::default();
    let publisher = RecordingPublisher::default();

    let outcome = submission::submit(
        &store,
        &publisher,
        hasher::md5_hex("abc"),
        3,
        10_000,
    )
    .await
    .unwrap();
    assert_eq!(outcome.task_total, 5);
    assert_eq!(outcome.publish_failures, 0);

    let tasks = publisher.published();
    assert_eq!(tasks.len(), 5);
    ingest_all(&store, &tasks).await;

    let request = store.get_request(&outcome.request_id).await.unwrap().unwrap();
    assert_eq!(request.status, RequestStatus::Ready);
    assert_eq!(request.results, vec!["abc".to_owned()]);
    assert!(request.completed_at.is_some());
}

#[tokio::test]
async fn length_one_band_is_searched() {
    let store = InMemoryStore::default();
    let publisher = RecordingPublisher::default();

    // "a" sits at global index 0; a single task covers both length bands.
    let outcome = submission::submit(&store, &publisher, hasher::md5_hex("a"), 2, 100_000)
        .await
        .unwrap();
    assert_eq!(outcome.task_total, 1);

    ingest_all(&store, &publisher.published()).await;

    let request = store.get_request(&outcome.request_id).await.unwrap().unwrap();
    assert_eq!(request.status, RequestStatus::Ready);
    assert_eq!(request.results, vec!["a".to_owned()]);
}

#[tokio::test]
async fn unmatched_search_still_reaches_ready() {
    let store = InMemoryStore::default();
    let publisher = RecordingPublisher::default();

    let zero_digest = "0".repeat(32);
    let outcome = submission::submit(&store, &publisher, zero_digest, 1, 100_000)
        .await
        .unwrap();

    ingest_all(&store, &publisher.published()).await;

    let request = store.get_request(&outcome.request_id).await.unwrap().unwrap();
    assert_eq!(request.status, RequestStatus::Ready);
    assert!(request.results.is_empty());
}

#[tokio::test]
async fn failed_publishes_recover_through_the_sweeper() {
    let store = InMemoryStore::default();
    // 3 of the 5 submission publishes fail.
    let flaky = RecordingPublisher::flaky(|call| call < 3);

    let outcome = submission::submit(&store, &flaky, hasher::md5_hex("abc"), 3, 10_000)
        .await
        .unwrap();
    assert_eq!(outcome.task_total, 5);
    assert_eq!(outcome.publish_failures, 3);
    assert_eq!(flaky.published().len(), 2);

    let stranded = store.tasks_needing_retry().await.unwrap();
    assert_eq!(stranded.len(), 3);

    // Broker is back; one sweep republishes the stranded tasks and clears
    // the flags without touching task status.
    let steady = RecordingPublisher::default();
    let retried = sweeper::sweep_once(&store, &steady).await.unwrap();
    assert_eq!(retried, 3);
    assert!(store.tasks_needing_retry().await.unwrap().is_empty());
    assert_eq!(steady.published().len(), 3);

    let mut tasks = flaky.published();
    tasks.extend(steady.published());
    ingest_all(&store, &tasks).await;

    let request = store.get_request(&outcome.request_id).await.unwrap().unwrap();
    assert_eq!(request.status, RequestStatus::Ready);
    assert_eq!(request.results, vec!["abc".to_owned()]);
}

#[tokio::test]
async fn sweeper_keeps_the_flag_while_the_broker_is_down() {
    let store = InMemoryStore::default();
    let down = RecordingPublisher::flaky(|_| true);

    submission::submit(&store, &down, hasher::md5_hex("abc"), 2, 1000)
        .await
        .unwrap();
    assert_eq!(store.tasks_needing_retry().await.unwrap().len(), 2);

    let retried = sweeper::sweep_once(&store, &down).await.unwrap();
    assert_eq!(retried, 0);
    assert_eq!(store.tasks_needing_retry().await.unwrap().len(), 2);
}

#[tokio::test]
async fn redelivered_results_are_idempotent() {
    let store = InMemoryStore::default();
    let publisher = RecordingPublisher::default();

    let outcome = submission::submit(&store, &publisher, hasher::md5_hex("ab"), 2, 100_000)
        .await
        .unwrap();

    let results = ingest_all(&store, &publisher.published()).await;

    // Redeliver everything, twice.
    for _ in 0..2 {
        for result in &results {
            consumer::ingest(&store, result).await.unwrap();
        }
    }

    let request = store.get_request(&outcome.request_id).await.unwrap().unwrap();
    assert_eq!(request.status, RequestStatus::Ready);
    assert_eq!(request.results, vec!["ab".to_owned()]);
}

#[tokio::test]
async fn ready_is_never_reverted_by_late_results() {
    let store = InMemoryStore::default();
    let publisher = RecordingPublisher::default();

    let outcome = submission::submit(&store, &publisher, hasher::md5_hex("a"), 1, 100_000)
        .await
        .unwrap();
    let tasks = publisher.published();
    ingest_all(&store, &tasks).await;

    // A worker that redid the task after a crash reports ERROR this time.
    let late = ResultMessage {
        task_id: tasks[0].task_id.clone(),
        request_id: tasks[0].request_id.clone(),
        status: ResultStatus::Error,
        results: vec![],
    };
    let transitioned = consumer::ingest(&store, &late).await.unwrap();
    assert!(!transitioned);

    let request = store.get_request(&outcome.request_id).await.unwrap().unwrap();
    assert_eq!(request.status, RequestStatus::Ready);
    assert_eq!(request.results, vec!["a".to_owned()]);
}
