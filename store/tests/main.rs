use hashcrack_lib::keyspace::{partition, total_combinations};
use hashcrack_store::{
    CrackRequest, InMemoryStore, RequestStatus, StateStore, Store, TaskRecord, TaskState,
};
use pretty_assertions::assert_eq;

fn seed_request(max_length: u8, task_size: u64) -> (CrackRequest, Vec<TaskRecord>) {
    let request = CrackRequest::new("900150983cd24fb0d6963f7d28e17f72".to_owned(), max_length);
    let tasks = partition(total_combinations(max_length), task_size)
        .into_iter()
        .map(|p| TaskRecord::new(&request, p))
        .collect();
    (request, tasks)
}

#[tokio::test]
async fn request_lifecycle_reaches_ready() {
    let store = Store::InMemory(InMemoryStore::default());
    let (request, tasks) = seed_request(2, 1000);
    assert_eq!(tasks.len(), 2);

    store.insert_request(&request).await.unwrap();
    store.insert_tasks(&tasks).await.unwrap();

    let progress = store.request_task_counts(&request.request_id).await.unwrap();
    assert_eq!((progress.total, progress.done, progress.terminal), (2, 0, 0));

    store
        .complete_task(&tasks[0].task_id, TaskState::Done, &["abc".to_owned()])
        .await
        .unwrap();
    store
        .add_request_results(&request.request_id, &["abc".to_owned()])
        .await
        .unwrap();

    let progress = store.request_task_counts(&request.request_id).await.unwrap();
    assert_eq!((progress.total, progress.done, progress.terminal), (2, 1, 1));

    store
        .complete_task(&tasks[1].task_id, TaskState::Error, &[])
        .await
        .unwrap();
    let progress = store.request_task_counts(&request.request_id).await.unwrap();
    assert_eq!((progress.done, progress.terminal), (1, 2));

    assert!(store.mark_request_ready(&request.request_id).await.unwrap());
    let stored = store
        .get_request(&request.request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RequestStatus::Ready);
    assert_eq!(stored.results, vec!["abc".to_owned()]);
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn result_append_is_a_set_union() {
    let store = Store::InMemory(InMemoryStore::default());
    let (request, tasks) = seed_request(1, 100);
    store.insert_request(&request).await.unwrap();
    store.insert_tasks(&tasks).await.unwrap();

    let results = vec!["abc".to_owned(), "def".to_owned()];
    store
        .add_request_results(&request.request_id, &results)
        .await
        .unwrap();
    store
        .add_request_results(&request.request_id, &results)
        .await
        .unwrap();
    store
        .add_request_results(&request.request_id, &["abc".to_owned()])
        .await
        .unwrap();

    let stored = store
        .get_request(&request.request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.results, results);
}

#[tokio::test]
async fn terminal_task_ignores_redelivered_results() {
    let store = Store::InMemory(InMemoryStore::default());
    let (request, tasks) = seed_request(1, 100);
    store.insert_request(&request).await.unwrap();
    store.insert_tasks(&tasks).await.unwrap();
    let task_id = &tasks[0].task_id;

    store
        .complete_task(task_id, TaskState::Done, &["abc".to_owned()])
        .await
        .unwrap();
    // A redelivery that disagrees must not win over the terminal state.
    store
        .complete_task(task_id, TaskState::Error, &["zzz".to_owned()])
        .await
        .unwrap();

    let counts = store.task_counts().await.unwrap();
    assert_eq!((counts.done, counts.error), (1, 0));
}

#[tokio::test]
async fn ready_is_monotonic() {
    let store = Store::InMemory(InMemoryStore::default());
    let (request, tasks) = seed_request(1, 100);
    store.insert_request(&request).await.unwrap();
    store.insert_tasks(&tasks).await.unwrap();

    store
        .complete_task(&tasks[0].task_id, TaskState::Done, &[])
        .await
        .unwrap();
    assert!(store.mark_request_ready(&request.request_id).await.unwrap());
    assert!(!store.mark_request_ready(&request.request_id).await.unwrap());
    store.mark_request_error(&request.request_id).await.unwrap();

    let stored = store
        .get_request(&request.request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RequestStatus::Ready);
}

#[tokio::test]
async fn retry_queries_see_only_flagged_queued_tasks() {
    let store = Store::InMemory(InMemoryStore::default());
    let (request, tasks) = seed_request(2, 500);
    store.insert_request(&request).await.unwrap();
    store.insert_tasks(&tasks).await.unwrap();

    store.mark_task_queued(&tasks[0].task_id).await.unwrap();
    store.mark_task_queued(&tasks[1].task_id).await.unwrap();

    let pending_retry = store.tasks_needing_retry().await.unwrap();
    assert_eq!(pending_retry.len(), 2);

    store.clear_retry_flag(&tasks[0].task_id).await.unwrap();
    let pending_retry = store.tasks_needing_retry().await.unwrap();
    assert_eq!(pending_retry.len(), 1);
    assert_eq!(pending_retry[0].task_id, tasks[1].task_id);
    // The sweeper never touches status; the task stays QUEUED until a
    // worker result lands.
    assert_eq!(pending_retry[0].status, TaskState::Queued);

    let counts = store.request_counts().await.unwrap();
    assert_eq!((counts.total, counts.in_progress), (1, 1));
}
