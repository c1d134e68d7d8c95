use std::time::Instant;

use hashcrack_lib::{
    generate::{self, GenerateError},
    hasher,
    message::{ResultMessage, ResultStatus, TaskMessage},
};
use tracing::{debug, error, info};

use crate::metrics;

const PROGRESS_REPORT_INTERVAL: u64 = 10_000;

/// Enumerates a task's index range and reports every preimage in it.
/// The whole range is always walked; matching never terminates the scan
/// early, so all preimages in the slice are reported.
#[derive(Debug, Clone)]
pub struct TaskProcessor {
    worker_id: String,
}

impl TaskProcessor {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
        }
    }

    /// CPU-bound; callers run it on a blocking thread.
    ///
    /// Any internal failure is folded into an ERROR result so the worker
    /// itself never dies on a bad task.
    pub fn process(&self, task: &TaskMessage) -> ResultMessage {
        let started = Instant::now();
        metrics::inc_tasks_in_progress();
        info!(
            worker_id = %self.worker_id,
            task_id = %task.task_id,
            start = task.start_index,
            count = task.count,
            "processing task"
        );

        let outcome = self.search(task, started);
        metrics::dec_tasks_in_progress();

        match outcome {
            Ok(results) => {
                metrics::inc_tasks_processed("success");
                info!(
                    task_id = %task.task_id,
                    matches = results.len(),
                    elapsed = ?started.elapsed(),
                    "task completed"
                );
                ResultMessage {
                    task_id: task.task_id.clone(),
                    request_id: task.request_id.clone(),
                    status: ResultStatus::Done,
                    results,
                }
            }
            Err(err) => {
                error!(task_id = %task.task_id, "error processing task: {err}");
                metrics::inc_tasks_processed("error");
                ResultMessage {
                    task_id: task.task_id.clone(),
                    request_id: task.request_id.clone(),
                    status: ResultStatus::Error,
                    results: Vec::new(),
                }
            }
        }
    }

    fn search(&self, task: &TaskMessage, started: Instant) -> Result<Vec<String>, GenerateError> {
        let target = task.target_hash.to_ascii_lowercase();
        let mut results = Vec::new();
        for i in 0..task.count {
            let candidate = generate::candidate(task.start_index + i, task.max_length)?;
            if hasher::matches(&candidate, &target) {
                info!(task_id = %task.task_id, "found match: '{candidate}'");
                results.push(candidate);
            }

            let processed = i + 1;
            if processed % PROGRESS_REPORT_INTERVAL == 0 {
                debug!(
                    task_id = %task.task_id,
                    "processed {processed}/{} combinations",
                    task.count
                );
                let elapsed = started.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    metrics::observe_hash_rate(processed as f64 / elapsed);
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use hashcrack_lib::keyspace::total_combinations;

    use super::*;

    fn task(start_index: u64, count: u64, target_hash: &str, max_length: u8) -> TaskMessage {
        TaskMessage {
            task_id: "t-1".to_owned(),
            request_id: "r-1".to_owned(),
            start_index,
            count,
            target_hash: target_hash.to_owned(),
            max_length,
        }
    }

    #[test]
    fn finds_the_preimage_in_its_range() {
        let processor = TaskProcessor::new("worker-test");
        let result = processor.process(&task(0, 36, &hasher::md5_hex("a"), 1));

        assert_eq!(result.status, ResultStatus::Done);
        assert_eq!(result.results, vec!["a".to_owned()]);
        assert_eq!(result.task_id, "t-1");
        assert_eq!(result.request_id, "r-1");
    }

    #[test]
    fn scans_across_length_bands() {
        let processor = TaskProcessor::new("worker-test");
        let total = total_combinations(2);
        let result = processor.process(&task(0, total, &hasher::md5_hex("z9"), 2));

        assert_eq!(result.status, ResultStatus::Done);
        assert_eq!(result.results, vec!["z9".to_owned()]);
    }

    #[test]
    fn mixed_case_target_still_matches() {
        let processor = TaskProcessor::new("worker-test");
        let target = hasher::md5_hex("ab").to_uppercase();
        let result = processor.process(&task(36, 100, &target, 2));

        assert_eq!(result.status, ResultStatus::Done);
        assert_eq!(result.results, vec!["ab".to_owned()]);
    }

    #[test]
    fn clean_scan_without_matches_is_done_and_empty() {
        let processor = TaskProcessor::new("worker-test");
        let result = processor.process(&task(0, 36, &"0".repeat(32), 1));

        assert_eq!(result.status, ResultStatus::Done);
        assert!(result.results.is_empty());
    }

    #[test]
    fn range_outside_the_keyspace_reports_error() {
        let processor = TaskProcessor::new("worker-test");
        let result = processor.process(&task(0, 37, &hasher::md5_hex("a"), 1));

        assert_eq!(result.status, ResultStatus::Error);
        assert!(result.results.is_empty());
    }
}
