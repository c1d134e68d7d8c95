use serde::{Deserialize, Serialize};

/// Payload published to `task.queue`, one per partition.
///
/// Carries the target digest and length bound so a worker needs no state
/// store lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMessage {
    pub task_id: String,
    pub request_id: String,
    pub start_index: u64,
    pub count: u64,
    pub target_hash: String,
    pub max_length: u8,
}

/// Terminal outcome a worker reports for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultStatus {
    Done,
    Error,
}

/// Payload published to `result.queue` once a task has been processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMessage {
    pub task_id: String,
    pub request_id: String,
    pub status: ResultStatus,
    pub results: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_message_wire_form_is_camel_case() {
        let message = TaskMessage {
            task_id: "t-1".to_owned(),
            request_id: "r-1".to_owned(),
            start_index: 100_000,
            count: 50_000,
            target_hash: "900150983cd24fb0d6963f7d28e17f72".to_owned(),
            max_length: 4,
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["taskId"], "t-1");
        assert_eq!(value["requestId"], "r-1");
        assert_eq!(value["startIndex"], 100_000);
        assert_eq!(value["maxLength"], 4);
    }

    #[test]
    fn result_status_round_trips_as_screaming_case() {
        assert_eq!(serde_json::to_string(&ResultStatus::Done).unwrap(), "\"DONE\"");
        let parsed: ResultMessage = serde_json::from_str(
            r#"{"taskId":"t","requestId":"r","status":"ERROR","results":[]}"#,
        )
        .unwrap();
        assert_eq!(parsed.status, ResultStatus::Error);
        assert!(parsed.results.is_empty());
    }
}
