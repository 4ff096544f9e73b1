//! Events - 外部に公開するジョブのイベント
//!
//! 内部ジョブ以外の状態変化はすべて `JobEvent::StatusChange` として
//! registry の broadcast チャネルに流れる。

use serde::{Deserialize, Serialize};

use super::ids::JobId;
use super::status::JobStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    StatusChange { id: JobId, status: JobStatus },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_change_serializes_like_a_protocol_event() {
        let ev = JobEvent::StatusChange {
            id: JobId::parse("job0").unwrap(),
            status: JobStatus::Concluded,
        };
        assert_eq!(
            serde_json::to_value(&ev).unwrap(),
            serde_json::json!({"event": "status_change", "id": "job0", "status": "concluded"})
        );
    }
}
