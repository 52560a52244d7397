//! Lifecycle and presence events broadcast to workflow subscribers.
//!
//! Events serialize as a JSON object with a kebab-case `type` field and
//! the payload inlined, which is exactly the shape clients receive over
//! the SSE stream.

use crate::types::Task;
use serde::Serialize;

/// A single event published to a workflow's subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkflowEvent {
    TaskCreated {
        task: Task,
    },
    TaskUpdated {
        task: Task,
    },
    #[serde(rename_all = "camelCase")]
    TaskDeleted {
        task_id: String,
    },
    TaskStatusChanged {
        task: Task,
    },
    TaskCompleted {
        task: Task,
    },
    /// Acknowledgment sent to a subscriber right after it registers.
    #[serde(rename_all = "camelCase")]
    Connected {
        workflow_id: String,
    },
    /// Presence update listing every user currently subscribed.
    #[serde(rename_all = "camelCase")]
    ConnectedUsers {
        user_ids: Vec<String>,
    },
    /// Periodic liveness pulse keeping the transport open.
    Heartbeat {
        timestamp: i64,
    },
}

impl WorkflowEvent {
    /// Event name as it appears in the serialized `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowEvent::TaskCreated { .. } => "task-created",
            WorkflowEvent::TaskUpdated { .. } => "task-updated",
            WorkflowEvent::TaskDeleted { .. } => "task-deleted",
            WorkflowEvent::TaskStatusChanged { .. } => "task-status-changed",
            WorkflowEvent::TaskCompleted { .. } => "task-completed",
            WorkflowEvent::Connected { .. } => "connected",
            WorkflowEvent::ConnectedUsers { .. } => "connected-users",
            WorkflowEvent::Heartbeat { .. } => "heartbeat",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kebab_case_type_tag() {
        let event = WorkflowEvent::TaskDeleted {
            task_id: "t1".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "task-deleted");
        assert_eq!(json["taskId"], "t1");
    }

    #[test]
    fn presence_event_lists_user_ids() {
        let event = WorkflowEvent::ConnectedUsers {
            user_ids: vec!["u1".to_string(), "u2".to_string()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "connected-users");
        assert_eq!(json["userIds"][1], "u2");
    }

    #[test]
    fn kind_matches_serialized_tag() {
        let event = WorkflowEvent::Heartbeat { timestamp: 123 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind());
    }
}
