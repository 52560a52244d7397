//! Core domain types for crewflow.

use serde::{Deserialize, Serialize};

/// Priority shared by workflows and tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Low" => Some(Priority::Low),
            "Medium" => Some(Priority::Medium),
            "High" => Some(Priority::High),
            "Critical" => Some(Priority::Critical),
            _ => None,
        }
    }
}

/// Workflow-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Active => "Active",
            WorkflowStatus::Paused => "Paused",
            WorkflowStatus::Completed => "Completed",
            WorkflowStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(WorkflowStatus::Active),
            "Paused" => Some(WorkflowStatus::Paused),
            "Completed" => Some(WorkflowStatus::Completed),
            "Cancelled" => Some(WorkflowStatus::Cancelled),
            _ => None,
        }
    }
}

/// Member role within a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Member,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Member => "Member",
            Role::Viewer => "Viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Admin" => Some(Role::Admin),
            "Member" => Some(Role::Member),
            "Viewer" => Some(Role::Viewer),
            _ => None,
        }
    }
}

/// Invite resolution state. A membership only exists once an invite has
/// been accepted; Pending and Declined records never become members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Pending => "Pending",
            InviteStatus::Accepted => "Accepted",
            InviteStatus::Declined => "Declined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(InviteStatus::Pending),
            "Accepted" => Some(InviteStatus::Accepted),
            "Declined" => Some(InviteStatus::Declined),
            _ => None,
        }
    }
}

/// Task lifecycle status.
///
/// The legal transitions form a forward-only chain with cancellation
/// reachable from any non-terminal state:
///
/// ```text
/// Pending -> In Progress -> Awaiting Confirmation -> Completed
///        \_______________\_____________/
///                   Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Awaiting Confirmation")]
    AwaitingConfirmation,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::AwaitingConfirmation => "Awaiting Confirmation",
            TaskStatus::Completed => "Completed",
            TaskStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(TaskStatus::Pending),
            "In Progress" => Some(TaskStatus::InProgress),
            "Awaiting Confirmation" => Some(TaskStatus::AwaitingConfirmation),
            "Completed" => Some(TaskStatus::Completed),
            "Cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    /// Position along the forward chain; Cancelled sits outside it.
    fn chain_index(&self) -> Option<u8> {
        match self {
            TaskStatus::Pending => Some(0),
            TaskStatus::InProgress => Some(1),
            TaskStatus::AwaitingConfirmation => Some(2),
            TaskStatus::Completed => Some(3),
            TaskStatus::Cancelled => None,
        }
    }

    /// Whether the state machine permits moving from `self` to `to`.
    ///
    /// Forward moves along the chain are allowed, including skips;
    /// Cancelled is reachable from any non-terminal state. Backward
    /// moves and same-status writes are not transitions.
    pub fn can_transition_to(&self, to: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if to == TaskStatus::Cancelled {
            return true;
        }
        match (self.chain_index(), to.chain_index()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }
}

/// Fine-grained task grants for a workflow member.
///
/// An empty `assignable_members` list means the member may assign to
/// anyone in the workflow once `can_assign_tasks` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPermissions {
    pub can_create_tasks: bool,
    pub can_assign_tasks: bool,
    pub assignable_members: Vec<String>,
}

impl MemberPermissions {
    /// Grants given to the workflow creator: everything, no scoping.
    pub fn unrestricted() -> Self {
        Self {
            can_create_tasks: true,
            can_assign_tasks: true,
            assignable_members: Vec::new(),
        }
    }
}

impl Default for MemberPermissions {
    fn default() -> Self {
        Self {
            can_create_tasks: false,
            can_assign_tasks: false,
            assignable_members: Vec::new(),
        }
    }
}

/// A member of a workflow, carrying a denormalized user snapshot taken at
/// join time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMember {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub invite_status: InviteStatus,
    pub permissions: MemberPermissions,
    pub credits: i64,
    pub joined_at: i64,
}

/// A workflow with its member list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub priority: Priority,
    pub status: WorkflowStatus,
    pub created_by: String,
    pub members: Vec<WorkflowMember>,
    /// Capacity hint from creation; not enforced anywhere.
    pub estimated_members: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Workflow {
    /// Look up a member record by user id.
    pub fn member(&self, user_id: &str) -> Option<&WorkflowMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn is_creator(&self, user_id: &str) -> bool {
        self.created_by == user_id
    }
}

/// An invitation to join a workflow. Inviter details are snapshotted so
/// the invite renders without a directory lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInvite {
    pub id: String,
    pub workflow_id: String,
    pub workflow_name: String,
    pub invited_by: String,
    pub invited_by_email: String,
    pub invited_by_first_name: String,
    pub invited_by_last_name: String,
    pub invited_user: String,
    pub invited_user_email: String,
    pub status: InviteStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A task within a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub workflow_id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<i64>,
    pub assigned_members: Vec<String>,
    pub status: TaskStatus,
    pub created_by: String,

    // Completion artifacts, stamped on entering Awaiting Confirmation
    // (or Completed via the privileged path).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,

    // Confirmation artifacts, written at most once per task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<i64>,
    pub credits_awarded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_for_completer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_at: Option<i64>,

    // Soft delete: hidden from reads, retained in storage.
    pub is_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub fn is_assignee(&self, user_id: &str) -> bool {
        self.assigned_members.iter().any(|m| m == user_id)
    }
}

/// One entry of a task's status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdate {
    pub id: i64,
    pub task_id: String,
    pub status: TaskStatus,
    pub message: String,
    pub updated_by: String,
    pub updated_at: i64,
}

/// Directory entry for a registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: i64,
}

/// Aggregate task counts for a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStats {
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub pending_tasks: i64,
    pub overdue_tasks: i64,
}
