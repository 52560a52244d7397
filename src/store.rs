//! Persistence and directory seams the core services depend on.
//!
//! Services never touch the database directly; they speak to these
//! traits. "Not found" is a distinct outcome (`Ok(None)` / `Ok(false)`)
//! from a storage fault (`Err`), so business logic can map the former to
//! typed errors and let the latter propagate as fatal.

use crate::types::{
    InviteStatus, MemberPermissions, Task, TaskStatus, TaskStatusUpdate, UserProfile, Workflow,
    WorkflowInvite, WorkflowMember,
};
use anyhow::Result;

/// Persistence operations for workflows, members, invites and tasks.
pub trait WorkflowStore: Send + Sync {
    // --- workflows ---

    /// Insert a new workflow together with its seed members.
    fn create_workflow(&self, workflow: &Workflow) -> Result<()>;

    fn find_workflow(&self, id: &str) -> Result<Option<Workflow>>;

    /// Update a workflow's own fields (name, description, priority,
    /// status, estimated members, updated_at). Members are managed
    /// through the member operations below.
    fn save_workflow(&self, workflow: &Workflow) -> Result<()>;

    /// Hard-delete a workflow and its members. Returns false when the
    /// workflow did not exist.
    fn delete_workflow(&self, id: &str) -> Result<bool>;

    /// Workflows the user created or is a member of.
    fn list_workflows_for_user(&self, user_id: &str) -> Result<Vec<Workflow>>;

    // --- members ---

    fn find_member_in_workflow(
        &self,
        workflow_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkflowMember>>;

    fn add_member(&self, workflow_id: &str, member: &WorkflowMember) -> Result<()>;

    /// Returns false when the user was not a member.
    fn remove_member(&self, workflow_id: &str, user_id: &str) -> Result<bool>;

    /// Returns false when the user was not a member.
    fn update_member_permissions(
        &self,
        workflow_id: &str,
        user_id: &str,
        permissions: &MemberPermissions,
    ) -> Result<bool>;

    /// Add one credit to a member's counter. Returns false when the
    /// user was not a member.
    fn increment_member_credits(&self, workflow_id: &str, user_id: &str) -> Result<bool>;

    // --- invites ---

    fn create_invite(&self, invite: &WorkflowInvite) -> Result<()>;

    fn find_invite(&self, id: &str) -> Result<Option<WorkflowInvite>>;

    fn list_pending_invites_for_user(&self, user_id: &str) -> Result<Vec<WorkflowInvite>>;

    /// Whether the (workflow, user) pair already has a Pending invite.
    fn has_pending_invite(&self, workflow_id: &str, user_id: &str) -> Result<bool>;

    /// Move a Pending invite addressed to `invited_user` to the given
    /// status. Returns false when no such pending invite exists, which
    /// covers both unknown ids and already-resolved invites.
    fn resolve_invite(&self, id: &str, invited_user: &str, status: InviteStatus) -> Result<bool>;

    /// Mark every Pending invite for the user in the workflow as
    /// Declined. Returns the number of invites voided.
    fn void_pending_invites(&self, workflow_id: &str, user_id: &str) -> Result<u64>;

    /// Remove all invites belonging to a workflow (used on workflow
    /// deletion). Returns the number removed.
    fn delete_invites_for_workflow(&self, workflow_id: &str) -> Result<u64>;

    // --- tasks ---

    fn create_task(&self, task: &Task) -> Result<()>;

    /// Direct id lookup returns soft-deleted tasks too.
    fn find_task(&self, id: &str) -> Result<Option<Task>>;

    fn save_task(&self, task: &Task) -> Result<()>;

    /// Tasks of a workflow excluding soft-deleted ones.
    fn list_active_tasks(&self, workflow_id: &str) -> Result<Vec<Task>>;

    /// Completed tasks of a workflow excluding soft-deleted ones.
    fn list_completed_tasks(&self, workflow_id: &str) -> Result<Vec<Task>>;

    fn append_status_update(
        &self,
        task_id: &str,
        status: TaskStatus,
        message: &str,
        updated_by: &str,
        updated_at: i64,
    ) -> Result<()>;

    fn list_status_updates(&self, task_id: &str) -> Result<Vec<TaskStatusUpdate>>;

    /// Atomically confirm a task's completion.
    ///
    /// The write is conditional on `confirmed_by` being unset, so of two
    /// racing confirmations exactly one returns true; the loser sees
    /// false and must report the task as already confirmed. The winner's
    /// write stamps status=Completed, the confirmation fields, and the
    /// optional feedback in one statement.
    fn confirm_task(
        &self,
        task_id: &str,
        confirmed_by: &str,
        confirmed_at: i64,
        feedback: Option<&str>,
        award_credits: bool,
    ) -> Result<bool>;
}

/// Read-only lookup of registered users, used for invite targeting and
/// member snapshots.
pub trait UserDirectory: Send + Sync {
    fn find_user(&self, id: &str) -> Result<Option<UserProfile>>;

    fn find_user_by_email(&self, email: &str) -> Result<Option<UserProfile>>;

    /// Case-insensitive substring match on name and email, excluding the
    /// calling user, capped at 10 results.
    fn search_users(&self, query: &str, exclude_user: &str) -> Result<Vec<UserProfile>>;
}
