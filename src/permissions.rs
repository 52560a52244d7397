//! Pure authorization rules for workflow and task operations.
//!
//! Every mutating operation consults these functions before touching
//! storage. They take the already-loaded workflow/task state, never
//! perform I/O, and on denial return the specific rule that failed so
//! callers can surface a precise reason.

use crate::error::{ApiError, ApiResult, PermissionRule};
use crate::types::{Task, TaskStatus, Workflow, WorkflowMember};

/// Resolve the actor's member record, denying non-members.
pub fn require_member<'a>(workflow: &'a Workflow, actor_id: &str) -> ApiResult<&'a WorkflowMember> {
    workflow.member(actor_id).ok_or_else(|| {
        ApiError::permission_denied(
            PermissionRule::WorkflowMember,
            "You are not a member of this workflow",
        )
    })
}

/// Read access: the creator or any member.
pub fn can_view_workflow(workflow: &Workflow, actor_id: &str) -> ApiResult<()> {
    if workflow.is_creator(actor_id) || workflow.member(actor_id).is_some() {
        return Ok(());
    }
    Err(ApiError::permission_denied(
        PermissionRule::WorkflowMember,
        "You do not have access to this workflow",
    ))
}

/// Task creation: the workflow creator, or a member granted
/// `canCreateTasks`.
pub fn can_create_task(workflow: &Workflow, actor_id: &str) -> ApiResult<()> {
    let member = require_member(workflow, actor_id)?;
    if workflow.is_creator(actor_id) || member.permissions.can_create_tasks {
        return Ok(());
    }
    Err(ApiError::permission_denied(
        PermissionRule::CanCreateTask,
        "You do not have permission to create tasks in this workflow",
    ))
}

/// Assignment: the creator assigns freely; other members need
/// `canAssignTasks`, and when their `assignableMembers` scope is
/// non-empty every target must fall inside it. An empty scope means
/// unrestricted.
pub fn can_assign_to(workflow: &Workflow, actor_id: &str, target_ids: &[String]) -> ApiResult<()> {
    let member = require_member(workflow, actor_id)?;
    if workflow.is_creator(actor_id) {
        return Ok(());
    }
    if !member.permissions.can_assign_tasks {
        return Err(ApiError::permission_denied(
            PermissionRule::CanAssignTo,
            "You do not have permission to assign tasks in this workflow",
        ));
    }
    let scope = &member.permissions.assignable_members;
    if !scope.is_empty() {
        let outside = target_ids.iter().any(|id| !scope.contains(id));
        if outside {
            return Err(ApiError::permission_denied(
                PermissionRule::CanAssignTo,
                "You can only assign tasks to specific members in this workflow",
            ));
        }
    }
    Ok(())
}

/// Editing and deleting a task: the workflow creator or the member who
/// created the task.
pub fn can_edit_or_delete_task(workflow: &Workflow, task: &Task, actor_id: &str) -> ApiResult<()> {
    require_member(workflow, actor_id)?;
    if workflow.is_creator(actor_id) || task.created_by == actor_id {
        return Ok(());
    }
    Err(ApiError::permission_denied(
        PermissionRule::CanEditOrDeleteTask,
        "You do not have permission to modify this task",
    ))
}

/// Status advancement: only assignees may move a task, and the direct
/// jump to Completed is reserved for the workflow creator or the task
/// creator; everyone else routes through Awaiting Confirmation.
pub fn can_advance_status(
    workflow: &Workflow,
    task: &Task,
    actor_id: &str,
    new_status: TaskStatus,
) -> ApiResult<()> {
    require_member(workflow, actor_id)?;
    if !task.is_assignee(actor_id) {
        return Err(ApiError::permission_denied(
            PermissionRule::CanAdvanceStatus,
            "You are not assigned to this task",
        ));
    }
    if new_status == TaskStatus::Completed
        && !workflow.is_creator(actor_id)
        && task.created_by != actor_id
    {
        return Err(ApiError::permission_denied(
            PermissionRule::CanAdvanceStatus,
            "Assigned members cannot mark tasks as completed directly; \
             use Awaiting Confirmation instead",
        ));
    }
    Ok(())
}

/// Confirmation: the workflow creator or the task creator, and only
/// while the task has not been confirmed yet.
pub fn can_confirm_completion(workflow: &Workflow, task: &Task, actor_id: &str) -> ApiResult<()> {
    require_member(workflow, actor_id)?;
    if !workflow.is_creator(actor_id) && task.created_by != actor_id {
        return Err(ApiError::permission_denied(
            PermissionRule::CanConfirmCompletion,
            "You do not have permission to confirm task completion",
        ));
    }
    if task.confirmed_by.is_some() {
        return Err(ApiError::already_confirmed());
    }
    Ok(())
}

/// Workflow edit and deletion: creator only.
pub fn can_modify_workflow(workflow: &Workflow, actor_id: &str) -> ApiResult<()> {
    if workflow.is_creator(actor_id) {
        return Ok(());
    }
    Err(ApiError::permission_denied(
        PermissionRule::WorkflowCreator,
        "Only the workflow creator can modify this workflow",
    ))
}

/// Member management (inviting): creator only.
pub fn can_manage_members(workflow: &Workflow, actor_id: &str) -> ApiResult<()> {
    if workflow.is_creator(actor_id) {
        return Ok(());
    }
    Err(ApiError::permission_denied(
        PermissionRule::CanManageMembers,
        "Only the workflow creator can manage members",
    ))
}

/// Member removal: creator only, and the creator itself is never a
/// valid target.
pub fn can_remove_member(workflow: &Workflow, actor_id: &str, target_id: &str) -> ApiResult<()> {
    if !workflow.is_creator(actor_id) {
        return Err(ApiError::permission_denied(
            PermissionRule::CanRemoveMember,
            "Only the workflow creator can remove members",
        ));
    }
    if workflow.is_creator(target_id) {
        return Err(ApiError::permission_denied(
            PermissionRule::CanRemoveMember,
            "The workflow creator cannot be removed",
        ));
    }
    Ok(())
}

/// Permission grants: creator only, and the creator's own grants are
/// immutable.
pub fn can_update_permissions(
    workflow: &Workflow,
    actor_id: &str,
    target_id: &str,
) -> ApiResult<()> {
    if !workflow.is_creator(actor_id) {
        return Err(ApiError::permission_denied(
            PermissionRule::CanUpdatePermissions,
            "Only the workflow creator can update member permissions",
        ));
    }
    if workflow.is_creator(target_id) {
        return Err(ApiError::permission_denied(
            PermissionRule::CanUpdatePermissions,
            "The workflow creator's permissions cannot be changed",
        ));
    }
    Ok(())
}

/// Completion-message deletion: only the member who wrote it.
pub fn can_delete_completion_message(task: &Task, actor_id: &str) -> ApiResult<()> {
    if task.completed_by.as_deref() == Some(actor_id) {
        return Ok(());
    }
    Err(ApiError::permission_denied(
        PermissionRule::CanDeleteCompletionMessage,
        "You can only delete your own completion message",
    ))
}

/// Feedback deletion: only the completer the feedback was left for.
pub fn can_delete_feedback_message(task: &Task, actor_id: &str) -> ApiResult<()> {
    if task.completed_by.as_deref() == Some(actor_id) {
        return Ok(());
    }
    Err(ApiError::permission_denied(
        PermissionRule::CanDeleteFeedbackMessage,
        "You can only delete feedback on tasks you completed",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::{
        InviteStatus, MemberPermissions, Priority, Role, WorkflowStatus,
    };

    fn member(user_id: &str, permissions: MemberPermissions) -> WorkflowMember {
        WorkflowMember {
            user_id: user_id.to_string(),
            email: format!("{}@example.com", user_id),
            first_name: user_id.to_string(),
            last_name: "Test".to_string(),
            role: Role::Member,
            invite_status: InviteStatus::Accepted,
            permissions,
            credits: 0,
            joined_at: 0,
        }
    }

    fn workflow_with(members: Vec<WorkflowMember>) -> Workflow {
        Workflow {
            id: "w1".to_string(),
            name: "Test".to_string(),
            description: "d".to_string(),
            priority: Priority::Medium,
            status: WorkflowStatus::Active,
            created_by: "admin".to_string(),
            members,
            estimated_members: 3,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn workflow() -> Workflow {
        workflow_with(vec![
            member("admin", MemberPermissions::unrestricted()),
            member("bob", MemberPermissions::default()),
            member(
                "carol",
                MemberPermissions {
                    can_create_tasks: true,
                    can_assign_tasks: true,
                    assignable_members: vec!["bob".to_string()],
                },
            ),
        ])
    }

    fn task(created_by: &str, assignees: &[&str]) -> Task {
        Task {
            id: "t1".to_string(),
            workflow_id: "w1".to_string(),
            title: "Task".to_string(),
            description: "d".to_string(),
            priority: Priority::Medium,
            due_date: None,
            assigned_members: assignees.iter().map(|s| s.to_string()).collect(),
            status: TaskStatus::Pending,
            created_by: created_by.to_string(),
            completion_message: None,
            completed_by: None,
            completed_at: None,
            confirmed_by: None,
            confirmed_at: None,
            credits_awarded: false,
            feedback_for_completer: None,
            feedback_from: None,
            feedback_at: None,
            is_deleted: false,
            deleted_by: None,
            deleted_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn denied_rule<T: std::fmt::Debug>(result: ApiResult<T>) -> PermissionRule {
        let err = result.unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
        err.rule.expect("denial should carry a rule")
    }

    #[test]
    fn creator_can_always_create_tasks() {
        let wf = workflow();
        assert!(can_create_task(&wf, "admin").is_ok());
    }

    #[test]
    fn member_without_grant_cannot_create() {
        let wf = workflow();
        assert_eq!(
            denied_rule(can_create_task(&wf, "bob")),
            PermissionRule::CanCreateTask
        );
    }

    #[test]
    fn non_member_is_denied_as_non_member() {
        let wf = workflow();
        assert_eq!(
            denied_rule(can_create_task(&wf, "mallory")),
            PermissionRule::WorkflowMember
        );
    }

    #[test]
    fn assignment_without_grant_is_denied() {
        let wf = workflow();
        assert_eq!(
            denied_rule(can_assign_to(&wf, "bob", &["carol".to_string()])),
            PermissionRule::CanAssignTo
        );
    }

    #[test]
    fn scoped_assignment_rejects_targets_outside_scope() {
        let wf = workflow();
        // carol may only assign to bob
        assert!(can_assign_to(&wf, "carol", &["bob".to_string()]).is_ok());
        assert_eq!(
            denied_rule(can_assign_to(
                &wf,
                "carol",
                &["bob".to_string(), "admin".to_string()]
            )),
            PermissionRule::CanAssignTo
        );
    }

    #[test]
    fn empty_scope_means_unrestricted() {
        let mut wf = workflow();
        wf.members[2].permissions.assignable_members.clear();
        assert!(can_assign_to(&wf, "carol", &["admin".to_string(), "bob".to_string()]).is_ok());
    }

    #[test]
    fn creator_bypasses_assignment_scope() {
        let wf = workflow();
        assert!(can_assign_to(&wf, "admin", &["bob".to_string(), "carol".to_string()]).is_ok());
    }

    #[test]
    fn only_creator_or_task_creator_edits() {
        let wf = workflow();
        let t = task("carol", &["bob"]);
        assert!(can_edit_or_delete_task(&wf, &t, "admin").is_ok());
        assert!(can_edit_or_delete_task(&wf, &t, "carol").is_ok());
        assert_eq!(
            denied_rule(can_edit_or_delete_task(&wf, &t, "bob")),
            PermissionRule::CanEditOrDeleteTask
        );
    }

    #[test]
    fn non_assignee_cannot_advance_status() {
        let wf = workflow();
        let t = task("admin", &["bob"]);
        assert_eq!(
            denied_rule(can_advance_status(&wf, &t, "carol", TaskStatus::InProgress)),
            PermissionRule::CanAdvanceStatus
        );
    }

    #[test]
    fn assignee_cannot_jump_to_completed() {
        let wf = workflow();
        let t = task("admin", &["bob"]);
        assert!(can_advance_status(&wf, &t, "bob", TaskStatus::AwaitingConfirmation).is_ok());
        assert_eq!(
            denied_rule(can_advance_status(&wf, &t, "bob", TaskStatus::Completed)),
            PermissionRule::CanAdvanceStatus
        );
    }

    #[test]
    fn assigned_creator_may_complete_directly() {
        let wf = workflow();
        let t = task("carol", &["carol", "bob"]);
        assert!(can_advance_status(&wf, &t, "carol", TaskStatus::Completed).is_ok());
    }

    #[test]
    fn confirmation_restricted_to_creators() {
        let wf = workflow();
        let t = task("carol", &["bob"]);
        assert!(can_confirm_completion(&wf, &t, "admin").is_ok());
        assert!(can_confirm_completion(&wf, &t, "carol").is_ok());
        assert_eq!(
            denied_rule(can_confirm_completion(&wf, &t, "bob")),
            PermissionRule::CanConfirmCompletion
        );
    }

    #[test]
    fn second_confirmation_reports_already_confirmed() {
        let wf = workflow();
        let mut t = task("admin", &["bob"]);
        t.confirmed_by = Some("admin".to_string());
        let err = can_confirm_completion(&wf, &t, "admin").unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyConfirmed);
    }

    #[test]
    fn creator_is_never_a_removal_target() {
        let wf = workflow();
        assert_eq!(
            denied_rule(can_remove_member(&wf, "admin", "admin")),
            PermissionRule::CanRemoveMember
        );
        assert!(can_remove_member(&wf, "admin", "bob").is_ok());
    }

    #[test]
    fn only_creator_removes_members() {
        let wf = workflow();
        assert_eq!(
            denied_rule(can_remove_member(&wf, "bob", "carol")),
            PermissionRule::CanRemoveMember
        );
    }

    #[test]
    fn creator_permissions_are_immutable() {
        let wf = workflow();
        assert_eq!(
            denied_rule(can_update_permissions(&wf, "admin", "admin")),
            PermissionRule::CanUpdatePermissions
        );
        assert!(can_update_permissions(&wf, "admin", "bob").is_ok());
    }

    #[test]
    fn completion_message_owned_by_completer() {
        let mut t = task("admin", &["bob"]);
        t.completed_by = Some("bob".to_string());
        assert!(can_delete_completion_message(&t, "bob").is_ok());
        assert_eq!(
            denied_rule(can_delete_completion_message(&t, "admin")),
            PermissionRule::CanDeleteCompletionMessage
        );
    }
}
