//! Integration tests for the task lifecycle.
//!
//! These run the real services against an in-memory SQLite database,
//! with the broadcast hub attached so event emission is exercised too.

use crewflow::db::{Database, now_ms};
use crewflow::error::{ErrorCode, PermissionRule};
use crewflow::hub::BroadcastHub;
use crewflow::lifecycle::{TaskInput, TaskLifecycle};
use crewflow::membership::{CreateWorkflowInput, WorkflowMembership};
use crewflow::types::{MemberPermissions, Priority, TaskStatus, UserProfile};
use std::sync::Arc;

struct TestContext {
    db: Arc<Database>,
    hub: Arc<BroadcastHub>,
    lifecycle: TaskLifecycle,
    membership: WorkflowMembership,
}

fn setup() -> TestContext {
    let db = Arc::new(Database::open_in_memory().expect("in-memory database"));
    let hub = Arc::new(BroadcastHub::new());
    let lifecycle = TaskLifecycle::new(db.clone(), Arc::clone(&hub));
    let membership = WorkflowMembership::new(db.clone(), db.clone());
    TestContext {
        db,
        hub,
        lifecycle,
        membership,
    }
}

fn seed_user(db: &Database, id: &str) {
    db.create_user(&UserProfile {
        id: id.to_string(),
        email: format!("{}@example.com", id),
        first_name: id.to_string(),
        last_name: "Test".to_string(),
        created_at: now_ms(),
    })
    .expect("seed user");
}

/// Admin-created workflow with bob and carol as accepted members
/// holding default (no-grant) permissions.
fn team_workflow(ctx: &TestContext) -> String {
    for user in ["admin", "bob", "carol"] {
        seed_user(&ctx.db, user);
    }
    let workflow = ctx
        .membership
        .create_workflow(
            "admin",
            CreateWorkflowInput {
                name: "Launch".to_string(),
                description: "Ship the launch checklist".to_string(),
                priority: Priority::High,
                estimated_members: 3,
                member_emails: vec![
                    "bob@example.com".to_string(),
                    "carol@example.com".to_string(),
                ],
            },
        )
        .expect("create workflow");
    for user in ["bob", "carol"] {
        let invites = ctx.membership.list_pending_invites(user).unwrap();
        ctx.membership
            .respond_to_invite(&invites[0].id, user, true)
            .expect("accept invite");
    }
    workflow.id
}

fn grant(ctx: &TestContext, workflow_id: &str, member: &str, permissions: MemberPermissions) {
    ctx.membership
        .update_member_permissions(workflow_id, "admin", member, permissions)
        .expect("update permissions");
}

fn task_input(assignees: &[&str]) -> TaskInput {
    TaskInput {
        title: "Write release notes".to_string(),
        description: "Summarize the changes".to_string(),
        priority: Priority::Medium,
        due_date: None,
        assigned_members: assignees.iter().map(|s| s.to_string()).collect(),
    }
}

mod create_tests {
    use super::*;

    #[test]
    fn creator_creates_task_in_pending_status() {
        let ctx = setup();
        let wf = team_workflow(&ctx);

        let task = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["bob"]))
            .unwrap();

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.created_by, "admin");
        assert_eq!(task.assigned_members, vec!["bob"]);
        assert!(!task.is_deleted);
    }

    #[test]
    fn member_without_grant_cannot_create() {
        let ctx = setup();
        let wf = team_workflow(&ctx);

        let err = ctx
            .lifecycle
            .create_task(&wf, "bob", task_input(&["carol"]))
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::PermissionDenied);
        assert_eq!(err.rule, Some(PermissionRule::CanCreateTask));
    }

    #[test]
    fn create_with_grant_but_no_assign_permission_is_denied() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        grant(
            &ctx,
            &wf,
            "bob",
            MemberPermissions {
                can_create_tasks: true,
                can_assign_tasks: false,
                assignable_members: vec![],
            },
        );

        let err = ctx
            .lifecycle
            .create_task(&wf, "bob", task_input(&["carol"]))
            .unwrap_err();

        assert_eq!(err.rule, Some(PermissionRule::CanAssignTo));
    }

    #[test]
    fn scoped_assignment_rejects_out_of_scope_targets() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        grant(
            &ctx,
            &wf,
            "carol",
            MemberPermissions {
                can_create_tasks: true,
                can_assign_tasks: true,
                assignable_members: vec!["bob".to_string()],
            },
        );

        assert!(ctx
            .lifecycle
            .create_task(&wf, "carol", task_input(&["bob"]))
            .is_ok());

        let err = ctx
            .lifecycle
            .create_task(&wf, "carol", task_input(&["bob", "admin"]))
            .unwrap_err();
        assert_eq!(err.rule, Some(PermissionRule::CanAssignTo));
    }

    #[test]
    fn empty_scope_permits_any_current_member() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        grant(
            &ctx,
            &wf,
            "carol",
            MemberPermissions {
                can_create_tasks: true,
                can_assign_tasks: true,
                assignable_members: vec![],
            },
        );

        assert!(ctx
            .lifecycle
            .create_task(&wf, "carol", task_input(&["admin", "bob"]))
            .is_ok());
    }

    #[test]
    fn validation_rejects_empty_fields() {
        let ctx = setup();
        let wf = team_workflow(&ctx);

        let mut input = task_input(&["bob"]);
        input.title = "  ".to_string();
        let err = ctx.lifecycle.create_task(&wf, "admin", input).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.field.as_deref(), Some("title"));

        let mut input = task_input(&["bob"]);
        input.assigned_members.clear();
        let err = ctx.lifecycle.create_task(&wf, "admin", input).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("assignedMembers"));
    }

    #[test]
    fn assignees_must_be_current_members() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        seed_user(&ctx.db, "stranger");

        let err = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["stranger"]))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.field.as_deref(), Some("assignedMembers"));
    }
}

mod status_tests {
    use super::*;

    #[test]
    fn assignee_advances_along_the_chain() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["bob"]))
            .unwrap();

        let task = ctx
            .lifecycle
            .update_status(&wf, &task.id, "bob", TaskStatus::InProgress, "starting")
            .unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.completed_by.is_none());

        let task = ctx
            .lifecycle
            .update_status(&wf, &task.id, "bob", TaskStatus::AwaitingConfirmation, "done")
            .unwrap();
        assert_eq!(task.status, TaskStatus::AwaitingConfirmation);
        assert_eq!(task.completed_by.as_deref(), Some("bob"));
        assert_eq!(task.completion_message.as_deref(), Some("done"));
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn status_history_records_every_transition() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["bob"]))
            .unwrap();

        ctx.lifecycle
            .update_status(&wf, &task.id, "bob", TaskStatus::InProgress, "starting")
            .unwrap();
        ctx.lifecycle
            .update_status(&wf, &task.id, "bob", TaskStatus::AwaitingConfirmation, "done")
            .unwrap();

        let updates = ctx
            .lifecycle
            .list_status_updates(&wf, &task.id, "bob")
            .unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].status, TaskStatus::InProgress);
        assert_eq!(updates[0].message, "starting");
        assert_eq!(updates[1].status, TaskStatus::AwaitingConfirmation);
        assert_eq!(updates[1].updated_by, "bob");
    }

    #[test]
    fn plain_assignee_cannot_complete_directly() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["bob"]))
            .unwrap();

        let err = ctx
            .lifecycle
            .update_status(&wf, &task.id, "bob", TaskStatus::Completed, "done")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
        assert_eq!(err.rule, Some(PermissionRule::CanAdvanceStatus));
    }

    #[test]
    fn assigned_task_creator_may_complete_directly() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["admin", "bob"]))
            .unwrap();

        let task = ctx
            .lifecycle
            .update_status(&wf, &task.id, "admin", TaskStatus::Completed, "done myself")
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.completed_by.as_deref(), Some("admin"));
        // Privileged path: completed without a confirmation record.
        assert!(task.confirmed_by.is_none());
    }

    #[test]
    fn non_assignee_cannot_advance_even_as_admin() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["bob"]))
            .unwrap();

        let err = ctx
            .lifecycle
            .update_status(&wf, &task.id, "admin", TaskStatus::InProgress, "nudge")
            .unwrap_err();
        assert_eq!(err.rule, Some(PermissionRule::CanAdvanceStatus));
    }

    #[test]
    fn backward_moves_are_invalid_transitions() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["bob"]))
            .unwrap();
        ctx.lifecycle
            .update_status(&wf, &task.id, "bob", TaskStatus::InProgress, "starting")
            .unwrap();

        let err = ctx
            .lifecycle
            .update_status(&wf, &task.id, "bob", TaskStatus::Pending, "back")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransition);
    }

    #[test]
    fn cancel_is_reachable_from_awaiting_confirmation() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["bob"]))
            .unwrap();
        ctx.lifecycle
            .update_status(&wf, &task.id, "bob", TaskStatus::AwaitingConfirmation, "done")
            .unwrap();

        let task = ctx
            .lifecycle
            .update_status(&wf, &task.id, "bob", TaskStatus::Cancelled, "scope cut")
            .unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        // Completion artifacts are retained on cancellation.
        assert_eq!(task.completed_by.as_deref(), Some("bob"));
    }

    #[test]
    fn terminal_tasks_reject_further_updates() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["bob"]))
            .unwrap();
        ctx.lifecycle
            .update_status(&wf, &task.id, "bob", TaskStatus::Cancelled, "dropped")
            .unwrap();

        let err = ctx
            .lifecycle
            .update_status(&wf, &task.id, "bob", TaskStatus::InProgress, "revive")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransition);
    }
}

mod confirm_tests {
    use super::*;

    fn awaiting_task(ctx: &TestContext, wf: &str) -> String {
        let task = ctx
            .lifecycle
            .create_task(wf, "admin", task_input(&["bob"]))
            .unwrap();
        ctx.lifecycle
            .update_status(wf, &task.id, "bob", TaskStatus::AwaitingConfirmation, "done")
            .unwrap();
        task.id
    }

    fn credits_of(ctx: &TestContext, wf: &str, user: &str) -> i64 {
        ctx.db
            .find_member_in_workflow(wf, user)
            .unwrap()
            .unwrap()
            .credits
    }

    #[test]
    fn admin_confirms_and_awards_exactly_one_credit() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task_id = awaiting_task(&ctx, &wf);
        assert_eq!(credits_of(&ctx, &wf, "bob"), 0);

        let task = ctx
            .lifecycle
            .confirm_completion(&wf, &task_id, "admin", true, None)
            .unwrap();

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.confirmed_by.as_deref(), Some("admin"));
        assert!(task.credits_awarded);
        assert_eq!(credits_of(&ctx, &wf, "bob"), 1);
    }

    #[test]
    fn second_confirmation_is_rejected_and_credits_stay_at_one() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task_id = awaiting_task(&ctx, &wf);

        ctx.lifecycle
            .confirm_completion(&wf, &task_id, "admin", true, None)
            .unwrap();
        let err = ctx
            .lifecycle
            .confirm_completion(&wf, &task_id, "admin", true, None)
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::AlreadyConfirmed);
        assert_eq!(credits_of(&ctx, &wf, "bob"), 1);
    }

    #[test]
    fn confirmation_without_award_leaves_credits_untouched() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task_id = awaiting_task(&ctx, &wf);

        ctx.lifecycle
            .confirm_completion(&wf, &task_id, "admin", false, None)
            .unwrap();
        assert_eq!(credits_of(&ctx, &wf, "bob"), 0);
    }

    #[test]
    fn plain_member_cannot_confirm() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task_id = awaiting_task(&ctx, &wf);

        let err = ctx
            .lifecycle
            .confirm_completion(&wf, &task_id, "carol", true, None)
            .unwrap_err();
        assert_eq!(err.rule, Some(PermissionRule::CanConfirmCompletion));
    }

    #[test]
    fn feedback_is_stamped_on_confirmation() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task_id = awaiting_task(&ctx, &wf);

        let task = ctx
            .lifecycle
            .confirm_completion(&wf, &task_id, "admin", false, Some("  nice work  "))
            .unwrap();

        assert_eq!(task.feedback_for_completer.as_deref(), Some("nice work"));
        assert_eq!(task.feedback_from.as_deref(), Some("admin"));
        assert!(task.feedback_at.is_some());
    }

    #[test]
    fn blank_feedback_is_ignored() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task_id = awaiting_task(&ctx, &wf);

        let task = ctx
            .lifecycle
            .confirm_completion(&wf, &task_id, "admin", false, Some("   "))
            .unwrap();
        assert!(task.feedback_for_completer.is_none());
    }

    #[test]
    fn completed_always_implies_confirmed_or_privileged_actor() {
        let ctx = setup();
        let wf = team_workflow(&ctx);

        // Confirmation path
        let task_id = awaiting_task(&ctx, &wf);
        let confirmed = ctx
            .lifecycle
            .confirm_completion(&wf, &task_id, "admin", false, None)
            .unwrap();
        assert!(confirmed.confirmed_by.is_some());

        // Privileged direct path
        let direct = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["admin"]))
            .unwrap();
        let direct = ctx
            .lifecycle
            .update_status(&wf, &direct.id, "admin", TaskStatus::Completed, "done")
            .unwrap();
        assert!(direct.confirmed_by.is_none());
        assert_eq!(direct.completed_by.as_deref(), Some("admin"));
    }
}

mod delete_tests {
    use super::*;

    #[test]
    fn soft_delete_hides_task_but_retains_the_row() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["bob"]))
            .unwrap();

        ctx.lifecycle.delete_task(&wf, &task.id, "admin").unwrap();

        let listed = ctx.lifecycle.list_tasks(&wf, "admin").unwrap();
        assert!(listed.is_empty());

        // Direct id lookup still sees the tombstone.
        let raw = ctx.db.find_task(&task.id).unwrap().unwrap();
        assert!(raw.is_deleted);
        assert_eq!(raw.deleted_by.as_deref(), Some("admin"));
        assert!(raw.deleted_at.is_some());
    }

    #[test]
    fn only_admin_or_task_creator_may_delete() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["bob"]))
            .unwrap();

        let err = ctx.lifecycle.delete_task(&wf, &task.id, "bob").unwrap_err();
        assert_eq!(err.rule, Some(PermissionRule::CanEditOrDeleteTask));
    }

    #[test]
    fn deleted_tasks_reject_further_operations() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["bob"]))
            .unwrap();
        ctx.lifecycle.delete_task(&wf, &task.id, "admin").unwrap();

        let err = ctx
            .lifecycle
            .update_status(&wf, &task.id, "bob", TaskStatus::InProgress, "zombie")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}

mod edit_tests {
    use super::*;

    #[test]
    fn edit_rewrites_fields_without_touching_status() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["bob"]))
            .unwrap();
        ctx.lifecycle
            .update_status(&wf, &task.id, "bob", TaskStatus::InProgress, "starting")
            .unwrap();

        let mut input = task_input(&["bob", "carol"]);
        input.title = "Write and review release notes".to_string();
        input.priority = Priority::Critical;
        let edited = ctx
            .lifecycle
            .edit_task(&wf, &task.id, "admin", input)
            .unwrap();

        assert_eq!(edited.title, "Write and review release notes");
        assert_eq!(edited.priority, Priority::Critical);
        assert_eq!(edited.assigned_members, vec!["bob", "carol"]);
        assert_eq!(edited.status, TaskStatus::InProgress);
    }

    #[test]
    fn reassignment_validates_membership() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        seed_user(&ctx.db, "stranger");
        let task = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["bob"]))
            .unwrap();

        let err = ctx
            .lifecycle
            .edit_task(&wf, &task.id, "admin", task_input(&["stranger"]))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}

mod message_tests {
    use super::*;

    fn awaiting_task(ctx: &TestContext, wf: &str) -> String {
        let task = ctx
            .lifecycle
            .create_task(wf, "admin", task_input(&["bob"]))
            .unwrap();
        ctx.lifecycle
            .update_status(wf, &task.id, "bob", TaskStatus::AwaitingConfirmation, "done")
            .unwrap();
        task.id
    }

    #[test]
    fn completer_retracts_message_and_reverts_status() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task_id = awaiting_task(&ctx, &wf);

        let task = ctx
            .lifecycle
            .delete_completion_message(&wf, &task_id, "bob")
            .unwrap();

        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.completion_message.is_none());
        assert!(task.completed_by.is_none());
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn others_cannot_retract_the_completion_message() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task_id = awaiting_task(&ctx, &wf);

        let err = ctx
            .lifecycle
            .delete_completion_message(&wf, &task_id, "admin")
            .unwrap_err();
        assert_eq!(err.rule, Some(PermissionRule::CanDeleteCompletionMessage));
    }

    #[test]
    fn completer_dismisses_feedback_without_status_change() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task_id = awaiting_task(&ctx, &wf);
        ctx.lifecycle
            .confirm_completion(&wf, &task_id, "admin", false, Some("great"))
            .unwrap();

        let task = ctx
            .lifecycle
            .delete_feedback_message(&wf, &task_id, "bob")
            .unwrap();

        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.feedback_for_completer.is_none());
        assert!(task.feedback_from.is_none());
        assert!(task.feedback_at.is_none());
    }

    #[test]
    fn feedback_dismissal_restricted_to_the_completer() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task_id = awaiting_task(&ctx, &wf);
        ctx.lifecycle
            .confirm_completion(&wf, &task_id, "admin", false, Some("great"))
            .unwrap();

        let err = ctx
            .lifecycle
            .delete_feedback_message(&wf, &task_id, "carol")
            .unwrap_err();
        assert_eq!(err.rule, Some(PermissionRule::CanDeleteFeedbackMessage));
    }
}

mod stats_tests {
    use super::*;

    #[test]
    fn stats_count_totals_pending_and_overdue() {
        let ctx = setup();
        let wf = team_workflow(&ctx);

        // One pending task due in the past, one due in the future.
        let mut overdue = task_input(&["bob"]);
        overdue.due_date = Some(now_ms() - 86_400_000);
        ctx.lifecycle.create_task(&wf, "admin", overdue).unwrap();

        let mut upcoming = task_input(&["bob"]);
        upcoming.due_date = Some(now_ms() + 86_400_000);
        ctx.lifecycle.create_task(&wf, "admin", upcoming).unwrap();

        // One completed task with a past due date: not overdue.
        let mut done = task_input(&["admin"]);
        done.due_date = Some(now_ms() - 86_400_000);
        let done = ctx.lifecycle.create_task(&wf, "admin", done).unwrap();
        ctx.lifecycle
            .update_status(&wf, &done.id, "admin", TaskStatus::Completed, "done")
            .unwrap();

        let stats = ctx.lifecycle.workflow_stats(&wf, "admin").unwrap();
        assert_eq!(stats.total_tasks, 3);
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.pending_tasks, 2);
        assert_eq!(stats.overdue_tasks, 1);
    }

    #[test]
    fn deleted_tasks_are_excluded_from_stats_and_completed_listing() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let task = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["admin"]))
            .unwrap();
        ctx.lifecycle
            .update_status(&wf, &task.id, "admin", TaskStatus::Completed, "done")
            .unwrap();
        assert_eq!(
            ctx.lifecycle
                .list_completed_tasks(&wf, "admin")
                .unwrap()
                .len(),
            1
        );

        ctx.lifecycle.delete_task(&wf, &task.id, "admin").unwrap();

        let stats = ctx.lifecycle.workflow_stats(&wf, "admin").unwrap();
        assert_eq!(stats.total_tasks, 0);
        assert!(ctx
            .lifecycle
            .list_completed_tasks(&wf, "admin")
            .unwrap()
            .is_empty());
    }
}

mod event_tests {
    use super::*;
    use crewflow::events::WorkflowEvent;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn drain(rx: &mut UnboundedReceiver<WorkflowEvent>) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind());
        }
        kinds
    }

    #[tokio::test]
    async fn lifecycle_operations_reach_subscribers_in_order() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let (_sub, mut rx) = ctx.hub.subscribe(&wf, Some("admin".to_string()));
        drain(&mut rx); // connected + presence

        let task = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["bob"]))
            .unwrap();
        ctx.lifecycle
            .update_status(&wf, &task.id, "bob", TaskStatus::AwaitingConfirmation, "done")
            .unwrap();
        ctx.lifecycle
            .confirm_completion(&wf, &task.id, "admin", false, None)
            .unwrap();
        let second = ctx
            .lifecycle
            .create_task(&wf, "admin", task_input(&["bob"]))
            .unwrap();
        ctx.lifecycle.delete_task(&wf, &second.id, "admin").unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                "task-created",
                "task-status-changed",
                "task-completed",
                "task-created",
                "task-deleted",
            ]
        );
    }

    #[tokio::test]
    async fn events_stay_within_their_workflow() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let other = ctx
            .membership
            .create_workflow(
                "admin",
                CreateWorkflowInput {
                    name: "Other".to_string(),
                    description: "Unrelated".to_string(),
                    priority: Priority::Low,
                    estimated_members: 1,
                    member_emails: vec![],
                },
            )
            .unwrap();
        let (_s1, mut rx1) = ctx.hub.subscribe(&wf, None);
        let (_s2, mut rx2) = ctx.hub.subscribe(&other.id, None);
        drain(&mut rx1);
        drain(&mut rx2);

        ctx.lifecycle
            .create_task(&wf, "admin", task_input(&["bob"]))
            .unwrap();

        assert_eq!(drain(&mut rx1), vec!["task-created"]);
        assert!(drain(&mut rx2).is_empty());
    }

    #[tokio::test]
    async fn denied_operations_emit_nothing() {
        let ctx = setup();
        let wf = team_workflow(&ctx);
        let (_sub, mut rx) = ctx.hub.subscribe(&wf, None);
        drain(&mut rx);

        let _ = ctx
            .lifecycle
            .create_task(&wf, "bob", task_input(&["carol"]))
            .unwrap_err();

        assert!(drain(&mut rx).is_empty());
    }
}
