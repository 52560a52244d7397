//! The task lifecycle: creation, transitions, confirmation, deletion.
//!
//! Every mutating operation loads the workflow and task, consults the
//! permission rules, applies the change through the store, and only then
//! hands the resulting event to the broadcast hub — an event is never
//! visible to subscribers before the write it describes is durable.

use crate::error::{ApiError, ApiResult};
use crate::events::WorkflowEvent;
use crate::hub::BroadcastHub;
use crate::permissions;
use crate::store::WorkflowStore;
use crate::types::{Priority, Task, TaskStatus, TaskStatusUpdate, Workflow, WorkflowStats};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Fields accepted when creating or editing a task.
#[derive(Debug, Clone)]
pub struct TaskInput {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<i64>,
    pub assigned_members: Vec<String>,
}

/// Task lifecycle service.
pub struct TaskLifecycle {
    store: Arc<dyn WorkflowStore>,
    hub: Arc<BroadcastHub>,
}

impl TaskLifecycle {
    pub fn new(store: Arc<dyn WorkflowStore>, hub: Arc<BroadcastHub>) -> Self {
        Self { store, hub }
    }

    /// Create a task in Pending status and broadcast it.
    pub fn create_task(
        &self,
        workflow_id: &str,
        actor_id: &str,
        input: TaskInput,
    ) -> ApiResult<Task> {
        let workflow = self.load_workflow(workflow_id)?;

        validate_task_input(&input)?;
        permissions::can_create_task(&workflow, actor_id)?;
        permissions::can_assign_to(&workflow, actor_id, &input.assigned_members)?;
        validate_assignees_are_members(&workflow, &input.assigned_members)?;

        let now = crate::db::now_ms();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            priority: input.priority,
            due_date: input.due_date,
            assigned_members: input.assigned_members,
            status: TaskStatus::Pending,
            created_by: actor_id.to_string(),
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
            created_at: now,
            updated_at: now,
        };
        self.store.create_task(&task)?;
        debug!(workflow_id, task_id = %task.id, "task created");

        self.hub.publish(workflow_id, WorkflowEvent::TaskCreated {
            task: task.clone(),
        });
        Ok(task)
    }

    /// Tasks of the workflow, excluding soft-deleted ones.
    pub fn list_tasks(&self, workflow_id: &str, actor_id: &str) -> ApiResult<Vec<Task>> {
        let workflow = self.load_workflow(workflow_id)?;
        permissions::can_view_workflow(&workflow, actor_id)?;
        Ok(self.store.list_active_tasks(workflow_id)?)
    }

    /// Completed tasks of the workflow.
    pub fn list_completed_tasks(&self, workflow_id: &str, actor_id: &str) -> ApiResult<Vec<Task>> {
        let workflow = self.load_workflow(workflow_id)?;
        permissions::require_member(&workflow, actor_id)?;
        Ok(self.store.list_completed_tasks(workflow_id)?)
    }

    /// Status history of a task.
    pub fn list_status_updates(
        &self,
        workflow_id: &str,
        task_id: &str,
        actor_id: &str,
    ) -> ApiResult<Vec<TaskStatusUpdate>> {
        let workflow = self.load_workflow(workflow_id)?;
        permissions::require_member(&workflow, actor_id)?;
        self.load_task(workflow_id, task_id)?;
        Ok(self.store.list_status_updates(task_id)?)
    }

    /// Aggregate task counts; overdue means a past due date on a task
    /// that is not Completed.
    pub fn workflow_stats(&self, workflow_id: &str, actor_id: &str) -> ApiResult<WorkflowStats> {
        let workflow = self.load_workflow(workflow_id)?;
        permissions::can_view_workflow(&workflow, actor_id)?;

        let tasks = self.store.list_active_tasks(workflow_id)?;
        let now = crate::db::now_ms();
        let completed = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count() as i64;
        let pending = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .count() as i64;
        let overdue = tasks
            .iter()
            .filter(|t| {
                t.status != TaskStatus::Completed && t.due_date.is_some_and(|due| due < now)
            })
            .count() as i64;

        Ok(WorkflowStats {
            total_tasks: tasks.len() as i64,
            completed_tasks: completed,
            pending_tasks: pending,
            overdue_tasks: overdue,
        })
    }

    /// Rewrite a task's fields, including reassignment. Status is not
    /// touched here.
    pub fn edit_task(
        &self,
        workflow_id: &str,
        task_id: &str,
        actor_id: &str,
        input: TaskInput,
    ) -> ApiResult<Task> {
        let workflow = self.load_workflow(workflow_id)?;
        let mut task = self.load_task(workflow_id, task_id)?;

        permissions::can_edit_or_delete_task(&workflow, &task, actor_id)?;
        validate_task_input(&input)?;
        validate_assignees_are_members(&workflow, &input.assigned_members)?;

        task.title = input.title.trim().to_string();
        task.description = input.description.trim().to_string();
        task.priority = input.priority;
        task.due_date = input.due_date;
        task.assigned_members = input.assigned_members;
        task.updated_at = crate::db::now_ms();
        self.store.save_task(&task)?;

        self.hub.publish(workflow_id, WorkflowEvent::TaskUpdated {
            task: task.clone(),
        });
        Ok(task)
    }

    /// Advance a task along the status chain.
    ///
    /// Entering Awaiting Confirmation (or Completed via the privileged
    /// path) stamps the completion message and completer; every
    /// transition is appended to the task's status history.
    pub fn update_status(
        &self,
        workflow_id: &str,
        task_id: &str,
        actor_id: &str,
        new_status: TaskStatus,
        message: &str,
    ) -> ApiResult<Task> {
        let workflow = self.load_workflow(workflow_id)?;
        let mut task = self.load_task(workflow_id, task_id)?;

        permissions::can_advance_status(&workflow, &task, actor_id, new_status)?;
        if !task.status.can_transition_to(new_status) {
            return Err(ApiError::invalid_transition(task.status, new_status));
        }

        let now = crate::db::now_ms();
        task.status = new_status;
        task.updated_at = now;
        if matches!(
            new_status,
            TaskStatus::AwaitingConfirmation | TaskStatus::Completed
        ) {
            task.completion_message = Some(message.to_string());
            task.completed_by = Some(actor_id.to_string());
            task.completed_at = Some(now);
        }
        self.store.save_task(&task)?;
        self.store
            .append_status_update(task_id, new_status, message, actor_id, now)?;
        debug!(workflow_id, task_id, status = new_status.as_str(), "task status changed");

        self.hub.publish(workflow_id, WorkflowEvent::TaskStatusChanged {
            task: task.clone(),
        });
        Ok(task)
    }

    /// Confirm a completion, optionally leaving feedback and awarding a
    /// credit to the completer.
    ///
    /// The store-level compare-and-set on `confirmed_by` makes this safe
    /// against concurrent confirmations: exactly one caller wins, and
    /// the credit is only incremented on the winning path, so it can
    /// never be applied twice for the same confirmation.
    pub fn confirm_completion(
        &self,
        workflow_id: &str,
        task_id: &str,
        actor_id: &str,
        award_credits: bool,
        feedback: Option<&str>,
    ) -> ApiResult<Task> {
        let workflow = self.load_workflow(workflow_id)?;
        let task = self.load_task(workflow_id, task_id)?;

        permissions::can_confirm_completion(&workflow, &task, actor_id)?;

        let feedback = feedback.map(str::trim).filter(|s| !s.is_empty());
        let now = crate::db::now_ms();
        let won = self
            .store
            .confirm_task(task_id, actor_id, now, feedback, award_credits)?;
        if !won {
            // Lost the race to a concurrent confirmation.
            return Err(ApiError::already_confirmed());
        }

        if award_credits {
            if let Some(completed_by) = &task.completed_by {
                let credited = self
                    .store
                    .increment_member_credits(workflow_id, completed_by)?;
                if !credited {
                    warn!(workflow_id, task_id, completed_by = %completed_by,
                        "completer is no longer a member; credit not awarded");
                }
            }
        }

        let confirmed = self.load_task(workflow_id, task_id)?;
        self.hub.publish(workflow_id, WorkflowEvent::TaskCompleted {
            task: confirmed.clone(),
        });
        Ok(confirmed)
    }

    /// Soft-delete a task. It disappears from every listing but stays in
    /// storage.
    pub fn delete_task(&self, workflow_id: &str, task_id: &str, actor_id: &str) -> ApiResult<()> {
        let workflow = self.load_workflow(workflow_id)?;
        let mut task = self.load_task(workflow_id, task_id)?;

        permissions::can_edit_or_delete_task(&workflow, &task, actor_id)?;

        let now = crate::db::now_ms();
        task.is_deleted = true;
        task.deleted_by = Some(actor_id.to_string());
        task.deleted_at = Some(now);
        task.updated_at = now;
        self.store.save_task(&task)?;
        debug!(workflow_id, task_id, "task soft-deleted");

        self.hub.publish(workflow_id, WorkflowEvent::TaskDeleted {
            task_id: task_id.to_string(),
        });
        Ok(())
    }

    /// Retract a completion message. Only the member who wrote it may do
    /// so; the task reverts to In Progress and the completion fields are
    /// cleared.
    pub fn delete_completion_message(
        &self,
        workflow_id: &str,
        task_id: &str,
        actor_id: &str,
    ) -> ApiResult<Task> {
        let workflow = self.load_workflow(workflow_id)?;
        let mut task = self.load_task(workflow_id, task_id)?;

        permissions::require_member(&workflow, actor_id)?;
        permissions::can_delete_completion_message(&task, actor_id)?;

        task.completion_message = None;
        task.completed_by = None;
        task.completed_at = None;
        task.status = TaskStatus::InProgress;
        task.updated_at = crate::db::now_ms();
        self.store.save_task(&task)?;

        self.hub.publish(workflow_id, WorkflowEvent::TaskUpdated {
            task: task.clone(),
        });
        Ok(task)
    }

    /// Dismiss confirmation feedback. Only the completer it was left for
    /// may do so; status is untouched.
    pub fn delete_feedback_message(
        &self,
        workflow_id: &str,
        task_id: &str,
        actor_id: &str,
    ) -> ApiResult<Task> {
        let workflow = self.load_workflow(workflow_id)?;
        let mut task = self.load_task(workflow_id, task_id)?;

        permissions::require_member(&workflow, actor_id)?;
        permissions::can_delete_feedback_message(&task, actor_id)?;

        task.feedback_for_completer = None;
        task.feedback_from = None;
        task.feedback_at = None;
        task.updated_at = crate::db::now_ms();
        self.store.save_task(&task)?;

        self.hub.publish(workflow_id, WorkflowEvent::TaskUpdated {
            task: task.clone(),
        });
        Ok(task)
    }

    fn load_workflow(&self, workflow_id: &str) -> ApiResult<Workflow> {
        self.store
            .find_workflow(workflow_id)?
            .ok_or_else(|| ApiError::not_found("Workflow"))
    }

    /// Load a live task of the workflow. Soft-deleted tasks and tasks
    /// belonging to another workflow read as missing.
    fn load_task(&self, workflow_id: &str, task_id: &str) -> ApiResult<Task> {
        let task = self
            .store
            .find_task(task_id)?
            .ok_or_else(|| ApiError::not_found("Task"))?;
        if task.is_deleted || task.workflow_id != workflow_id {
            return Err(ApiError::not_found("Task"));
        }
        Ok(task)
    }
}

fn validate_task_input(input: &TaskInput) -> ApiResult<()> {
    if input.title.trim().is_empty() {
        return Err(ApiError::validation("title", "Title is required"));
    }
    if input.description.trim().is_empty() {
        return Err(ApiError::validation("description", "Description is required"));
    }
    if input.assigned_members.is_empty() {
        return Err(ApiError::validation(
            "assignedMembers",
            "At least one assigned member is required",
        ));
    }
    Ok(())
}

fn validate_assignees_are_members(workflow: &Workflow, assignees: &[String]) -> ApiResult<()> {
    let outside = assignees
        .iter()
        .any(|id| workflow.member(id).is_none());
    if outside {
        return Err(ApiError::validation(
            "assignedMembers",
            "Some assigned members are not part of this workflow",
        ));
    }
    Ok(())
}
