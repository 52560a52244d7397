//! Task persistence and the confirmation compare-and-set.

use super::Database;
use crate::types::{Priority, Task, TaskStatus, TaskStatusUpdate};
use anyhow::Result;
use rusqlite::{Row, params};

pub(crate) fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let priority: String = row.get("priority")?;
    let status: String = row.get("status")?;
    let assigned_json: String = row.get("assigned_members")?;

    Ok(Task {
        id: row.get("id")?,
        workflow_id: row.get("workflow_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority: Priority::parse(&priority).unwrap_or(Priority::Medium),
        due_date: row.get("due_date")?,
        assigned_members: serde_json::from_str(&assigned_json).unwrap_or_default(),
        status: TaskStatus::parse(&status).unwrap_or(TaskStatus::Pending),
        created_by: row.get("created_by")?,
        completion_message: row.get("completion_message")?,
        completed_by: row.get("completed_by")?,
        completed_at: row.get("completed_at")?,
        confirmed_by: row.get("confirmed_by")?,
        confirmed_at: row.get("confirmed_at")?,
        credits_awarded: row.get("credits_awarded")?,
        feedback_for_completer: row.get("feedback_for_completer")?,
        feedback_from: row.get("feedback_from")?,
        feedback_at: row.get("feedback_at")?,
        is_deleted: row.get("is_deleted")?,
        deleted_by: row.get("deleted_by")?,
        deleted_at: row.get("deleted_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl Database {
    pub fn create_task(&self, task: &Task) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks
                 (id, workflow_id, title, description, priority, due_date,
                  assigned_members, status, created_by, credits_awarded,
                  is_deleted, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    task.id,
                    task.workflow_id,
                    task.title,
                    task.description,
                    task.priority.as_str(),
                    task.due_date,
                    serde_json::to_string(&task.assigned_members)?,
                    task.status.as_str(),
                    task.created_by,
                    task.credits_awarded,
                    task.is_deleted,
                    task.created_at,
                    task.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Direct id lookup; returns soft-deleted tasks as well.
    pub fn find_task(&self, id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;
            let result = stmt.query_row(params![id], parse_task_row);
            match result {
                Ok(task) => Ok(Some(task)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Full-row update of every mutable field.
    pub fn save_task(&self, task: &Task) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE tasks SET
                   title = ?2, description = ?3, priority = ?4, due_date = ?5,
                   assigned_members = ?6, status = ?7,
                   completion_message = ?8, completed_by = ?9, completed_at = ?10,
                   confirmed_by = ?11, confirmed_at = ?12, credits_awarded = ?13,
                   feedback_for_completer = ?14, feedback_from = ?15, feedback_at = ?16,
                   is_deleted = ?17, deleted_by = ?18, deleted_at = ?19,
                   updated_at = ?20
                 WHERE id = ?1",
                params![
                    task.id,
                    task.title,
                    task.description,
                    task.priority.as_str(),
                    task.due_date,
                    serde_json::to_string(&task.assigned_members)?,
                    task.status.as_str(),
                    task.completion_message,
                    task.completed_by,
                    task.completed_at,
                    task.confirmed_by,
                    task.confirmed_at,
                    task.credits_awarded,
                    task.feedback_for_completer,
                    task.feedback_from,
                    task.feedback_at,
                    task.is_deleted,
                    task.deleted_by,
                    task.deleted_at,
                    task.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Tasks of a workflow excluding soft-deleted ones, newest first.
    pub fn list_active_tasks(&self, workflow_id: &str) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM tasks WHERE workflow_id = ?1 AND is_deleted = 0
                 ORDER BY created_at DESC",
            )?;
            let tasks = stmt
                .query_map(params![workflow_id], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
    }

    /// Completed tasks of a workflow excluding soft-deleted ones.
    pub fn list_completed_tasks(&self, workflow_id: &str) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM tasks
                 WHERE workflow_id = ?1 AND status = 'Completed' AND is_deleted = 0
                 ORDER BY created_at DESC",
            )?;
            let tasks = stmt
                .query_map(params![workflow_id], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
    }

    pub fn append_status_update(
        &self,
        task_id: &str,
        status: TaskStatus,
        message: &str,
        updated_by: &str,
        updated_at: i64,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO task_status_updates (task_id, status, message, updated_by, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![task_id, status.as_str(), message, updated_by, updated_at],
            )?;
            Ok(())
        })
    }

    pub fn list_status_updates(&self, task_id: &str) -> Result<Vec<TaskStatusUpdate>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, status, message, updated_by, updated_at
                 FROM task_status_updates WHERE task_id = ?1 ORDER BY id ASC",
            )?;
            let updates = stmt
                .query_map(params![task_id], |row| {
                    let status: String = row.get("status")?;
                    Ok(TaskStatusUpdate {
                        id: row.get("id")?,
                        task_id: row.get("task_id")?,
                        status: TaskStatus::parse(&status).unwrap_or(TaskStatus::Pending),
                        message: row.get("message")?,
                        updated_by: row.get("updated_by")?,
                        updated_at: row.get("updated_at")?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(updates)
        })
    }

    /// Confirmation compare-and-set.
    ///
    /// The WHERE clause requires `confirmed_by` to still be unset, so of
    /// two racing confirmations exactly one observes a row change and
    /// returns true. The loser gets false and must not award credits.
    pub fn confirm_task(
        &self,
        task_id: &str,
        confirmed_by: &str,
        confirmed_at: i64,
        feedback: Option<&str>,
        award_credits: bool,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = if let Some(feedback) = feedback {
                conn.execute(
                    "UPDATE tasks SET
                       status = 'Completed', confirmed_by = ?2, confirmed_at = ?3,
                       credits_awarded = ?4, feedback_for_completer = ?5,
                       feedback_from = ?2, feedback_at = ?3, updated_at = ?3
                     WHERE id = ?1 AND confirmed_by IS NULL",
                    params![task_id, confirmed_by, confirmed_at, award_credits, feedback],
                )?
            } else {
                conn.execute(
                    "UPDATE tasks SET
                       status = 'Completed', confirmed_by = ?2, confirmed_at = ?3,
                       credits_awarded = ?4, updated_at = ?3
                     WHERE id = ?1 AND confirmed_by IS NULL",
                    params![task_id, confirmed_by, confirmed_at, award_credits],
                )?
            };
            Ok(n > 0)
        })
    }
}
