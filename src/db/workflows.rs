//! Workflow and member persistence.

use super::Database;
use crate::types::{
    InviteStatus, MemberPermissions, Priority, Role, Workflow, WorkflowMember, WorkflowStatus,
};
use anyhow::Result;
use rusqlite::{Connection, Row, params};

pub(crate) fn parse_workflow_row(row: &Row) -> rusqlite::Result<Workflow> {
    let priority: String = row.get("priority")?;
    let status: String = row.get("status")?;

    Ok(Workflow {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        priority: Priority::parse(&priority).unwrap_or(Priority::Medium),
        status: WorkflowStatus::parse(&status).unwrap_or(WorkflowStatus::Active),
        created_by: row.get("created_by")?,
        members: Vec::new(),
        estimated_members: row.get("estimated_members")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn parse_member_row(row: &Row) -> rusqlite::Result<WorkflowMember> {
    let role: String = row.get("role")?;
    let invite_status: String = row.get("invite_status")?;
    let assignable_json: String = row.get("assignable_members")?;

    Ok(WorkflowMember {
        user_id: row.get("user_id")?,
        email: row.get("email")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        role: Role::parse(&role).unwrap_or(Role::Member),
        invite_status: InviteStatus::parse(&invite_status).unwrap_or(InviteStatus::Accepted),
        permissions: MemberPermissions {
            can_create_tasks: row.get("can_create_tasks")?,
            can_assign_tasks: row.get("can_assign_tasks")?,
            assignable_members: serde_json::from_str(&assignable_json).unwrap_or_default(),
        },
        credits: row.get("credits")?,
        joined_at: row.get("joined_at")?,
    })
}

/// Load the member list for a workflow using an existing connection.
fn load_members(conn: &Connection, workflow_id: &str) -> Result<Vec<WorkflowMember>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM workflow_members WHERE workflow_id = ?1 ORDER BY joined_at ASC",
    )?;
    let members = stmt
        .query_map(params![workflow_id], parse_member_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(members)
}

fn insert_member(conn: &Connection, workflow_id: &str, member: &WorkflowMember) -> Result<()> {
    conn.execute(
        "INSERT INTO workflow_members
         (workflow_id, user_id, email, first_name, last_name, role, invite_status,
          can_create_tasks, can_assign_tasks, assignable_members, credits, joined_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            workflow_id,
            member.user_id,
            member.email,
            member.first_name,
            member.last_name,
            member.role.as_str(),
            member.invite_status.as_str(),
            member.permissions.can_create_tasks,
            member.permissions.can_assign_tasks,
            serde_json::to_string(&member.permissions.assignable_members)?,
            member.credits,
            member.joined_at,
        ],
    )?;
    Ok(())
}

impl Database {
    /// Insert a workflow together with its seed members.
    pub fn create_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO workflows
                 (id, name, description, priority, status, created_by,
                  estimated_members, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    workflow.id,
                    workflow.name,
                    workflow.description,
                    workflow.priority.as_str(),
                    workflow.status.as_str(),
                    workflow.created_by,
                    workflow.estimated_members,
                    workflow.created_at,
                    workflow.updated_at,
                ],
            )?;
            for member in &workflow.members {
                insert_member(&tx, &workflow.id, member)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Fetch a workflow with its members.
    pub fn find_workflow(&self, id: &str) -> Result<Option<Workflow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM workflows WHERE id = ?1")?;
            let result = stmt.query_row(params![id], parse_workflow_row);
            match result {
                Ok(mut workflow) => {
                    workflow.members = load_members(conn, id)?;
                    Ok(Some(workflow))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Update a workflow's own fields; members are untouched.
    pub fn save_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE workflows
                 SET name = ?2, description = ?3, priority = ?4, status = ?5,
                     estimated_members = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    workflow.id,
                    workflow.name,
                    workflow.description,
                    workflow.priority.as_str(),
                    workflow.status.as_str(),
                    workflow.estimated_members,
                    workflow.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Delete a workflow; members go with it via the FK cascade.
    pub fn delete_workflow(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM workflows WHERE id = ?1", params![id])?;
            Ok(n > 0)
        })
    }

    /// Workflows the user created or belongs to, newest first.
    pub fn list_workflows_for_user(&self, user_id: &str) -> Result<Vec<Workflow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT w.* FROM workflows w
                 LEFT JOIN workflow_members m ON m.workflow_id = w.id
                 WHERE w.created_by = ?1 OR m.user_id = ?1
                 ORDER BY w.created_at DESC",
            )?;
            let mut workflows = stmt
                .query_map(params![user_id], parse_workflow_row)?
                .collect::<Result<Vec<_>, _>>()?;
            for workflow in &mut workflows {
                workflow.members = load_members(conn, &workflow.id)?;
            }
            Ok(workflows)
        })
    }

    pub fn find_member_in_workflow(
        &self,
        workflow_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkflowMember>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM workflow_members WHERE workflow_id = ?1 AND user_id = ?2",
            )?;
            let result = stmt.query_row(params![workflow_id, user_id], parse_member_row);
            match result {
                Ok(member) => Ok(Some(member)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn add_member(&self, workflow_id: &str, member: &WorkflowMember) -> Result<()> {
        self.with_conn(|conn| insert_member(conn, workflow_id, member))
    }

    pub fn remove_member(&self, workflow_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM workflow_members WHERE workflow_id = ?1 AND user_id = ?2",
                params![workflow_id, user_id],
            )?;
            Ok(n > 0)
        })
    }

    pub fn update_member_permissions(
        &self,
        workflow_id: &str,
        user_id: &str,
        permissions: &MemberPermissions,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE workflow_members
                 SET can_create_tasks = ?3, can_assign_tasks = ?4, assignable_members = ?5
                 WHERE workflow_id = ?1 AND user_id = ?2",
                params![
                    workflow_id,
                    user_id,
                    permissions.can_create_tasks,
                    permissions.can_assign_tasks,
                    serde_json::to_string(&permissions.assignable_members)?,
                ],
            )?;
            Ok(n > 0)
        })
    }

    pub fn increment_member_credits(&self, workflow_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE workflow_members SET credits = credits + 1
                 WHERE workflow_id = ?1 AND user_id = ?2",
                params![workflow_id, user_id],
            )?;
            Ok(n > 0)
        })
    }
}
