//! Workflow invite persistence.

use super::Database;
use crate::types::{InviteStatus, WorkflowInvite};
use anyhow::Result;
use rusqlite::{Row, params};

pub(crate) fn parse_invite_row(row: &Row) -> rusqlite::Result<WorkflowInvite> {
    let status: String = row.get("status")?;

    Ok(WorkflowInvite {
        id: row.get("id")?,
        workflow_id: row.get("workflow_id")?,
        workflow_name: row.get("workflow_name")?,
        invited_by: row.get("invited_by")?,
        invited_by_email: row.get("invited_by_email")?,
        invited_by_first_name: row.get("invited_by_first_name")?,
        invited_by_last_name: row.get("invited_by_last_name")?,
        invited_user: row.get("invited_user")?,
        invited_user_email: row.get("invited_user_email")?,
        status: InviteStatus::parse(&status).unwrap_or(InviteStatus::Pending),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl Database {
    pub fn create_invite(&self, invite: &WorkflowInvite) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO workflow_invites
                 (id, workflow_id, workflow_name, invited_by, invited_by_email,
                  invited_by_first_name, invited_by_last_name, invited_user,
                  invited_user_email, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    invite.id,
                    invite.workflow_id,
                    invite.workflow_name,
                    invite.invited_by,
                    invite.invited_by_email,
                    invite.invited_by_first_name,
                    invite.invited_by_last_name,
                    invite.invited_user,
                    invite.invited_user_email,
                    invite.status.as_str(),
                    invite.created_at,
                    invite.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn find_invite(&self, id: &str) -> Result<Option<WorkflowInvite>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM workflow_invites WHERE id = ?1")?;
            let result = stmt.query_row(params![id], parse_invite_row);
            match result {
                Ok(invite) => Ok(Some(invite)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn list_pending_invites_for_user(&self, user_id: &str) -> Result<Vec<WorkflowInvite>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM workflow_invites
                 WHERE invited_user = ?1 AND status = 'Pending'
                 ORDER BY created_at DESC",
            )?;
            let invites = stmt
                .query_map(params![user_id], parse_invite_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(invites)
        })
    }

    pub fn has_pending_invite(&self, workflow_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM workflow_invites
                 WHERE workflow_id = ?1 AND invited_user = ?2 AND status = 'Pending'",
                params![workflow_id, user_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Resolve a Pending invite addressed to `invited_user`. The status
    /// guard makes re-responding (and responding to a voided invite) a
    /// no-op reported as false.
    pub fn resolve_invite(
        &self,
        id: &str,
        invited_user: &str,
        status: InviteStatus,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE workflow_invites SET status = ?3, updated_at = ?4
                 WHERE id = ?1 AND invited_user = ?2 AND status = 'Pending'",
                params![id, invited_user, status.as_str(), super::now_ms()],
            )?;
            Ok(n > 0)
        })
    }

    /// Decline every Pending invite for the user in the workflow.
    pub fn void_pending_invites(&self, workflow_id: &str, user_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE workflow_invites SET status = 'Declined', updated_at = ?3
                 WHERE workflow_id = ?1 AND invited_user = ?2 AND status = 'Pending'",
                params![workflow_id, user_id, super::now_ms()],
            )?;
            Ok(n as u64)
        })
    }

    pub fn delete_invites_for_workflow(&self, workflow_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM workflow_invites WHERE workflow_id = ?1",
                params![workflow_id],
            )?;
            Ok(n as u64)
        })
    }
}
