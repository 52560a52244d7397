//! Workflow and membership management: creation, invites, member
//! removal and permission grants.
//!
//! An invite is the only door into a workflow: membership is created
//! when (and only when) a Pending invite is accepted by its addressee.
//! Declining, or having the invite voided by a removal, leaves no trace
//! in the member list.

use crate::error::{ApiError, ApiResult};
use crate::permissions;
use crate::store::{UserDirectory, WorkflowStore};
use crate::types::{
    InviteStatus, MemberPermissions, Priority, Role, UserProfile, Workflow, WorkflowInvite,
    WorkflowMember, WorkflowStatus,
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Fields accepted when creating a workflow.
#[derive(Debug, Clone)]
pub struct CreateWorkflowInput {
    pub name: String,
    pub description: String,
    pub priority: Priority,
    pub estimated_members: i64,
    /// Email addresses to invite right away; the creator's own address
    /// and unknown addresses are skipped.
    pub member_emails: Vec<String>,
}

/// Workflow membership service.
pub struct WorkflowMembership {
    store: Arc<dyn WorkflowStore>,
    directory: Arc<dyn UserDirectory>,
}

impl WorkflowMembership {
    pub fn new(store: Arc<dyn WorkflowStore>, directory: Arc<dyn UserDirectory>) -> Self {
        Self { store, directory }
    }

    /// Create a workflow. The creator is seeded as an Admin member with
    /// unrestricted permissions; everyone else enters through an invite.
    pub fn create_workflow(
        &self,
        actor_id: &str,
        input: CreateWorkflowInput,
    ) -> ApiResult<Workflow> {
        if input.name.trim().is_empty() {
            return Err(ApiError::validation("name", "Name is required"));
        }
        if input.description.trim().is_empty() {
            return Err(ApiError::validation("description", "Description is required"));
        }

        let creator = self
            .directory
            .find_user(actor_id)?
            .ok_or_else(|| ApiError::not_found("User"))?;

        let now = crate::db::now_ms();
        let workflow = Workflow {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            description: input.description.trim().to_string(),
            priority: input.priority,
            status: WorkflowStatus::Active,
            created_by: actor_id.to_string(),
            members: vec![WorkflowMember {
                user_id: creator.id.clone(),
                email: creator.email.clone(),
                first_name: creator.first_name.clone(),
                last_name: creator.last_name.clone(),
                role: Role::Admin,
                invite_status: InviteStatus::Accepted,
                permissions: MemberPermissions::unrestricted(),
                credits: 0,
                joined_at: now,
            }],
            estimated_members: input.estimated_members,
            created_at: now,
            updated_at: now,
        };
        self.store.create_workflow(&workflow)?;
        info!(workflow_id = %workflow.id, "workflow created");

        for email in &input.member_emails {
            if email.eq_ignore_ascii_case(&creator.email) {
                continue;
            }
            if let Err(err) = self.invite_by_email(&workflow, &creator, email) {
                debug!(workflow_id = %workflow.id, email, %err, "invite skipped");
            }
        }

        Ok(workflow)
    }

    /// Workflows the actor created or belongs to.
    pub fn list_workflows(&self, actor_id: &str) -> ApiResult<Vec<Workflow>> {
        Ok(self.store.list_workflows_for_user(actor_id)?)
    }

    /// Fetch one workflow, member-or-creator gated.
    pub fn get_workflow(&self, workflow_id: &str, actor_id: &str) -> ApiResult<Workflow> {
        let workflow = self.load_workflow(workflow_id)?;
        permissions::can_view_workflow(&workflow, actor_id)?;
        Ok(workflow)
    }

    /// Rename a workflow (creator only).
    pub fn update_workflow(
        &self,
        workflow_id: &str,
        actor_id: &str,
        name: &str,
        description: &str,
    ) -> ApiResult<Workflow> {
        let mut workflow = self.load_workflow(workflow_id)?;
        permissions::can_modify_workflow(&workflow, actor_id)?;
        if name.trim().is_empty() {
            return Err(ApiError::validation("name", "Name is required"));
        }

        workflow.name = name.trim().to_string();
        workflow.description = description.trim().to_string();
        workflow.updated_at = crate::db::now_ms();
        self.store.save_workflow(&workflow)?;
        Ok(workflow)
    }

    /// Delete a workflow (creator only) together with all of its
    /// invites.
    pub fn delete_workflow(&self, workflow_id: &str, actor_id: &str) -> ApiResult<()> {
        let workflow = self.load_workflow(workflow_id)?;
        permissions::can_modify_workflow(&workflow, actor_id)?;

        self.store.delete_workflow(workflow_id)?;
        let voided = self.store.delete_invites_for_workflow(workflow_id)?;
        info!(workflow_id, invites_removed = voided, "workflow deleted");
        Ok(())
    }

    /// Invite one user by email. Rejects addresses that are already
    /// members or already hold a pending invite to this workflow.
    pub fn invite_member(
        &self,
        workflow_id: &str,
        actor_id: &str,
        email: &str,
    ) -> ApiResult<WorkflowInvite> {
        let workflow = self.load_workflow(workflow_id)?;
        permissions::can_manage_members(&workflow, actor_id)?;

        let inviter = self
            .directory
            .find_user(actor_id)?
            .ok_or_else(|| ApiError::not_found("User"))?;
        self.invite_by_email(&workflow, &inviter, email)
    }

    /// Invite a batch of email addresses, skipping ones that cannot be
    /// invited. Returns the number of invites created.
    pub fn invite_members(
        &self,
        workflow_id: &str,
        actor_id: &str,
        emails: &[String],
    ) -> ApiResult<usize> {
        let workflow = self.load_workflow(workflow_id)?;
        permissions::can_manage_members(&workflow, actor_id)?;

        let inviter = self
            .directory
            .find_user(actor_id)?
            .ok_or_else(|| ApiError::not_found("User"))?;

        let mut created = 0;
        for email in emails {
            match self.invite_by_email(&workflow, &inviter, email) {
                Ok(_) => created += 1,
                Err(err) => {
                    debug!(workflow_id, email, %err, "invite skipped");
                }
            }
        }
        Ok(created)
    }

    /// Pending invites addressed to the actor.
    pub fn list_pending_invites(&self, actor_id: &str) -> ApiResult<Vec<WorkflowInvite>> {
        Ok(self.store.list_pending_invites_for_user(actor_id)?)
    }

    /// Accept or decline an invite. Accepting adds the actor as a
    /// Member with default (empty) permissions; declining leaves the
    /// workflow untouched. Either way the invite is spent: responding a
    /// second time, or responding to an invite voided by a removal,
    /// reads as missing.
    pub fn respond_to_invite(
        &self,
        invite_id: &str,
        actor_id: &str,
        accept: bool,
    ) -> ApiResult<Option<Workflow>> {
        let invite = self
            .store
            .find_invite(invite_id)?
            .ok_or_else(|| ApiError::not_found("Invite"))?;

        let status = if accept {
            InviteStatus::Accepted
        } else {
            InviteStatus::Declined
        };
        let resolved = self.store.resolve_invite(invite_id, actor_id, status)?;
        if !resolved {
            return Err(ApiError::not_found("Pending invite"));
        }

        if !accept {
            return Ok(None);
        }

        let user = self
            .directory
            .find_user(actor_id)?
            .ok_or_else(|| ApiError::not_found("User"))?;
        let workflow = self.load_workflow(&invite.workflow_id)?;
        if workflow.member(actor_id).is_some() {
            return Err(ApiError::already_member(&user.email));
        }

        let member = WorkflowMember {
            user_id: user.id.clone(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: Role::Member,
            invite_status: InviteStatus::Accepted,
            permissions: MemberPermissions::default(),
            credits: 0,
            joined_at: crate::db::now_ms(),
        };
        self.store.add_member(&invite.workflow_id, &member)?;
        info!(workflow_id = %invite.workflow_id, user_id = %user.id, "invite accepted");

        Ok(Some(self.load_workflow(&invite.workflow_id)?))
    }

    /// Remove a member (creator only; the creator itself is never a
    /// valid target). Outstanding pending invites for the member are
    /// voided in the same operation so a removed member cannot re-enter
    /// through a stale invite.
    pub fn remove_member(
        &self,
        workflow_id: &str,
        actor_id: &str,
        member_id: &str,
    ) -> ApiResult<()> {
        let workflow = self.load_workflow(workflow_id)?;
        permissions::can_remove_member(&workflow, actor_id, member_id)?;

        let removed = self.store.remove_member(workflow_id, member_id)?;
        if !removed {
            return Err(ApiError::not_found("Member"));
        }
        let voided = self.store.void_pending_invites(workflow_id, member_id)?;
        info!(workflow_id, member_id, invites_voided = voided, "member removed");
        Ok(())
    }

    /// Replace one member's permission grants (creator only; the
    /// creator's own grants are immutable).
    pub fn update_member_permissions(
        &self,
        workflow_id: &str,
        actor_id: &str,
        member_id: &str,
        grants: MemberPermissions,
    ) -> ApiResult<()> {
        let workflow = self.load_workflow(workflow_id)?;
        permissions::can_update_permissions(&workflow, actor_id, member_id)?;

        let updated = self
            .store
            .update_member_permissions(workflow_id, member_id, &grants)?;
        if !updated {
            return Err(ApiError::not_found("Member"));
        }
        Ok(())
    }

    /// Directory search for invite targeting.
    pub fn search_users(&self, actor_id: &str, query: &str) -> ApiResult<Vec<UserProfile>> {
        Ok(self.directory.search_users(query, actor_id)?)
    }

    fn invite_by_email(
        &self,
        workflow: &Workflow,
        inviter: &UserProfile,
        email: &str,
    ) -> ApiResult<WorkflowInvite> {
        let invited = self
            .directory
            .find_user_by_email(email)?
            .ok_or_else(|| ApiError::not_found("User"))?;

        if workflow.member(&invited.id).is_some() {
            return Err(ApiError::already_member(email));
        }
        if self.store.has_pending_invite(&workflow.id, &invited.id)? {
            return Err(ApiError::duplicate_invite(email));
        }

        let now = crate::db::now_ms();
        let invite = WorkflowInvite {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow.id.clone(),
            workflow_name: workflow.name.clone(),
            invited_by: inviter.id.clone(),
            invited_by_email: inviter.email.clone(),
            invited_by_first_name: inviter.first_name.clone(),
            invited_by_last_name: inviter.last_name.clone(),
            invited_user: invited.id,
            invited_user_email: invited.email,
            status: InviteStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.store.create_invite(&invite)?;
        Ok(invite)
    }

    fn load_workflow(&self, workflow_id: &str) -> ApiResult<Workflow> {
        self.store
            .find_workflow(workflow_id)?
            .ok_or_else(|| ApiError::not_found("Workflow"))
    }
}
