//! JSON API handlers.
//!
//! Handlers are thin: resolve the actor, parse the body, call a core
//! service, wrap the outcome. All authorization lives in the services.

use axum::{
    Json,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::lifecycle::TaskInput;
use crate::membership::CreateWorkflowInput;
use crate::types::{MemberPermissions, Priority, TaskStatus};

/// The authenticated user, resolved from request headers.
///
/// Credential checking happens upstream; crewflow trusts `x-user-id`
/// (and optionally `x-user-email`) the way the original trusted its
/// session layer.
pub struct Actor {
    pub user_id: String,
    pub email: Option<String>,
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "success": false, "message": "User not authenticated" })),
                )
            })?;
        let email = parts
            .headers
            .get("x-user-email")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(Actor { user_id, email })
    }
}

// --- workflows ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowBody {
    pub name: String,
    pub description: String,
    pub priority: Priority,
    #[serde(default)]
    pub estimated_members: i64,
    #[serde(default)]
    pub member_emails: Vec<String>,
}

pub async fn create_workflow(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<CreateWorkflowBody>,
) -> ApiResult<Json<Value>> {
    let workflow = state.membership.create_workflow(
        &actor.user_id,
        CreateWorkflowInput {
            name: body.name,
            description: body.description,
            priority: body.priority,
            estimated_members: body.estimated_members,
            member_emails: body.member_emails,
        },
    )?;
    Ok(Json(json!({
        "success": true,
        "message": "Workflow created successfully",
        "workflow": workflow,
    })))
}

pub async fn list_workflows(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Json<Value>> {
    let workflows = state.membership.list_workflows(&actor.user_id)?;
    Ok(Json(json!({ "success": true, "workflows": workflows })))
}

pub async fn get_workflow(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let workflow = state.membership.get_workflow(&id, &actor.user_id)?;
    Ok(Json(json!({ "success": true, "workflow": workflow })))
}

#[derive(Deserialize)]
pub struct UpdateWorkflowBody {
    pub name: String,
    pub description: String,
}

pub async fn update_workflow(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(body): Json<UpdateWorkflowBody>,
) -> ApiResult<Json<Value>> {
    let workflow =
        state
            .membership
            .update_workflow(&id, &actor.user_id, &body.name, &body.description)?;
    Ok(Json(json!({
        "success": true,
        "message": "Workflow updated successfully",
        "workflow": workflow,
    })))
}

pub async fn delete_workflow(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.membership.delete_workflow(&id, &actor.user_id)?;
    Ok(Json(json!({
        "success": true,
        "message": "Workflow deleted successfully",
    })))
}

pub async fn workflow_stats(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let stats = state.lifecycle.workflow_stats(&id, &actor.user_id)?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

// --- members ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteMembersBody {
    pub member_emails: Vec<String>,
}

pub async fn invite_members(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(body): Json<InviteMembersBody>,
) -> ApiResult<Json<Value>> {
    let created = state
        .membership
        .invite_members(&id, &actor.user_id, &body.member_emails)?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Successfully sent {} invitation(s)", created),
    })))
}

pub async fn remove_member(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, member_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    state
        .membership
        .remove_member(&id, &actor.user_id, &member_id)?;
    Ok(Json(json!({
        "success": true,
        "message": "Member removed from workflow successfully",
    })))
}

#[derive(Deserialize)]
pub struct UpdatePermissionsBody {
    pub permissions: MemberPermissions,
}

pub async fn update_member_permissions(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, member_id)): Path<(String, String)>,
    Json(body): Json<UpdatePermissionsBody>,
) -> ApiResult<Json<Value>> {
    state.membership.update_member_permissions(
        &id,
        &actor.user_id,
        &member_id,
        body.permissions,
    )?;
    Ok(Json(json!({
        "success": true,
        "message": "Member permissions updated successfully",
    })))
}

// --- invites ---

pub async fn pending_invites(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Json<Value>> {
    let invites = state.membership.list_pending_invites(&actor.user_id)?;
    Ok(Json(json!({ "success": true, "invites": invites })))
}

#[derive(Deserialize)]
pub struct RespondInviteBody {
    /// "Accepted" or "Declined".
    pub response: String,
}

pub async fn respond_to_invite(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(body): Json<RespondInviteBody>,
) -> ApiResult<Json<Value>> {
    let accept = match body.response.as_str() {
        "Accepted" => true,
        "Declined" => false,
        _ => {
            return Err(ApiError::validation(
                "response",
                "Response must be Accepted or Declined",
            ));
        }
    };
    let workflow = state
        .membership
        .respond_to_invite(&id, &actor.user_id, accept)?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Invite {} successfully", body.response.to_lowercase()),
        "workflow": workflow,
    })))
}

// --- directory ---

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn search_users(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Value>> {
    let users = state.membership.search_users(&actor.user_id, &query.q)?;
    Ok(Json(json!({ "success": true, "users": users })))
}

// --- tasks ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBody {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<i64>,
    pub assigned_members: Vec<String>,
}

impl From<TaskBody> for TaskInput {
    fn from(body: TaskBody) -> Self {
        TaskInput {
            title: body.title,
            description: body.description,
            priority: body.priority,
            due_date: body.due_date,
            assigned_members: body.assigned_members,
        }
    }
}

pub async fn create_task(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(body): Json<TaskBody>,
) -> ApiResult<Json<Value>> {
    let task = state
        .lifecycle
        .create_task(&id, &actor.user_id, body.into())?;
    Ok(Json(json!({
        "success": true,
        "message": "Task created successfully",
        "task": task,
    })))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let tasks = state.lifecycle.list_tasks(&id, &actor.user_id)?;
    Ok(Json(json!({ "success": true, "tasks": tasks })))
}

pub async fn list_completed_tasks(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let tasks = state.lifecycle.list_completed_tasks(&id, &actor.user_id)?;
    Ok(Json(json!({ "success": true, "tasks": tasks })))
}

pub async fn edit_task(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, task_id)): Path<(String, String)>,
    Json(body): Json<TaskBody>,
) -> ApiResult<Json<Value>> {
    let task = state
        .lifecycle
        .edit_task(&id, &task_id, &actor.user_id, body.into())?;
    Ok(Json(json!({
        "success": true,
        "message": "Task updated successfully",
        "task": task,
    })))
}

#[derive(Deserialize)]
pub struct UpdateStatusBody {
    pub status: TaskStatus,
    pub message: String,
}

pub async fn update_task_status(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, task_id)): Path<(String, String)>,
    Json(body): Json<UpdateStatusBody>,
) -> ApiResult<Json<Value>> {
    let task = state.lifecycle.update_status(
        &id,
        &task_id,
        &actor.user_id,
        body.status,
        &body.message,
    )?;
    Ok(Json(json!({
        "success": true,
        "message": "Task status updated successfully",
        "task": task,
    })))
}

pub async fn list_status_updates(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, task_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let updates = state
        .lifecycle
        .list_status_updates(&id, &task_id, &actor.user_id)?;
    Ok(Json(json!({ "success": true, "statusUpdates": updates })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBody {
    #[serde(default)]
    pub award_credits: bool,
    #[serde(default)]
    pub feedback: Option<String>,
}

pub async fn confirm_completion(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, task_id)): Path<(String, String)>,
    Json(body): Json<ConfirmBody>,
) -> ApiResult<Json<Value>> {
    let task = state.lifecycle.confirm_completion(
        &id,
        &task_id,
        &actor.user_id,
        body.award_credits,
        body.feedback.as_deref(),
    )?;
    Ok(Json(json!({
        "success": true,
        "message": "Task completion confirmed successfully",
        "task": task,
    })))
}

pub async fn delete_task(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, task_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    state.lifecycle.delete_task(&id, &task_id, &actor.user_id)?;
    Ok(Json(json!({
        "success": true,
        "message": "Task deleted successfully",
    })))
}

pub async fn delete_completion_message(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, task_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let task = state
        .lifecycle
        .delete_completion_message(&id, &task_id, &actor.user_id)?;
    Ok(Json(json!({
        "success": true,
        "message": "Completion message deleted successfully",
        "task": task,
    })))
}

pub async fn delete_feedback_message(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, task_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let task = state
        .lifecycle
        .delete_feedback_message(&id, &task_id, &actor.user_id)?;
    Ok(Json(json!({
        "success": true,
        "message": "Feedback message deleted successfully",
        "task": task,
    })))
}
