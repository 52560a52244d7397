//! Structured error types for service responses.

use crate::types::TaskStatus;
use serde::Serialize;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    ValidationError,
    InvalidTransition,

    // Not found
    NotFound,

    // Authorization
    PermissionDenied,

    // Conflicts
    AlreadyConfirmed,
    DuplicateInvite,
    AlreadyMember,

    // Internal errors
    DatabaseError,
    InternalError,
}

/// The specific authorization rule that failed. Carried on every
/// `PermissionDenied` so the caller can render a precise reason.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PermissionRule {
    WorkflowMember,
    WorkflowCreator,
    CanCreateTask,
    CanAssignTo,
    CanEditOrDeleteTask,
    CanAdvanceStatus,
    CanConfirmCompletion,
    CanManageMembers,
    CanRemoveMember,
    CanUpdatePermissions,
    CanDeleteCompletionMessage,
    CanDeleteFeedbackMessage,
}

/// Structured error for service operations.
///
/// Expected business failures (denials, validation, conflicts) are
/// returned as values of this type; only genuinely unexpected faults
/// (storage unavailable) travel through the `DatabaseError`/
/// `InternalError` codes.
#[derive(Debug, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<PermissionRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            rule: None,
            field: None,
        }
    }

    // Convenience constructors

    pub fn permission_denied(rule: PermissionRule, message: impl Into<String>) -> Self {
        let mut err = Self::new(ErrorCode::PermissionDenied, message);
        err.rule = Some(rule);
        err
    }

    pub fn not_found(entity: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found", entity))
    }

    pub fn invalid_transition(from: TaskStatus, to: TaskStatus) -> Self {
        Self::new(
            ErrorCode::InvalidTransition,
            format!(
                "Cannot transition task from {} to {}",
                from.as_str(),
                to.as_str()
            ),
        )
    }

    pub fn already_confirmed() -> Self {
        Self::new(
            ErrorCode::AlreadyConfirmed,
            "Task completion is already confirmed",
        )
    }

    pub fn duplicate_invite(email: &str) -> Self {
        Self::new(
            ErrorCode::DuplicateInvite,
            format!("{} already has a pending invite to this workflow", email),
        )
    }

    pub fn already_member(email: &str) -> Self {
        Self::new(
            ErrorCode::AlreadyMember,
            format!("{} is already a member of this workflow", email),
        )
    }

    pub fn validation(field: &str, reason: &str) -> Self {
        let mut err = Self::new(ErrorCode::ValidationError, reason);
        err.field = Some(field.to_string());
        err
    }

    pub fn database(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

// Allow using ? on anyhow errors from the storage layer.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api_err) => api_err,
            Err(err) => ApiError::database(err),
        }
    }
}

/// Result type for service operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_carries_rule() {
        let err = ApiError::permission_denied(PermissionRule::CanAssignTo, "no");
        assert_eq!(err.code, ErrorCode::PermissionDenied);
        assert_eq!(err.rule, Some(PermissionRule::CanAssignTo));
    }

    #[test]
    fn validation_carries_field() {
        let err = ApiError::validation("title", "title is required");
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.field.as_deref(), Some("title"));
    }

    #[test]
    fn serializes_rule_in_camel_case() {
        let err = ApiError::permission_denied(PermissionRule::CanAssignTo, "no");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["rule"], "canAssignTo");
        assert_eq!(json["code"], "PERMISSION_DENIED");
    }

    #[test]
    fn anyhow_downcast_preserves_api_error() {
        let inner = ApiError::already_confirmed();
        let any: anyhow::Error = inner.into();
        let back: ApiError = any.into();
        assert_eq!(back.code, ErrorCode::AlreadyConfirmed);
    }
}
