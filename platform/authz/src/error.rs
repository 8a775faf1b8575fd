use std::fmt;

use axum::http::StatusCode;
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;

pub type AuthzResult<T> = Result<T, AuthzError>;

/// Code shared by every "you may not do this" failure.
pub const UNAUTHORIZED_ACCESS: &str = "E_PERMISSION_UNAUTHORIZED_ACCESS";

#[derive(Debug, Error)]
pub enum AuthzError {
    /// The request carries no authentication result at all: the guard was
    /// mounted without the authentication layer in front of it.
    #[error("authentication is not available on this request; mount the authentication layer before authorization guards")]
    MisconfiguredMiddleware,
    #[error("User is not logged in")]
    NotAuthenticated,
    #[error("Authorizable type '{type_name}' must implement {required}")]
    MissingCapability {
        type_name: &'static str,
        required: &'static str,
    },
    #[error("{0}")]
    Forbidden(Forbidden),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// The subject lacks what a check required. Carries the exact names so
/// clients can display or translate them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Forbidden {
    pub message: String,
    pub required_permissions: Vec<String>,
    pub required_roles: Vec<String>,
}

impl Forbidden {
    pub fn for_permission(permission: &str) -> Self {
        Self {
            message: format!("User does not have permission to {permission}"),
            required_permissions: vec![permission.to_string()],
            required_roles: Vec::new(),
        }
    }

    pub fn for_permissions(permissions: Vec<String>) -> Self {
        Self {
            message: "User does not have the right permissions".into(),
            required_permissions: permissions,
            required_roles: Vec::new(),
        }
    }

    pub fn for_roles(roles: Vec<String>) -> Self {
        Self {
            message: "User does not have the right roles".into(),
            required_permissions: Vec::new(),
            required_roles: roles,
        }
    }

    pub fn for_roles_or_permissions(names: Vec<String>) -> Self {
        Self {
            message: "User does not have any of the necessary access rights".into(),
            required_permissions: names.clone(),
            required_roles: names,
        }
    }
}

impl fmt::Display for Forbidden {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<Forbidden> for AuthzError {
    fn from(value: Forbidden) -> Self {
        Self::Forbidden(value)
    }
}

impl AuthzError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthzError::NotAuthenticated | AuthzError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthzError::MisconfiguredMiddleware
            | AuthzError::MissingCapability { .. }
            | AuthzError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthzError::NotAuthenticated | AuthzError::Forbidden(_) => UNAUTHORIZED_ACCESS,
            AuthzError::MissingCapability { .. } => "E_MISSING_CAPABILITY",
            AuthzError::MisconfiguredMiddleware => "E_MISCONFIGURED_MIDDLEWARE",
            AuthzError::Database(_) => "E_DATABASE",
        }
    }

    /// Message safe to show to the caller. Database details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AuthzError::Database(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn forbidden(&self) -> Option<&Forbidden> {
        match self {
            AuthzError::Forbidden(forbidden) => Some(forbidden),
            _ => None,
        }
    }

    pub fn required_permissions(&self) -> &[String] {
        self.forbidden()
            .map(|f| f.required_permissions.as_slice())
            .unwrap_or_default()
    }

    pub fn required_roles(&self) -> &[String] {
        self.forbidden()
            .map(|f| f.required_roles.as_slice())
            .unwrap_or_default()
    }
}
