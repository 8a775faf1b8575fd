use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions};
use platform_authz::{AuthzError, Forbidden, error::UNAUTHORIZED_ACCESS};
use thiserror::Error;

/// Shared GraphQL result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("User is not logged in")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(Forbidden),
    #[error("resource not found")]
    NotFound,
    #[error("bad request: {0}")]
    InvalidInput(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated | ApiError::Forbidden(_) => UNAUTHORIZED_ACCESS,
            ApiError::NotFound => "NOT_FOUND",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl From<AuthzError> for ApiError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::NotAuthenticated => ApiError::Unauthenticated,
            AuthzError::Forbidden(forbidden) => ApiError::Forbidden(forbidden),
            other => {
                tracing::error!(error = %other, code = other.code(), "authorization failed");
                ApiError::internal(other.into())
            }
        }
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        let mut err = Error::new(self.to_string());
        err = err.extend_with(|_err, e| {
            e.set("code", self.code());
        });
        match self {
            ApiError::Forbidden(forbidden) => {
                err = err.extend_with(|_err, e| {
                    if !forbidden.required_permissions.is_empty() {
                        e.set("requiredPermissions", forbidden.required_permissions.clone());
                    }
                    if !forbidden.required_roles.is_empty() {
                        e.set("requiredRoles", forbidden.required_roles.clone());
                    }
                });
            }
            ApiError::InvalidInput(_) => {
                err = err.extend_with(|_err, e| {
                    e.set("type", "BAD_REQUEST");
                });
            }
            _ => {}
        }
        err
    }
}

/// Convert any error into a GraphQL error payload while hiding internals.
pub fn internal_error(err: impl Into<anyhow::Error>) -> Error {
    ApiError::internal(err.into()).extend()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::Value;

    fn extension(err: &Error, key: &str) -> Option<Value> {
        err.extensions.as_ref().and_then(|map| map.get(key)).cloned()
    }

    #[test]
    fn internal_errors_are_masked() {
        let err = internal_error(anyhow::anyhow!("boom"));
        assert_eq!(err.message, "internal server error");
        assert_eq!(extension(&err, "code"), Some(Value::from("INTERNAL")));
    }

    #[test]
    fn forbidden_exposes_required_names() {
        let denied = AuthzError::from(Forbidden::for_roles(vec!["admin".into()]));
        let err = ApiError::from(denied).extend();
        assert_eq!(err.message, "User does not have the right roles");
        assert_eq!(
            extension(&err, "code"),
            Some(Value::from("E_PERMISSION_UNAUTHORIZED_ACCESS"))
        );
        assert_eq!(
            extension(&err, "requiredRoles"),
            Some(Value::List(vec![Value::from("admin")]))
        );
        assert_eq!(extension(&err, "requiredPermissions"), None);
    }

    #[test]
    fn wiring_errors_become_internal() {
        let err = ApiError::from(AuthzError::MisconfiguredMiddleware).extend();
        assert_eq!(err.message, "internal server error");
    }
}
