//! Route guards. An authentication layer inserts [`Auth`] into the request
//! extensions; a [`Guard`] mounted with [`enforce`] then allows the request
//! through or renders the failure.
//!
//! ```ignore
//! let guard = Guard::permissions(authz.clone(), "publish|edit");
//! let router = Router::new()
//!     .route("/articles/publish", post(publish))
//!     .route_layer(from_fn_with_state(guard, enforce::<User>));
//! ```

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::{error, info, warn};

use crate::capability::{Capabilities, Subject};
use crate::error::{AuthzError, AuthzResult, Forbidden};
use crate::gate::Authz;
use crate::response::{negotiate, render};

/// Outcome of authentication for one request. Its presence in the request
/// extensions is what tells guards that authentication ran at all.
#[derive(Clone, Debug)]
pub struct Auth<S> {
    user: Option<S>,
}

impl<S> Auth<S> {
    pub fn authenticated(user: S) -> Self {
        Self { user: Some(user) }
    }

    pub fn guest() -> Self {
        Self { user: None }
    }

    pub fn user(&self) -> Option<&S> {
        self.user.as_ref()
    }
}

/// A list of role or permission names, written either as `"a|b"` or as an
/// explicit list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Flag(Vec<String>);

impl Flag {
    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for Flag {
    fn from(value: &str) -> Self {
        Self(
            value
                .split('|')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }
}

impl From<String> for Flag {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Vec<String>> for Flag {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl From<Vec<&str>> for Flag {
    fn from(value: Vec<&str>) -> Self {
        Self::from(value.as_slice())
    }
}

impl From<&[&str]> for Flag {
    fn from(value: &[&str]) -> Self {
        Self(value.iter().map(|name| (*name).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Flag {
    fn from(value: [&str; N]) -> Self {
        Self::from(value.as_slice())
    }
}

/// What a guarded route demands of the subject.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    /// Any one of the permissions, directly or through a role.
    Permissions(Flag),
    /// Any one of the roles.
    Roles(Flag),
    /// Any one name, held either as a permission or as a role.
    RoleOrPermission(Flag),
}

impl Requirement {
    pub fn names(&self) -> &[String] {
        match self {
            Requirement::Permissions(flag)
            | Requirement::Roles(flag)
            | Requirement::RoleOrPermission(flag) => flag.names(),
        }
    }

    fn required_capability(&self) -> &'static str {
        match self {
            Requirement::Permissions(_) => "HasPermissions",
            Requirement::Roles(_) => "HasRoles",
            Requirement::RoleOrPermission(_) => "Authorizable",
        }
    }

    fn denial(&self) -> Forbidden {
        let names = self.names().to_vec();
        match self {
            Requirement::Permissions(_) => Forbidden::for_permissions(names),
            Requirement::Roles(_) => Forbidden::for_roles(names),
            Requirement::RoleOrPermission(_) => Forbidden::for_roles_or_permissions(names),
        }
    }
}

/// Middleware state: the requirement plus what is needed to check it.
#[derive(Clone, Debug)]
pub struct Guard {
    authz: Authz,
    requirement: Requirement,
    redirect_back: bool,
}

impl Guard {
    pub fn new(authz: Authz, requirement: Requirement) -> Self {
        Self {
            authz,
            requirement,
            redirect_back: false,
        }
    }

    pub fn permissions(authz: Authz, permissions: impl Into<Flag>) -> Self {
        Self::new(authz, Requirement::Permissions(permissions.into()))
    }

    pub fn roles(authz: Authz, roles: impl Into<Flag>) -> Self {
        Self::new(authz, Requirement::Roles(roles.into()))
    }

    pub fn role_or_permission(authz: Authz, names: impl Into<Flag>) -> Self {
        Self::new(authz, Requirement::RoleOrPermission(names.into()))
    }

    /// HTML failures redirect to the Referer (or `/`) instead of rendering
    /// a page.
    pub fn redirect_back(mut self, enabled: bool) -> Self {
        self.redirect_back = enabled;
        self
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Decides one request. `auth` is whatever the authentication layer left
    /// in the request; `None` means no such layer ran.
    pub async fn authorize<S: Subject>(&self, auth: Option<&Auth<S>>) -> AuthzResult<()> {
        let Some(auth) = auth else {
            warn!("no authentication result on the request; is the authentication layer mounted?");
            return Err(AuthzError::MisconfiguredMiddleware);
        };
        let Some(user) = auth.user() else {
            return Err(AuthzError::NotAuthenticated);
        };

        let gate = self.authz.gate();
        let names = self.requirement.names();
        let allowed = match (&self.requirement, user.capabilities()) {
            (Requirement::Permissions(_), Capabilities::Authorizable(subject)) => {
                gate.authorizable(subject).can_any_permission(names).await?
            }
            (Requirement::Permissions(_), Capabilities::Permissions(subject)) => {
                gate.permissions(subject).has_any_permission(names).await?
            }
            (Requirement::Roles(_), Capabilities::Authorizable(subject)) => {
                gate.roles(subject).has_any_role(names).await?
            }
            (Requirement::Roles(_), Capabilities::Roles(subject)) => {
                gate.roles(subject).has_any_role(names).await?
            }
            (Requirement::RoleOrPermission(_), Capabilities::Authorizable(subject)) => {
                let resolver = gate.authorizable(subject);
                resolver.can_any_permission(names).await?
                    || resolver.roles().has_any_role(names).await?
            }
            (requirement, capabilities) => {
                warn!(
                    subject = user.type_name(),
                    capabilities = capabilities.kind(),
                    "subject cannot be checked by this guard"
                );
                return Err(AuthzError::MissingCapability {
                    type_name: user.type_name(),
                    required: requirement.required_capability(),
                });
            }
        };

        if allowed {
            Ok(())
        } else {
            info!(required = ?names, subject = user.type_name(), "access denied");
            Err(self.requirement.denial().into())
        }
    }

    fn reject(&self, err: &AuthzError, headers: &HeaderMap) -> Response {
        if let AuthzError::Database(db_err) = err {
            error!(error = %db_err, "authorization query failed");
        }
        let back = self.redirect_back.then(|| {
            headers
                .get(header::REFERER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("/")
        });
        render(err, negotiate(headers), back)
    }
}

/// Axum middleware running a [`Guard`] for subjects of type `S`. Mount with
/// `from_fn_with_state(guard, enforce::<S>)`.
pub async fn enforce<S>(State(guard): State<Guard>, request: Request, next: Next) -> Response
where
    S: Subject + Clone + 'static,
{
    let auth = request.extensions().get::<Auth<S>>().cloned();
    match guard.authorize(auth.as_ref()).await {
        Ok(()) => next.run(request).await,
        Err(err) => guard.reject(&err, request.headers()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_delimited_flags_are_split_and_trimmed() {
        let flag = Flag::from("publish | edit||");
        assert_eq!(flag.names(), ["publish", "edit"]);
    }

    #[test]
    fn list_flags_are_taken_verbatim() {
        assert_eq!(Flag::from(["admin", "editor"]).names(), ["admin", "editor"]);
        assert_eq!(
            Flag::from(vec!["a|b".to_string()]).names(),
            ["a|b"],
        );
    }

    #[test]
    fn denials_carry_the_required_names() {
        let requirement = Requirement::Permissions(Flag::from("publish|edit"));
        let denial = requirement.denial();
        assert_eq!(denial.required_permissions, ["publish", "edit"]);
        assert!(denial.required_roles.is_empty());

        let requirement = Requirement::RoleOrPermission(Flag::from("admin"));
        let denial = requirement.denial();
        assert_eq!(denial.required_permissions, ["admin"]);
        assert_eq!(denial.required_roles, ["admin"]);
    }
}
