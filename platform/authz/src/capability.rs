//! Capability traits a model implements to take part in role and permission
//! resolution.

use entity::roles;
use sea_orm::Value;

use crate::config::PermissionsConfig;

/// A row that can sit on the model side of a pivot table.
pub trait PivotOwner: Send + Sync {
    /// Value stored in the pivot's model key column.
    fn model_key(&self) -> Value;
}

/// Models holding direct permissions.
pub trait HasPermissions: PivotOwner {
    fn permissions_pivot<'a>(&'a self, config: &'a PermissionsConfig) -> &'a str;
}

/// Models holding roles.
pub trait HasRoles: PivotOwner {
    fn roles_pivot<'a>(&'a self, config: &'a PermissionsConfig) -> &'a str;
}

/// Models resolving permissions both directly and through their roles.
pub trait Authorizable: HasPermissions + HasRoles {}

impl PivotOwner for roles::Model {
    fn model_key(&self) -> Value {
        self.id.into()
    }
}

impl HasPermissions for roles::Model {
    fn permissions_pivot<'a>(&'a self, config: &'a PermissionsConfig) -> &'a str {
        &config.table_names.role_has_permissions
    }
}

/// What an authenticated subject can be checked against. Guards match on
/// this instead of probing for methods.
#[derive(Clone, Copy)]
pub enum Capabilities<'a> {
    None,
    Permissions(&'a dyn HasPermissions),
    Roles(&'a dyn HasRoles),
    Authorizable(&'a dyn Authorizable),
}

impl Capabilities<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Capabilities::None => "none",
            Capabilities::Permissions(_) => "HasPermissions",
            Capabilities::Roles(_) => "HasRoles",
            Capabilities::Authorizable(_) => "Authorizable",
        }
    }
}

/// An authenticated principal as seen by the guards.
pub trait Subject: Send + Sync {
    fn capabilities(&self) -> Capabilities<'_>;

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
