//! Role and permission resolution for sea-orm models.
//!
//! A model opts in by implementing the capability traits in [`capability`];
//! checks then go through a [`Gate`] (borrowed connection) or the owned
//! [`Authz`] handle:
//!
//! ```ignore
//! let authz = Authz::new(db, PermissionsConfig::from_env());
//! let gate = authz.gate();
//! gate.permissions(&user).give_permission_to(["publish"]).await?;
//! gate.roles(&user).assign_role(["editor"]).await?;
//! assert!(gate.authorizable(&user).with_permission_to("publish").await?);
//! ```
//!
//! HTTP routes are protected with the guards in [`middleware`].

mod authorizable;
pub mod capability;
pub mod config;
pub mod error;
mod gate;
pub mod middleware;
mod permissions;
mod relation;
pub mod response;
mod roles;
pub mod target;

pub use authorizable::AuthorizableResolver;
pub use capability::{Authorizable, Capabilities, HasPermissions, HasRoles, PivotOwner, Subject};
pub use config::{AuthorizableConfig, ColumnNames, PermissionsConfig, TableNames};
pub use error::{AuthzError, AuthzResult, Forbidden};
pub use gate::{Authz, Gate};
pub use middleware::{Auth, Flag, Guard, Requirement, enforce};
pub use permissions::PermissionResolver;
pub use relation::CatalogRow;
pub use roles::RoleResolver;
pub use target::Target;
