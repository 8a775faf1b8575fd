use std::sync::Arc;

use entity::{permissions, roles};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tracing::instrument;

use crate::authorizable::AuthorizableResolver;
use crate::capability::{Authorizable, HasPermissions, HasRoles};
use crate::config::PermissionsConfig;
use crate::error::AuthzResult;
use crate::permissions::PermissionResolver;
use crate::relation::{fetch_or_create_many, find_by_names};
use crate::roles::RoleResolver;
use crate::target::Target;

/// Owned handle kept in application state.
#[derive(Clone, Debug)]
pub struct Authz {
    db: DatabaseConnection,
    config: Arc<PermissionsConfig>,
}

impl Authz {
    pub fn new(db: DatabaseConnection, config: PermissionsConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PermissionsConfig {
        &self.config
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn gate(&self) -> Gate<'_, DatabaseConnection> {
        Gate::new(&self.db, &self.config)
    }
}

/// Borrowed connection plus config. Works with any `ConnectionTrait`, so a
/// caller needing atomic grant/revoke sequences can hand in a transaction.
pub struct Gate<'a, C> {
    db: &'a C,
    config: &'a PermissionsConfig,
}

impl<C> Clone for Gate<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Gate<'_, C> {}

impl<'a, C: ConnectionTrait> Gate<'a, C> {
    pub fn new(db: &'a C, config: &'a PermissionsConfig) -> Self {
        Self { db, config }
    }

    pub fn permissions<M>(&self, owner: &'a M) -> PermissionResolver<'a, C, M>
    where
        M: HasPermissions + ?Sized,
    {
        PermissionResolver::new(self.db, self.config, owner)
    }

    pub fn roles<M>(&self, owner: &'a M) -> RoleResolver<'a, C, M>
    where
        M: HasRoles + ?Sized,
    {
        RoleResolver::new(self.db, self.config, owner)
    }

    pub fn authorizable<M>(&self, owner: &'a M) -> AuthorizableResolver<'a, C, M>
    where
        M: Authorizable + ?Sized,
    {
        AuthorizableResolver::new(self.db, self.config, owner)
    }

    pub async fn find_permission(&self, name: impl Target) -> AuthzResult<Option<permissions::Model>> {
        let rows = find_by_names(
            self.db,
            &self.config.table_names.permissions,
            &[name.target_name()],
        )
        .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn find_role(&self, name: impl Target) -> AuthzResult<Option<roles::Model>> {
        let rows = find_by_names(self.db, &self.config.table_names.roles, &[name.target_name()])
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Fetches the permission named `name`, creating it when absent.
    #[instrument(name = "authz.create_permission", skip_all)]
    pub async fn create_permission(&self, name: impl Target) -> AuthzResult<permissions::Model> {
        let names = [name.target_name().to_owned()];
        let rows: Vec<permissions::Model> =
            fetch_or_create_many(self.db, &self.config.table_names.permissions, &names).await?;
        single(rows, &self.config.table_names.permissions, &names[0])
    }

    /// Fetches the role named `name`, creating it when absent.
    #[instrument(name = "authz.create_role", skip_all)]
    pub async fn create_role(&self, name: impl Target) -> AuthzResult<roles::Model> {
        let names = [name.target_name().to_owned()];
        let rows: Vec<roles::Model> =
            fetch_or_create_many(self.db, &self.config.table_names.roles, &names).await?;
        single(rows, &self.config.table_names.roles, &names[0])
    }
}

fn single<M>(rows: Vec<M>, table: &str, name: &str) -> AuthzResult<M> {
    rows.into_iter().next().ok_or_else(|| {
        sea_orm::DbErr::RecordNotFound(format!("{table}.name = {name} after insert")).into()
    })
}
