use std::collections::HashSet;

use entity::permissions;
use sea_orm::sea_query::{Alias, Expr, Order, Query, SelectStatement};
use sea_orm::{ConnectionTrait, FromQueryResult};
use tracing::debug;

use crate::capability::Authorizable;
use crate::config::PermissionsConfig;
use crate::error::AuthzResult;
use crate::permissions::PermissionResolver;
use crate::relation::{CATALOG_COLUMNS, ID, NAME};
use crate::roles::RoleResolver;
use crate::target::Target;

/// Permission checks for subjects holding both direct permissions and roles.
pub struct AuthorizableResolver<'a, C, M: ?Sized> {
    db: &'a C,
    config: &'a PermissionsConfig,
    owner: &'a M,
    permissions: PermissionResolver<'a, C, M>,
    roles: RoleResolver<'a, C, M>,
}

impl<'a, C, M> AuthorizableResolver<'a, C, M>
where
    C: ConnectionTrait,
    M: Authorizable + ?Sized,
{
    pub(crate) fn new(db: &'a C, config: &'a PermissionsConfig, owner: &'a M) -> Self {
        Self {
            db,
            config,
            owner,
            permissions: PermissionResolver::new(db, config, owner),
            roles: RoleResolver::new(db, config, owner),
        }
    }

    /// The subject's direct-permission operations.
    pub fn permissions(&self) -> &PermissionResolver<'a, C, M> {
        &self.permissions
    }

    /// The subject's role operations.
    pub fn roles(&self) -> &RoleResolver<'a, C, M> {
        &self.roles
    }

    pub async fn has_direct_permission(&self, permission: impl Target) -> AuthzResult<bool> {
        self.permissions.has_permission_to(permission).await
    }

    /// Single existence query across subject -> role -> permission.
    pub async fn has_permission_via_role(&self, permission: impl Target) -> AuthzResult<bool> {
        let mut select = self.role_permissions_join();
        select
            .expr(Expr::val(1))
            .and_where(
                Expr::col((
                    Alias::new(&self.config.table_names.permissions),
                    Alias::new(NAME),
                ))
                .eq(permission.target_name()),
            )
            .limit(1);
        let row = self
            .db
            .query_one(self.db.get_database_backend().build(&select))
            .await?;
        Ok(row.is_some())
    }

    /// Held directly or through any assigned role.
    pub async fn with_permission_to(&self, permission: impl Target) -> AuthzResult<bool> {
        let name = permission.target_name();
        if self.has_direct_permission(name).await? {
            return Ok(true);
        }
        self.has_permission_via_role(name).await
    }

    /// True as soon as one permission passes [`Self::with_permission_to`].
    /// An empty list never matches.
    pub async fn can_any_permission<I>(&self, permissions: I) -> AuthzResult<bool>
    where
        I: IntoIterator,
        I::Item: Target,
    {
        for permission in permissions {
            if self.with_permission_to(permission.target_name()).await? {
                debug!(permission = permission.target_name(), "permission granted");
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn get_direct_permissions(&self) -> AuthzResult<Vec<permissions::Model>> {
        self.permissions.permissions().await
    }

    /// Every permission of every assigned role. A permission shared by two
    /// roles appears twice.
    pub async fn get_permissions_via_roles(&self) -> AuthzResult<Vec<permissions::Model>> {
        let permissions = Alias::new(&self.config.table_names.permissions);
        let mut select = self.role_permissions_join();
        select
            .columns(
                CATALOG_COLUMNS
                    .iter()
                    .map(|column| (permissions.clone(), Alias::new(*column))),
            )
            .order_by(
                (
                    Alias::new(self.owner.roles_pivot(self.config)),
                    Alias::new(&self.config.column_names.role_pivot_key),
                ),
                Order::Asc,
            )
            .order_by((permissions, Alias::new(ID)), Order::Asc);
        let statement = self.db.get_database_backend().build(&select);
        Ok(permissions::Model::find_by_statement(statement)
            .all(self.db)
            .await?)
    }

    /// Direct permissions followed by role permissions, duplicates kept.
    pub async fn get_all_permissions(&self) -> AuthzResult<Vec<permissions::Model>> {
        let mut all = self.get_direct_permissions().await?;
        all.extend(self.get_permissions_via_roles().await?);
        Ok(all)
    }

    /// The effective permission set: [`Self::get_all_permissions`] with
    /// repeats removed by id, first occurrence kept.
    pub async fn effective_permissions(&self) -> AuthzResult<Vec<permissions::Model>> {
        let mut seen = HashSet::new();
        let mut all = self.get_all_permissions().await?;
        all.retain(|permission| seen.insert(permission.id));
        Ok(all)
    }

    /// `roles_pivot` joined to the role permissions and the permission
    /// catalog, restricted to this subject. Callers add the projection.
    fn role_permissions_join(&self) -> SelectStatement {
        let tables = &self.config.table_names;
        let columns = &self.config.column_names;
        let roles_pivot = Alias::new(self.owner.roles_pivot(self.config));
        let role_permissions = Alias::new(&tables.role_has_permissions);
        let permissions = Alias::new(&tables.permissions);
        Query::select()
            .from(roles_pivot.clone())
            .inner_join(
                role_permissions.clone(),
                Expr::col((role_permissions.clone(), Alias::new(&columns.model_morph_key)))
                    .equals((roles_pivot.clone(), Alias::new(&columns.role_pivot_key))),
            )
            .inner_join(
                permissions.clone(),
                Expr::col((permissions, Alias::new(ID))).equals((
                    role_permissions,
                    Alias::new(&columns.permission_pivot_key),
                )),
            )
            .and_where(
                Expr::col((roles_pivot, Alias::new(&columns.model_morph_key)))
                    .eq(self.owner.model_key()),
            )
            .to_owned()
    }
}
