use entity::roles;
use sea_orm::ConnectionTrait;
use tracing::{Span, debug, field, instrument};

use crate::capability::HasRoles;
use crate::config::PermissionsConfig;
use crate::error::AuthzResult;
use crate::relation::{ManyToMany, fetch_or_create_ids, find_ids};
use crate::target::{Target, target_names};

/// Roles assigned to one subject.
pub struct RoleResolver<'a, C, M: ?Sized> {
    db: &'a C,
    config: &'a PermissionsConfig,
    owner: &'a M,
}

impl<'a, C, M> RoleResolver<'a, C, M>
where
    C: ConnectionTrait,
    M: HasRoles + ?Sized,
{
    pub(crate) fn new(db: &'a C, config: &'a PermissionsConfig, owner: &'a M) -> Self {
        Self { db, config, owner }
    }

    pub(crate) fn relation(&self) -> ManyToMany<'a> {
        ManyToMany {
            pivot: self.owner.roles_pivot(self.config),
            owner_key: &self.config.column_names.model_morph_key,
            related_key: &self.config.column_names.role_pivot_key,
            related_table: &self.config.table_names.roles,
            owner: self.owner.model_key(),
        }
    }

    /// Assigns the roles, creating any that do not exist.
    #[instrument(
        name = "authz.assign_role",
        skip_all,
        fields(owner = ?self.owner.model_key(), roles = field::Empty)
    )]
    pub async fn assign_role<I>(&self, roles: I) -> AuthzResult<()>
    where
        I: IntoIterator,
        I::Item: Target,
    {
        let names = target_names(roles);
        Span::current().record("roles", field::debug(&names));
        let ids = self.fetch_or_create(names).await?;
        let inserted = self.relation().attach(self.db, &ids).await?;
        debug!(requested = ids.len(), inserted, "assigned roles");
        Ok(())
    }

    /// Replaces the subject's roles with exactly the given ones.
    #[instrument(
        name = "authz.sync_roles",
        skip_all,
        fields(owner = ?self.owner.model_key(), roles = field::Empty)
    )]
    pub async fn sync_roles<I>(&self, roles: I) -> AuthzResult<()>
    where
        I: IntoIterator,
        I::Item: Target,
    {
        let names = target_names(roles);
        Span::current().record("roles", field::debug(&names));
        let ids = self.fetch_or_create(names).await?;
        self.relation().sync(self.db, &ids).await?;
        debug!(count = ids.len(), "synced roles");
        Ok(())
    }

    /// Removes only this subject's link to the role; the role and its
    /// permissions are untouched.
    #[instrument(
        name = "authz.revoke_role",
        skip_all,
        fields(owner = ?self.owner.model_key(), role = role.target_name())
    )]
    pub async fn revoke_role(&self, role: impl Target) -> AuthzResult<()> {
        let ids = find_ids::<roles::Model, _>(
            self.db,
            &self.config.table_names.roles,
            &[role.target_name()],
        )
        .await?;
        let removed = self.relation().detach(self.db, &ids).await?;
        debug!(removed, "revoked role");
        Ok(())
    }

    pub async fn has_role(&self, role: impl Target) -> AuthzResult<bool> {
        let found: Option<roles::Model> = self
            .relation()
            .first_named(self.db, role.target_name())
            .await?;
        Ok(found.is_some())
    }

    /// True when any of the roles is assigned. An empty list never matches.
    pub async fn has_any_role<I>(&self, roles: I) -> AuthzResult<bool>
    where
        I: IntoIterator,
        I::Item: Target,
    {
        let wanted = target_names(roles);
        let held = self.get_role_names().await?;
        Ok(wanted.iter().any(|name| held.contains(name)))
    }

    /// True when every role is assigned. An empty list always matches.
    pub async fn has_all_roles<I>(&self, roles: I) -> AuthzResult<bool>
    where
        I: IntoIterator,
        I::Item: Target,
    {
        let wanted = target_names(roles);
        let held = self.get_role_names().await?;
        Ok(wanted.iter().all(|name| held.contains(name)))
    }

    pub async fn get_role_names(&self) -> AuthzResult<Vec<String>> {
        Ok(self.relation().names(self.db).await?)
    }

    /// Assigned role rows, freshly loaded.
    pub async fn roles(&self) -> AuthzResult<Vec<roles::Model>> {
        Ok(self.relation().all(self.db).await?)
    }

    async fn fetch_or_create(&self, names: Vec<String>) -> AuthzResult<Vec<i32>> {
        Ok(
            fetch_or_create_ids::<roles::Model, _>(self.db, &self.config.table_names.roles, &names)
                .await?,
        )
    }
}
