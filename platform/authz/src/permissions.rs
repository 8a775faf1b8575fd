use entity::permissions;
use sea_orm::ConnectionTrait;
use tracing::{Span, debug, field, instrument};

use crate::capability::HasPermissions;
use crate::config::PermissionsConfig;
use crate::error::{AuthzResult, Forbidden};
use crate::relation::{ManyToMany, fetch_or_create_ids, find_ids};
use crate::target::{Target, target_names};

/// Direct permissions of one owner: a subject or a role.
pub struct PermissionResolver<'a, C, M: ?Sized> {
    db: &'a C,
    config: &'a PermissionsConfig,
    owner: &'a M,
}

impl<'a, C, M> PermissionResolver<'a, C, M>
where
    C: ConnectionTrait,
    M: HasPermissions + ?Sized,
{
    pub(crate) fn new(db: &'a C, config: &'a PermissionsConfig, owner: &'a M) -> Self {
        Self { db, config, owner }
    }

    pub(crate) fn relation(&self) -> ManyToMany<'a> {
        ManyToMany {
            pivot: self.owner.permissions_pivot(self.config),
            owner_key: &self.config.column_names.model_morph_key,
            related_key: &self.config.column_names.permission_pivot_key,
            related_table: &self.config.table_names.permissions,
            owner: self.owner.model_key(),
        }
    }

    pub async fn has_permission_to(&self, permission: impl Target) -> AuthzResult<bool> {
        let found: Option<permissions::Model> = self
            .relation()
            .first_named(self.db, permission.target_name())
            .await?;
        Ok(found.is_some())
    }

    /// Like [`Self::has_permission_to`], but a miss is an error naming the
    /// permission.
    pub async fn check_permission_to(&self, permission: impl Target) -> AuthzResult<bool> {
        if self.has_permission_to(permission.target_name()).await? {
            return Ok(true);
        }
        Err(Forbidden::for_permission(permission.target_name()).into())
    }

    /// Loads the direct set once, then stops at the first match. An empty
    /// list is never satisfied.
    pub async fn has_any_permission<I>(&self, permissions: I) -> AuthzResult<bool>
    where
        I: IntoIterator,
        I::Item: Target,
    {
        let wanted = target_names(permissions);
        let held = self.get_permission_names().await?;
        Ok(wanted.iter().any(|name| held.contains(name)))
    }

    /// Loads the direct set once, then stops at the first miss. An empty
    /// list is always satisfied.
    pub async fn has_all_permissions<I>(&self, permissions: I) -> AuthzResult<bool>
    where
        I: IntoIterator,
        I::Item: Target,
    {
        let wanted = target_names(permissions);
        let held = self.get_permission_names().await?;
        Ok(wanted.iter().all(|name| held.contains(name)))
    }

    /// Adds the permissions, creating any that do not exist. Grants already
    /// present are kept.
    #[instrument(
        name = "authz.give_permission_to",
        skip_all,
        fields(owner = ?self.owner.model_key(), permissions = field::Empty)
    )]
    pub async fn give_permission_to<I>(&self, permissions: I) -> AuthzResult<()>
    where
        I: IntoIterator,
        I::Item: Target,
    {
        let names = target_names(permissions);
        Span::current().record("permissions", field::debug(&names));
        let ids = self.fetch_or_create(names).await?;
        let inserted = self.relation().attach(self.db, &ids).await?;
        debug!(requested = ids.len(), inserted, "granted permissions");
        Ok(())
    }

    /// Replaces the direct set with exactly the given permissions.
    #[instrument(
        name = "authz.sync_permissions",
        skip_all,
        fields(owner = ?self.owner.model_key(), permissions = field::Empty)
    )]
    pub async fn sync_permissions<I>(&self, permissions: I) -> AuthzResult<()>
    where
        I: IntoIterator,
        I::Item: Target,
    {
        let names = target_names(permissions);
        Span::current().record("permissions", field::debug(&names));
        let ids = self.fetch_or_create(names).await?;
        self.relation().sync(self.db, &ids).await?;
        debug!(count = ids.len(), "synced permissions");
        Ok(())
    }

    /// Removes a direct grant. Unknown or ungranted permissions are a no-op.
    #[instrument(
        name = "authz.revoke_permission_to",
        skip_all,
        fields(owner = ?self.owner.model_key(), permission = permission.target_name())
    )]
    pub async fn revoke_permission_to(&self, permission: impl Target) -> AuthzResult<()> {
        let ids = find_ids::<permissions::Model, _>(
            self.db,
            &self.config.table_names.permissions,
            &[permission.target_name()],
        )
        .await?;
        let removed = self.relation().detach(self.db, &ids).await?;
        debug!(removed, "revoked permission");
        Ok(())
    }

    pub async fn get_permission_names(&self) -> AuthzResult<Vec<String>> {
        Ok(self.relation().names(self.db).await?)
    }

    /// Direct permission rows, freshly loaded.
    pub async fn permissions(&self) -> AuthzResult<Vec<permissions::Model>> {
        Ok(self.relation().all(self.db).await?)
    }

    async fn fetch_or_create(&self, names: Vec<String>) -> AuthzResult<Vec<i32>> {
        Ok(
            fetch_or_create_ids::<permissions::Model, _>(
                self.db,
                &self.config.table_names.permissions,
                &names,
            )
            .await?,
        )
    }
}
