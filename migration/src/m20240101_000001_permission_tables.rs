use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
pub(crate) enum Catalog {
    Id,
    Name,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden, Clone, Copy)]
pub(crate) enum Pivot {
    ModelId,
    RoleId,
    PermissionId,
}

/// Creates the role and permission catalogs plus the role to permission
/// pivot. Table names follow the permissions config; the defaults match the
/// `entity` crate.
#[derive(Clone, Debug)]
pub struct PermissionTables {
    pub roles: String,
    pub permissions: String,
    pub role_has_permissions: String,
}

impl Default for PermissionTables {
    fn default() -> Self {
        Self {
            roles: "roles".into(),
            permissions: "permissions".into(),
            role_has_permissions: "role_has_permissions".into(),
        }
    }
}

impl PermissionTables {
    pub(crate) fn catalog_table(name: &str) -> TableCreateStatement {
        Table::create()
            .table(Alias::new(name))
            .if_not_exists()
            .col(
                ColumnDef::new(Catalog::Id)
                    .integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(Catalog::Name).string().not_null().unique_key())
            .col(
                ColumnDef::new(Catalog::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(ColumnDef::new(Catalog::UpdatedAt).timestamp_with_time_zone().null())
            .to_owned()
    }

    pub(crate) fn role_permissions_table(&self) -> TableCreateStatement {
        let pivot = Alias::new(&self.role_has_permissions);
        Table::create()
            .table(pivot.clone())
            .if_not_exists()
            .col(ColumnDef::new(Pivot::ModelId).integer().not_null())
            .col(ColumnDef::new(Pivot::PermissionId).integer().not_null())
            .primary_key(Index::create().col(Pivot::ModelId).col(Pivot::PermissionId))
            .foreign_key(
                ForeignKey::create()
                    .name(format!("fk_{}_role", self.role_has_permissions))
                    .from(pivot.clone(), Pivot::ModelId)
                    .to(Alias::new(&self.roles), Catalog::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name(format!("fk_{}_permission", self.role_has_permissions))
                    .from(pivot, Pivot::PermissionId)
                    .to(Alias::new(&self.permissions), Catalog::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .to_owned()
    }
}

impl MigrationName for PermissionTables {
    fn name(&self) -> &str {
        "m20240101_000001_create_permission_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for PermissionTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(Self::catalog_table(&self.roles))
            .await?;
        manager
            .create_table(Self::catalog_table(&self.permissions))
            .await?;
        manager.create_table(self.role_permissions_table()).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [&self.role_has_permissions, &self.permissions, &self.roles] {
            manager
                .drop_table(Table::drop().table(Alias::new(table)).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}
