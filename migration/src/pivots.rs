use sea_orm_migration::prelude::*;

use crate::m20240101_000001_permission_tables::{Catalog, PermissionTables, Pivot};

/// Column type of the authorizable model's primary key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModelKey {
    #[default]
    Integer,
    BigInteger,
    Uuid,
}

/// Creates the `<model>_has_permissions` and `<model>_has_roles` pivots that
/// attach roles and permissions to an authorizable model.
#[derive(Clone, Debug)]
pub struct AuthorizablePivots {
    name: String,
    pub model_table: String,
    pub permissions_pivot: String,
    pub roles_pivot: String,
    pub model_key: ModelKey,
    pub catalog: PermissionTables,
}

impl AuthorizablePivots {
    pub fn for_model(model: &str, model_table: &str) -> Self {
        let model = model.to_lowercase();
        Self {
            name: format!("create_{model}_permission_pivots"),
            model_table: model_table.to_string(),
            permissions_pivot: format!("{model}_has_permissions"),
            roles_pivot: format!("{model}_has_roles"),
            model_key: ModelKey::default(),
            catalog: PermissionTables::default(),
        }
    }

    /// Overrides the migration name recorded in `seaql_migrations`.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_permissions_pivot(mut self, table: impl Into<String>) -> Self {
        self.permissions_pivot = table.into().to_lowercase();
        self
    }

    pub fn with_roles_pivot(mut self, table: impl Into<String>) -> Self {
        self.roles_pivot = table.into().to_lowercase();
        self
    }

    pub fn with_model_key(mut self, key: ModelKey) -> Self {
        self.model_key = key;
        self
    }

    pub fn with_catalog(mut self, catalog: PermissionTables) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn statements(&self) -> [TableCreateStatement; 2] {
        [
            self.pivot_table(&self.permissions_pivot, Pivot::PermissionId, &self.catalog.permissions),
            self.pivot_table(&self.roles_pivot, Pivot::RoleId, &self.catalog.roles),
        ]
    }

    fn pivot_table(&self, pivot: &str, related_key: Pivot, related_table: &str) -> TableCreateStatement {
        let mut model_id = ColumnDef::new(Pivot::ModelId);
        match self.model_key {
            ModelKey::Integer => model_id.integer(),
            ModelKey::BigInteger => model_id.big_integer(),
            ModelKey::Uuid => model_id.uuid(),
        };
        let table = Alias::new(pivot);
        Table::create()
            .table(table.clone())
            .if_not_exists()
            .col(model_id.not_null())
            .col(ColumnDef::new(related_key).integer().not_null())
            .primary_key(Index::create().col(Pivot::ModelId).col(related_key))
            .foreign_key(
                ForeignKey::create()
                    .name(format!("fk_{pivot}_model"))
                    .from(table.clone(), Pivot::ModelId)
                    .to(Alias::new(&self.model_table), Catalog::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .foreign_key(
                ForeignKey::create()
                    .name(format!("fk_{pivot}_related"))
                    .from(table, related_key)
                    .to(Alias::new(related_table), Catalog::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .to_owned()
    }
}

impl MigrationName for AuthorizablePivots {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait::async_trait]
impl MigrationTrait for AuthorizablePivots {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for statement in self.statements() {
            manager.create_table(statement).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [&self.roles_pivot, &self.permissions_pivot] {
            manager
                .drop_table(Table::drop().table(Alias::new(table)).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}

/// Renders the PostgreSQL DDL for a model's pivot tables, for projects that
/// keep hand-written migrations.
pub fn pivot_table_sql(pivots: &AuthorizablePivots) -> String {
    pivots
        .statements()
        .iter()
        .map(|statement| format!("{};", statement.to_string(PostgresQueryBuilder)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pivot_names_default_to_model_name() {
        let pivots = AuthorizablePivots::for_model("User", "users");
        assert_eq!(pivots.permissions_pivot, "user_has_permissions");
        assert_eq!(pivots.roles_pivot, "user_has_roles");
        assert_eq!(pivots.name(), "create_user_permission_pivots");
    }

    #[test]
    fn sql_references_configured_tables() {
        let pivots = AuthorizablePivots::for_model("account", "accounts")
            .with_roles_pivot("Account_Roles")
            .with_model_key(ModelKey::Uuid);
        let sql = pivot_table_sql(&pivots);
        assert!(sql.contains(r#"CREATE TABLE IF NOT EXISTS "account_has_permissions""#));
        assert!(sql.contains(r#"CREATE TABLE IF NOT EXISTS "account_roles""#));
        assert!(sql.contains(r#"REFERENCES "accounts" ("id")"#));
        assert!(sql.contains(r#""model_id" uuid NOT NULL"#));
    }
}
