use std::marker::PhantomData;

pub use sea_orm_migration::prelude::*;

mod m20240101_000001_permission_tables;
mod m20240101_000002_users_and_sessions;
mod pivots;

pub use m20240101_000001_permission_tables::PermissionTables;
pub use pivots::{AuthorizablePivots, ModelKey, pivot_table_sql};

/// Supplies the role and permission table names a migrator creates.
pub trait CatalogTables {
    fn tables() -> PermissionTables;
}

/// The default `roles`, `permissions` and `role_has_permissions` tables.
pub struct DefaultTables;

impl CatalogTables for DefaultTables {
    fn tables() -> PermissionTables {
        PermissionTables::default()
    }
}

/// Migrator whose catalog and `user` pivots reference the tables named by `T`.
pub struct TableMigrator<T>(PhantomData<fn() -> T>);

pub type Migrator = TableMigrator<DefaultTables>;

#[async_trait::async_trait]
impl<T: CatalogTables> MigratorTrait for TableMigrator<T> {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        let catalog = T::tables();
        vec![
            Box::new(catalog.clone()),
            Box::new(m20240101_000002_users_and_sessions::Migration),
            Box::new(
                AuthorizablePivots::for_model("user", "users")
                    .with_catalog(catalog)
                    .named("m20240101_000003_create_user_permission_pivots"),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm_migration::sea_orm::{ConnectionTrait, Database, DatabaseBackend, Statement};

    #[tokio::test]
    async fn migrations_apply_and_roll_back_on_sqlite() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let manager = SchemaManager::new(&db);
        for table in [
            "roles",
            "permissions",
            "role_has_permissions",
            "users",
            "sessions",
            "user_has_roles",
            "user_has_permissions",
        ] {
            assert!(manager.has_table(table).await.unwrap(), "missing {table}");
        }

        db.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            "INSERT INTO permissions (name, created_at) VALUES ('edit', '2024-01-01T00:00:00Z')"
                .to_string(),
        ))
        .await
        .unwrap();
        let duplicate = db
            .execute(Statement::from_string(
                DatabaseBackend::Sqlite,
                "INSERT INTO permissions (name, created_at) VALUES ('edit', '2024-01-01T00:00:00Z')"
                    .to_string(),
            ))
            .await;
        assert!(duplicate.is_err(), "permission names must be unique");

        Migrator::down(&db, None).await.unwrap();
        assert!(!manager.has_table("permissions").await.unwrap());
        assert!(!manager.has_table("user_has_roles").await.unwrap());
    }

    struct AclTables;

    impl CatalogTables for AclTables {
        fn tables() -> PermissionTables {
            PermissionTables {
                roles: "acl_roles".into(),
                permissions: "acl_permissions".into(),
                role_has_permissions: "acl_role_permissions".into(),
            }
        }
    }

    #[tokio::test]
    async fn catalog_tables_follow_the_configured_names() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        TableMigrator::<AclTables>::up(&db, None).await.unwrap();

        let manager = SchemaManager::new(&db);
        for table in ["acl_roles", "acl_permissions", "acl_role_permissions", "user_has_roles"] {
            assert!(manager.has_table(table).await.unwrap(), "missing {table}");
        }
        assert!(!manager.has_table("roles").await.unwrap());

        TableMigrator::<AclTables>::down(&db, None).await.unwrap();
        assert!(!manager.has_table("acl_roles").await.unwrap());
    }
}
