#![allow(dead_code)]

use platform_authz::{
    Authorizable, Authz, Capabilities, HasPermissions, HasRoles, PermissionsConfig, PivotOwner,
    Subject,
};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, Statement, Value};

const SCHEMA: &[&str] = &[
    "CREATE TABLE models (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)",
    "CREATE TABLE roles (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE, created_at TEXT NOT NULL, updated_at TEXT)",
    "CREATE TABLE permissions (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE, created_at TEXT NOT NULL, updated_at TEXT)",
    "CREATE TABLE role_has_permissions (model_id INTEGER NOT NULL, permission_id INTEGER NOT NULL, PRIMARY KEY (model_id, permission_id))",
    "CREATE TABLE model_has_roles (model_id INTEGER NOT NULL, role_id INTEGER NOT NULL, PRIMARY KEY (model_id, role_id))",
    "CREATE TABLE model_has_permissions (model_id INTEGER NOT NULL, permission_id INTEGER NOT NULL, PRIMARY KEY (model_id, permission_id))",
];

/// A subject holding both roles and direct permissions.
#[derive(Clone, Debug)]
pub struct Member {
    pub id: i32,
}

impl PivotOwner for Member {
    fn model_key(&self) -> Value {
        self.id.into()
    }
}

impl HasPermissions for Member {
    fn permissions_pivot<'a>(&'a self, _config: &'a PermissionsConfig) -> &'a str {
        "model_has_permissions"
    }
}

impl HasRoles for Member {
    fn roles_pivot<'a>(&'a self, _config: &'a PermissionsConfig) -> &'a str {
        "model_has_roles"
    }
}

impl Authorizable for Member {}

impl Subject for Member {
    fn capabilities(&self) -> Capabilities<'_> {
        Capabilities::Authorizable(self)
    }
}

pub async fn setup() -> Authz {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    for sql in SCHEMA {
        db.execute(Statement::from_string(DatabaseBackend::Sqlite, sql.to_string()))
            .await
            .unwrap();
    }
    Authz::new(db, PermissionsConfig::default())
}

pub async fn create_member(authz: &Authz, name: &str) -> Member {
    let result = authz
        .connection()
        .execute(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "INSERT INTO models (name) VALUES (?)",
            [name.into()],
        ))
        .await
        .unwrap();
    Member {
        id: result.last_insert_id() as i32,
    }
}

/// Number of rows in `table` owned by `model_id`.
pub async fn pivot_count(authz: &Authz, table: &str, model_id: i32) -> i64 {
    let row = authz
        .connection()
        .query_one(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            &format!("SELECT COUNT(*) AS n FROM {table} WHERE model_id = ?"),
            [model_id.into()],
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}

pub async fn catalog_count(authz: &Authz, table: &str) -> i64 {
    let row = authz
        .connection()
        .query_one(Statement::from_string(
            DatabaseBackend::Sqlite,
            format!("SELECT COUNT(*) AS n FROM {table}"),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}

pub fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}
