use anyhow::{Context, Result};
use migration::{CatalogTables, PermissionTables};
use platform_authz::PermissionsConfig;
use platform_db::DatabaseSettings;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub cors_allowed_origins: Vec<String>,
    /// HTML authorization failures redirect to the Referer with a flash
    /// cookie instead of rendering a page.
    pub html_redirect_back: bool,
    pub permissions: PermissionsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();

        let html_redirect_back = match std::env::var("HTML_REDIRECT_BACK") {
            Ok(value) => parse_flag(&value).context("invalid HTML_REDIRECT_BACK")?,
            Err(_) => true,
        };

        let max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(value) => value
                .trim()
                .parse()
                .context("invalid DATABASE_MAX_CONNECTIONS")?,
            Err(_) => 10,
        };
        let database = DatabaseSettings::default()
            .max_connections(max_connections)
            .sqlx_logging(std::env::var("DATABASE_LOG_SQL").is_ok_and(|v| parse_flag(&v) == Some(true)));

        Ok(Self {
            database,
            cors_allowed_origins,
            html_redirect_back,
            permissions: PermissionsConfig::from_env(),
        })
    }
}

/// The catalog tables named by `config`, as the migrations create them.
pub fn catalog_tables(config: &PermissionsConfig) -> PermissionTables {
    PermissionTables {
        roles: config.table_names.roles.clone(),
        permissions: config.table_names.permissions.clone(),
        role_has_permissions: config.table_names.role_has_permissions.clone(),
    }
}

/// Catalog names from the same `PERMISSIONS_*_TABLE` variables
/// [`AppConfig::load`] reads, so migrations and resolvers agree.
pub struct EnvCatalogTables;

impl CatalogTables for EnvCatalogTables {
    fn tables() -> PermissionTables {
        catalog_tables(&PermissionsConfig::from_env())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{MigratorTrait, TableMigrator};
    use platform_authz::Authz;
    use sea_orm::Database;

    fn acl_config() -> PermissionsConfig {
        let mut config = PermissionsConfig::default();
        config.table_names.roles = "acl_roles".into();
        config.table_names.role_has_permissions = "acl_role_permissions".into();
        config
    }

    struct AclTables;

    impl CatalogTables for AclTables {
        fn tables() -> PermissionTables {
            catalog_tables(&acl_config())
        }
    }

    #[tokio::test]
    async fn migrated_tables_match_the_permissions_config() {
        let pool = Database::connect("sqlite::memory:").await.unwrap();
        TableMigrator::<AclTables>::up(&pool, None).await.unwrap();

        let authz = Authz::new(pool, acl_config());
        let admin = authz.gate().create_role("admin").await.unwrap();
        authz
            .gate()
            .permissions(&admin)
            .give_permission_to(["ban"])
            .await
            .unwrap();
        assert_eq!(
            authz.gate().permissions(&admin).get_permission_names().await.unwrap(),
            ["ban"]
        );
    }

    #[test]
    fn catalog_tables_copy_the_configured_names() {
        let tables = catalog_tables(&acl_config());
        assert_eq!(tables.roles, "acl_roles");
        assert_eq!(tables.permissions, "permissions");
        assert_eq!(tables.role_has_permissions, "acl_role_permissions");
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("Yes"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
