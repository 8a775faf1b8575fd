use serde::Deserialize;

/// Table and column names used by the resolvers. Built once at startup and
/// handed to [`crate::Authz`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct PermissionsConfig {
    #[serde(default)]
    pub table_names: TableNames,
    #[serde(default)]
    pub column_names: ColumnNames,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct TableNames {
    #[serde(default = "default_roles_table")]
    pub roles: String,
    #[serde(default = "default_permissions_table")]
    pub permissions: String,
    #[serde(default = "default_role_has_permissions_table")]
    pub role_has_permissions: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            roles: default_roles_table(),
            permissions: default_permissions_table(),
            role_has_permissions: default_role_has_permissions_table(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ColumnNames {
    #[serde(default = "default_role_pivot_key")]
    pub role_pivot_key: String,
    #[serde(default = "default_permission_pivot_key")]
    pub permission_pivot_key: String,
    #[serde(default = "default_model_morph_key")]
    pub model_morph_key: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            role_pivot_key: default_role_pivot_key(),
            permission_pivot_key: default_permission_pivot_key(),
            model_morph_key: default_model_morph_key(),
        }
    }
}

fn default_roles_table() -> String {
    "roles".to_string()
}

fn default_permissions_table() -> String {
    "permissions".to_string()
}

fn default_role_has_permissions_table() -> String {
    "role_has_permissions".to_string()
}

fn default_role_pivot_key() -> String {
    "role_id".to_string()
}

fn default_permission_pivot_key() -> String {
    "permission_id".to_string()
}

fn default_model_morph_key() -> String {
    "model_id".to_string()
}

impl PermissionsConfig {
    /// Reads table overrides from `PERMISSIONS_*_TABLE`, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(table) = std::env::var("PERMISSIONS_ROLES_TABLE") {
            config.table_names.roles = table;
        }
        if let Ok(table) = std::env::var("PERMISSIONS_PERMISSIONS_TABLE") {
            config.table_names.permissions = table;
        }
        if let Ok(table) = std::env::var("PERMISSIONS_ROLE_HAS_PERMISSIONS_TABLE") {
            config.table_names.role_has_permissions = table;
        }
        config
    }
}

/// Pivot tables linking one authorizable model type to roles and permissions.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct AuthorizableConfig {
    pub permissions_pivot_table: String,
    pub roles_pivot_table: String,
}

impl AuthorizableConfig {
    /// `<model>_has_permissions` and `<model>_has_roles`.
    pub fn for_model(model: &str) -> Self {
        let model = model.to_lowercase();
        Self {
            permissions_pivot_table: format!("{model}_has_permissions"),
            roles_pivot_table: format!("{model}_has_roles"),
        }
    }
}
