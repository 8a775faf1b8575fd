use platform_authz::{
    Authorizable, Capabilities, HasPermissions, HasRoles, PermissionsConfig, PivotOwner, Subject,
};
use sea_orm::Value;
use sea_orm::entity::prelude::*;

/// Pivot tables created for this model by the migrator.
pub const PERMISSIONS_PIVOT: &str = "user_has_permissions";
pub const ROLES_PIVOT: &str = "user_has_roles";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sessions::Entity")]
    Sessions,
}

impl Related<super::sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl PivotOwner for Model {
    fn model_key(&self) -> Value {
        self.id.into()
    }
}

impl HasPermissions for Model {
    fn permissions_pivot<'a>(&'a self, _config: &'a PermissionsConfig) -> &'a str {
        PERMISSIONS_PIVOT
    }
}

impl HasRoles for Model {
    fn roles_pivot<'a>(&'a self, _config: &'a PermissionsConfig) -> &'a str {
        ROLES_PIVOT
    }
}

impl Authorizable for Model {}

impl Subject for Model {
    fn capabilities(&self) -> Capabilities<'_> {
        Capabilities::Authorizable(self)
    }
}
