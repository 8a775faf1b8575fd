use async_graphql::{Context, EmptyMutation, EmptySubscription, Object, Schema, SimpleObject};
use platform_api::{ApiError, ApiResult};
use platform_authz::{Auth, Authz};
use serde::Serialize;
use tracing::instrument;

use crate::entities::users;

pub type SchemaType = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

/// Per-request authentication result handed to resolvers.
pub type RequestAuth = Auth<users::Model>;

pub fn build_schema(authz: Authz) -> SchemaType {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .data(authz)
        .finish()
}

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    #[instrument(name = "graphql.health", skip_all)]
    async fn health(&self) -> ApiResult<HealthPayload> {
        Ok(HealthPayload { ok: true })
    }

    /// The signed-in user with their roles and effective permissions, or
    /// null for guests.
    #[instrument(name = "graphql.me", skip_all)]
    async fn me(&self, ctx: &Context<'_>) -> ApiResult<Option<MePayload>> {
        let Some(user) = ctx.data_opt::<RequestAuth>().and_then(Auth::user) else {
            return Ok(None);
        };
        let authz = ctx
            .data::<Authz>()
            .map_err(|err| ApiError::internal(anyhow::anyhow!(err.message)))?;
        let resolver = authz.gate().authorizable(user);
        let roles = resolver.roles().get_role_names().await?;
        let permissions = resolver
            .effective_permissions()
            .await?
            .into_iter()
            .map(|permission| permission.name)
            .collect();
        Ok(Some(MePayload {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            roles,
            permissions,
        }))
    }

    #[instrument(name = "graphql.version", skip_all)]
    async fn version(&self) -> ApiResult<String> {
        Ok(env!("CARGO_PKG_VERSION").to_string())
    }
}

#[derive(Clone, Debug, SimpleObject, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct MePayload {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::Request;
    use platform_authz::PermissionsConfig;
    use sea_orm::Database;
    use serde_json::json;

    async fn schema() -> SchemaType {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        build_schema(Authz::new(db, PermissionsConfig::default()))
    }

    #[tokio::test]
    async fn health_query_returns_ok() {
        let response = schema().await.execute(Request::new("{ health { ok } }")).await;
        assert!(response.errors.is_empty());
        let body = response.data.into_json().unwrap();
        assert_eq!(body, json!({"health": {"ok": true}}));
    }

    #[tokio::test]
    async fn guests_have_no_profile() {
        let request = Request::new("{ me { email } }").data(RequestAuth::guest());
        let response = schema().await.execute(request).await;
        assert!(response.errors.is_empty());
        assert_eq!(response.data.into_json().unwrap(), json!({"me": null}));
    }
}
