//! Demo data: a role catalog, three users and a live session for each.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use platform_authz::Authz;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::{sessions, users};

const SESSION_DAYS: i64 = 30;

#[derive(Debug)]
pub struct SeededUser {
    pub user: users::Model,
    pub session_id: Uuid,
}

#[instrument(name = "seed.demo", skip_all)]
pub async fn seed_demo(authz: &Authz) -> Result<Vec<SeededUser>> {
    let gate = authz.gate();

    gate.create_role("admin").await?;
    gate.create_role("moderator").await?;
    let editor = gate.create_role("editor").await?;
    gate.permissions(&editor)
        .give_permission_to(["publish", "edit"])
        .await?;

    let admin = upsert_user(authz, "admin@example.com", "Admin").await?;
    gate.roles(&admin).assign_role(["admin"]).await?;

    let writer = upsert_user(authz, "editor@example.com", "Editor").await?;
    gate.roles(&writer).assign_role(["editor"]).await?;

    let reviewer = upsert_user(authz, "reviewer@example.com", "Reviewer").await?;
    gate.permissions(&reviewer)
        .give_permission_to(["moderate"])
        .await?;

    let mut seeded = Vec::new();
    for user in [admin, writer, reviewer] {
        let session_id = open_session(authz, &user).await?;
        seeded.push(SeededUser { user, session_id });
    }
    info!(users = seeded.len(), "demo data seeded");
    Ok(seeded)
}

async fn upsert_user(authz: &Authz, email: &str, name: &str) -> Result<users::Model> {
    let db = authz.connection();
    if let Some(existing) = users::Entity::find()
        .filter(users::Column::Email.eq(email))
        .one(db)
        .await?
    {
        return Ok(existing);
    }
    let user = users::ActiveModel {
        email: Set(email.to_string()),
        name: Set(Some(name.to_string())),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    };
    user.insert(db)
        .await
        .with_context(|| format!("failed to create user {email}"))
}

pub async fn open_session(authz: &Authz, user: &users::Model) -> Result<Uuid> {
    let now = Utc::now();
    let session = sessions::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        created_at: Set(now.into()),
        expires_at: Set((now + Duration::days(SESSION_DAYS)).into()),
    };
    let session = session.insert(authz.connection()).await?;
    Ok(session.id)
}
