//! Pivot-table plumbing shared by the resolvers. Every statement is built
//! against the configured table names, so the same code serves the
//! model-to-permission, model-to-role and role-to-permission pivots.

use std::collections::HashSet;

use chrono::Utc;
use entity::{permissions, roles};
use sea_orm::sea_query::{Alias, Expr, InsertStatement, OnConflict, Order, Query, SelectStatement};
use sea_orm::{ConnectionTrait, DbErr, FromQueryResult, Value};

use crate::target::Target;

pub(crate) const ID: &str = "id";
pub(crate) const NAME: &str = "name";
const CREATED_AT: &str = "created_at";
const UPDATED_AT: &str = "updated_at";
pub(crate) const CATALOG_COLUMNS: [&str; 4] = [ID, NAME, CREATED_AT, UPDATED_AT];

/// A row of the role or permission catalog.
pub trait CatalogRow: Target + FromQueryResult + Clone + Send + Sync {
    fn id(&self) -> i32;
}

impl CatalogRow for permissions::Model {
    fn id(&self) -> i32 {
        self.id
    }
}

impl CatalogRow for roles::Model {
    fn id(&self) -> i32 {
        self.id
    }
}

fn query_error(err: sea_orm::sea_query::error::Error) -> DbErr {
    DbErr::Custom(err.to_string())
}

/// One owner's side of a many-to-many relation.
pub(crate) struct ManyToMany<'a> {
    pub pivot: &'a str,
    pub owner_key: &'a str,
    pub related_key: &'a str,
    pub related_table: &'a str,
    pub owner: Value,
}

impl ManyToMany<'_> {
    fn select_related(&self) -> SelectStatement {
        let related = Alias::new(self.related_table);
        let pivot = Alias::new(self.pivot);
        Query::select()
            .columns(
                CATALOG_COLUMNS
                    .iter()
                    .map(|column| (related.clone(), Alias::new(*column))),
            )
            .from(related.clone())
            .inner_join(
                pivot.clone(),
                Expr::col((pivot.clone(), Alias::new(self.related_key)))
                    .equals((related.clone(), Alias::new(ID))),
            )
            .and_where(Expr::col((pivot, Alias::new(self.owner_key))).eq(self.owner.clone()))
            .order_by((related, Alias::new(ID)), Order::Asc)
            .to_owned()
    }

    /// Loads every related row, freshly queried.
    pub async fn all<M, C>(&self, db: &C) -> Result<Vec<M>, DbErr>
    where
        M: FromQueryResult,
        C: ConnectionTrait,
    {
        let statement = db.get_database_backend().build(&self.select_related());
        M::find_by_statement(statement).all(db).await
    }

    /// First related row with the given name, if linked to the owner.
    pub async fn first_named<M, C>(&self, db: &C, name: &str) -> Result<Option<M>, DbErr>
    where
        M: FromQueryResult,
        C: ConnectionTrait,
    {
        let mut select = self.select_related();
        select
            .and_where(Expr::col((Alias::new(self.related_table), Alias::new(NAME))).eq(name))
            .limit(1);
        let statement = db.get_database_backend().build(&select);
        M::find_by_statement(statement).one(db).await
    }

    /// Projection of the related rows' names.
    pub async fn names<C: ConnectionTrait>(&self, db: &C) -> Result<Vec<String>, DbErr> {
        let related = Alias::new(self.related_table);
        let pivot = Alias::new(self.pivot);
        let select = Query::select()
            .column((related.clone(), Alias::new(NAME)))
            .from(related.clone())
            .inner_join(
                pivot.clone(),
                Expr::col((pivot.clone(), Alias::new(self.related_key)))
                    .equals((related.clone(), Alias::new(ID))),
            )
            .and_where(Expr::col((pivot, Alias::new(self.owner_key))).eq(self.owner.clone()))
            .order_by((related, Alias::new(ID)), Order::Asc)
            .to_owned();
        let rows = db
            .query_all(db.get_database_backend().build(&select))
            .await?;
        rows.iter()
            .map(|row| row.try_get::<String>("", NAME))
            .collect()
    }

    async fn related_ids<C: ConnectionTrait>(&self, db: &C) -> Result<HashSet<i32>, DbErr> {
        let select = Query::select()
            .column(Alias::new(self.related_key))
            .from(Alias::new(self.pivot))
            .and_where(Expr::col(Alias::new(self.owner_key)).eq(self.owner.clone()))
            .to_owned();
        let rows = db
            .query_all(db.get_database_backend().build(&select))
            .await?;
        rows.iter()
            .map(|row| row.try_get::<i32>("", self.related_key))
            .collect()
    }

    /// Links the ids not already linked. Existing pairs are left alone, so
    /// the pivot never holds the same pair twice; a pair linked concurrently
    /// between the read and the insert is skipped by the conflict clause.
    pub async fn attach<C: ConnectionTrait>(&self, db: &C, ids: &[i32]) -> Result<usize, DbErr> {
        let existing = self.related_ids(db).await?;
        let mut seen = HashSet::new();
        let missing: Vec<i32> = ids
            .iter()
            .copied()
            .filter(|id| !existing.contains(id) && seen.insert(*id))
            .collect();
        if missing.is_empty() {
            return Ok(0);
        }

        let insert = self.insert_links(&missing)?;
        db.execute(db.get_database_backend().build(&insert)).await?;
        Ok(missing.len())
    }

    fn insert_links(&self, ids: &[i32]) -> Result<InsertStatement, DbErr> {
        let owner_key = Alias::new(self.owner_key);
        let related_key = Alias::new(self.related_key);
        let mut insert = Query::insert()
            .into_table(Alias::new(self.pivot))
            .columns([owner_key.clone(), related_key.clone()])
            .on_conflict(
                OnConflict::columns([owner_key, related_key])
                    .do_nothing()
                    .to_owned(),
            )
            .to_owned();
        for id in ids {
            insert
                .values([Expr::value(self.owner.clone()), Expr::value(*id)])
                .map_err(query_error)?;
        }
        Ok(insert)
    }

    /// Unlinks the given ids; ids that were never linked are ignored.
    pub async fn detach<C: ConnectionTrait>(&self, db: &C, ids: &[i32]) -> Result<u64, DbErr> {
        if ids.is_empty() {
            return Ok(0);
        }
        let delete = Query::delete()
            .from_table(Alias::new(self.pivot))
            .and_where(Expr::col(Alias::new(self.owner_key)).eq(self.owner.clone()))
            .and_where(Expr::col(Alias::new(self.related_key)).is_in(ids.iter().copied()))
            .to_owned();
        let result = db.execute(db.get_database_backend().build(&delete)).await?;
        Ok(result.rows_affected())
    }

    /// Makes the owner's linked set exactly `ids`.
    pub async fn sync<C: ConnectionTrait>(&self, db: &C, ids: &[i32]) -> Result<(), DbErr> {
        let mut delete = Query::delete()
            .from_table(Alias::new(self.pivot))
            .and_where(Expr::col(Alias::new(self.owner_key)).eq(self.owner.clone()))
            .to_owned();
        if !ids.is_empty() {
            delete.and_where(Expr::col(Alias::new(self.related_key)).is_not_in(ids.iter().copied()));
        }
        db.execute(db.get_database_backend().build(&delete)).await?;
        self.attach(db, ids).await?;
        Ok(())
    }
}

/// Catalog rows whose name is in `names`.
pub(crate) async fn find_by_names<M, C>(db: &C, table: &str, names: &[&str]) -> Result<Vec<M>, DbErr>
where
    M: FromQueryResult,
    C: ConnectionTrait,
{
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let catalog = Alias::new(table);
    let select = Query::select()
        .columns(
            CATALOG_COLUMNS
                .iter()
                .map(|column| (catalog.clone(), Alias::new(*column))),
        )
        .from(catalog.clone())
        .and_where(
            Expr::col((catalog.clone(), Alias::new(NAME)))
                .is_in(names.iter().map(|name| name.to_string())),
        )
        .order_by((catalog, Alias::new(ID)), Order::Asc)
        .to_owned();
    M::find_by_statement(db.get_database_backend().build(&select))
        .all(db)
        .await
}

/// Ids of the catalog rows for `names`, creating the missing ones.
pub(crate) async fn fetch_or_create_ids<M, C>(
    db: &C,
    table: &str,
    names: &[String],
) -> Result<Vec<i32>, DbErr>
where
    M: CatalogRow,
    C: ConnectionTrait,
{
    let rows: Vec<M> = fetch_or_create_many(db, table, names).await?;
    Ok(rows.iter().map(CatalogRow::id).collect())
}

/// Ids of the existing catalog rows named `names`; nothing is created.
pub(crate) async fn find_ids<M, C>(db: &C, table: &str, names: &[&str]) -> Result<Vec<i32>, DbErr>
where
    M: CatalogRow,
    C: ConnectionTrait,
{
    let rows: Vec<M> = find_by_names(db, table, names).await?;
    Ok(rows.iter().map(CatalogRow::id).collect())
}

/// Returns one row per distinct name, in first-seen order, inserting the
/// names that do not exist yet. Inserts skip names created concurrently, so
/// repeated calls never duplicate a row.
pub(crate) async fn fetch_or_create_many<M, C>(
    db: &C,
    table: &str,
    names: &[String],
) -> Result<Vec<M>, DbErr>
where
    M: CatalogRow,
    C: ConnectionTrait,
{
    let mut unique: Vec<&str> = Vec::with_capacity(names.len());
    for name in names {
        if !unique.contains(&name.as_str()) {
            unique.push(name);
        }
    }
    if unique.is_empty() {
        return Ok(Vec::new());
    }

    let existing: Vec<M> = find_by_names(db, table, &unique).await?;
    let missing: Vec<&str> = unique
        .iter()
        .copied()
        .filter(|name| !existing.iter().any(|row| row.target_name() == *name))
        .collect();

    let rows = if missing.is_empty() {
        existing
    } else {
        let now = Utc::now();
        let mut insert = Query::insert()
            .into_table(Alias::new(table))
            .columns([Alias::new(NAME), Alias::new(CREATED_AT), Alias::new(UPDATED_AT)])
            .on_conflict(OnConflict::column(Alias::new(NAME)).do_nothing().to_owned())
            .to_owned();
        for name in &missing {
            insert
                .values([Expr::value(*name), Expr::value(now), Expr::value(now)])
                .map_err(query_error)?;
        }
        db.execute(db.get_database_backend().build(&insert)).await?;
        find_by_names(db, table, &unique).await?
    };

    Ok(unique
        .iter()
        .filter_map(|name| rows.iter().find(|row| row.target_name() == *name).cloned())
        .collect())
}
