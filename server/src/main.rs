mod config;
mod entities;
mod graphql;
mod http;
mod seed;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use migration::{AuthorizablePivots, MigratorTrait, TableMigrator, pivot_table_sql};
use platform_authz::{AuthorizableConfig, Authz};
use platform_db::DbPool;
use platform_obs::{ObsConfig, init_tracing, shutdown_tracing};
use tracing::info;

use crate::{
    config::{AppConfig, EnvCatalogTables, catalog_tables},
    http::{AppState, SESSION_COOKIE, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "server", version, about = "Role and permission demo host")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP + GraphQL server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Seed demo roles, permissions, users and sessions.
    Seed,
    /// Print the DDL for a model's role and permission pivot tables.
    #[command(name = "pivot-table")]
    PivotTable(PivotTableCommand),
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
}

impl From<ServeCommand> for ServeConfig {
    fn from(value: ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[derive(Args, Debug)]
struct PivotTableCommand {
    /// Model name, e.g. `user`.
    model: String,
    /// Table holding the model rows; defaults to the model name plus `s`.
    #[arg(long)]
    model_table: Option<String>,
    #[arg(long)]
    permissions_pivot_table: Option<String>,
    #[arg(long)]
    roles_pivot_table: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::default())?;
    let cli = Cli::parse();
    let app_config = Arc::new(AppConfig::load()?);
    let result = run(cli.command, app_config).await;
    shutdown_tracing();
    result
}

async fn run(command: Command, app_config: Arc<AppConfig>) -> Result<()> {
    match command {
        Command::Serve(cmd) => run_server(cmd, app_config).await,
        Command::Migrate(action) => match action {
            MigrateCommand::Up => migrate_up(&app_config).await,
            MigrateCommand::Down => migrate_down(&app_config).await,
        },
        Command::Seed => run_seed(&app_config).await,
        Command::PivotTable(cmd) => {
            println!("{}", pivot_table(cmd, &app_config));
            Ok(())
        }
    }
}

fn pivot_table(cmd: PivotTableCommand, config: &AppConfig) -> String {
    let defaults = AuthorizableConfig::for_model(&cmd.model);
    let model_table = cmd
        .model_table
        .unwrap_or_else(|| format!("{}s", cmd.model.to_lowercase()));
    let pivots = AuthorizablePivots::for_model(&cmd.model, &model_table)
        .with_permissions_pivot(
            cmd.permissions_pivot_table
                .unwrap_or(defaults.permissions_pivot_table),
        )
        .with_roles_pivot(cmd.roles_pivot_table.unwrap_or(defaults.roles_pivot_table))
        .with_catalog(catalog_tables(&config.permissions));
    pivot_table_sql(&pivots)
}

type Migrator = TableMigrator<EnvCatalogTables>;

async fn setup_pool(config: &AppConfig) -> Result<DbPool> {
    config
        .database
        .connect()
        .await
        .context("failed to open database pool")
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let pool = setup_pool(&config).await?;
    ensure_migrations(&pool, cmd.allow_dirty).await?;
    let authz = Authz::new(pool.clone(), config.permissions.clone());
    let state = AppState {
        pool,
        schema: graphql::build_schema(authz.clone()),
        authz,
        config,
    };
    http::serve(cmd.into(), state).await
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        anyhow::bail!(
            "pending migrations detected; run `cargo run -p server -- migrate up` or pass --allow-dirty"
        );
    }
    Ok(())
}

async fn migrate_up(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    Migrator::up(&pool, None).await?;
    info!("database migrations applied");
    Ok(())
}

async fn migrate_down(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    Migrator::down(&pool, Some(1)).await?;
    info!("most recent migration rolled back");
    Ok(())
}

async fn run_seed(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    let authz = Authz::new(pool, config.permissions.clone());
    for seeded in seed::seed_demo(&authz).await? {
        println!(
            "{}\t{}={}",
            seeded.user.email, SESSION_COOKIE, seeded.session_id
        );
    }
    Ok(())
}
