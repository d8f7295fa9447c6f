//! Publishes warehouse relations to the environment's S3 staging area.

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use relpub_common::RetryPolicy;
use relpub_config::EnvironmentContext;
use relpub_object_store::Session;
use relpub_publish::PublicationTarget;
use relpub_schema::{SchemaRegistry, TableIdentity};
use relpub_warehouse::{Resolver, WarehouseLocation};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "relpub", about = "Publish warehouse relations to S3 staging")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve and publish registered sources. Publishes all of them unless
    /// specific sources are named.
    Publish {
        /// Source to publish; repeatable.
        #[arg(long = "source")]
        sources: Vec<String>,
    },
    /// Acquire and validate a storage session, then exit.
    CheckCredentials,
    /// Check the environment configuration, then exit.
    ValidateConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    relpub_monitoring::logging::init();
    let cli = Cli::parse();

    let ctx = match EnvironmentContext::from_env() {
        Ok(ctx) => ctx,
        Err(err) => {
            error!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    // Configuration problems stop the process before any build work runs.
    if let Err(err) = ctx.validate() {
        error!("invalid configuration: {err}");
        std::process::exit(1);
    }

    match cli.command {
        Command::Publish { sources } => run_publish(&ctx, sources).await,
        Command::CheckCredentials => run_check_credentials(&ctx).await,
        Command::ValidateConfig => {
            println!(
                "configuration ok: env root '{}', stage {:?}, bucket {}",
                ctx.env_root(),
                ctx.runtime_stage,
                ctx.bucket.as_deref().unwrap_or("<unset>"),
            );
            Ok(())
        }
    }
}

async fn run_publish(ctx: &EnvironmentContext, sources: Vec<String>) -> anyhow::Result<()> {
    let registry = SchemaRegistry::builtin();
    let names: Vec<String> = if sources.is_empty() {
        registry.names().map(str::to_string).collect()
    } else {
        sources
    };

    if !ctx.upload_enabled {
        info!("S3 upload disabled, skipping publication of {} sources", names.len());
        return Ok(());
    }

    let resolver = Resolver::new(warehouse_location(ctx)?);
    let retry_policy = RetryPolicy::default();

    // Acquired on the first live destination. A dry run or the loading
    // stage resolves every destination to `None` and must work without a
    // bucket or credentials.
    let mut session: Option<Session> = None;

    let mut published = 0usize;
    for name in &names {
        let Some(schema) = registry.get(name) else {
            bail!("unknown source '{name}'");
        };
        let relation_name = relation_name_for(name);

        let Some(target) = PublicationTarget::resolve(&relation_name, ctx)? else {
            info!("no destination for {relation_name}, skipping");
            continue;
        };

        let session = match &mut session {
            Some(session) => session,
            slot => slot.insert(
                relpub_object_store::acquire(ctx)
                    .await
                    .context("failed to acquire a storage session")?,
            ),
        };

        let identity: TableIdentity = relation_name
            .parse()
            .with_context(|| format!("invalid relation name for source '{name}'"))?;
        let relation = resolver.resolve(&identity, schema)?;

        relpub_common::retry(&retry_policy, "publish", |_| true, || {
            relpub_publish::publish(&relation, &target, &session)
        })
        .await
        .with_context(|| format!("failed to publish {target}"))?;
        published += 1;
    }

    info!("published {published} of {} sources", names.len());
    Ok(())
}

async fn run_check_credentials(ctx: &EnvironmentContext) -> anyhow::Result<()> {
    let session = relpub_object_store::acquire(ctx)
        .await
        .context("credential check failed")?;
    if session.is_mock() {
        println!("credentials ok (mock storage session)");
    } else {
        println!("credentials ok, bucket access validated");
    }
    Ok(())
}

/// Builds the warehouse location from `DB_PATH`, which may be a plain path
/// or a `duckdb://` connection string.
fn warehouse_location(ctx: &EnvironmentContext) -> anyhow::Result<WarehouseLocation> {
    match &ctx.db_path {
        Some(path) => path
            .to_string_lossy()
            .parse()
            .context("invalid DB_PATH"),
        None => Ok(WarehouseLocation::new(None)),
    }
}

/// Maps a registry source name to its warehouse relation. The consolidated
/// master relation lives in the `master` schema, the model catalog under
/// `_metadata`; everything else is a source table.
fn relation_name_for(source: &str) -> String {
    match source {
        "indicators" => "master.indicators".to_string(),
        "all_models" => "_metadata.all_models".to_string(),
        other => format!("sources.{other}"),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use relpub_config::{AwsSettings, RuntimeStage, Target};

    use super::*;

    fn credential_less_context() -> EnvironmentContext {
        EnvironmentContext {
            target: Target::Dev,
            username: "default".to_string(),
            bucket: None,
            runtime_stage: RuntimeStage::Running,
            dry_run: false,
            upload_enabled: true,
            mock_storage: false,
            db_path: None,
            aws: AwsSettings {
                region: "us-east-1".to_string(),
                role_arn: None,
                access_key_id: None,
                secret_access_key: None,
                session_token: None,
            },
        }
    }

    #[tokio::test]
    async fn dry_run_publishes_without_bucket_or_credentials() {
        //* Given a dry-run context that passes validation with nothing configured
        let ctx = EnvironmentContext {
            dry_run: true,
            ..credential_less_context()
        };
        assert!(ctx.validate().is_ok());

        //* When all sources are published
        //* Then no storage session is ever acquired and the run succeeds
        run_publish(&ctx, Vec::new()).await.unwrap();
    }

    #[tokio::test]
    async fn loading_stage_publishes_without_bucket_or_credentials() {
        let ctx = EnvironmentContext {
            runtime_stage: RuntimeStage::Loading,
            ..credential_less_context()
        };
        run_publish(&ctx, Vec::new()).await.unwrap();
    }

    #[test]
    fn relation_names_cover_every_category() {
        assert_eq!(relation_name_for("wdi"), "sources.wdi");
        assert_eq!(relation_name_for("indicators"), "master.indicators");
        assert_eq!(relation_name_for("all_models"), "_metadata.all_models");
    }

    #[test]
    fn db_path_accepts_plain_and_connection_string_forms() {
        let mut ctx = credential_less_context();
        ctx.db_path = Some(PathBuf::from("warehouse/analytics.duckdb"));
        let location = warehouse_location(&ctx).unwrap();
        assert_eq!(
            location.configured_path(),
            Some(std::path::Path::new("warehouse/analytics.duckdb"))
        );

        ctx.db_path = Some(PathBuf::from("duckdb://warehouse/analytics.duckdb"));
        let location = warehouse_location(&ctx).unwrap();
        assert_eq!(
            location.configured_path(),
            Some(std::path::Path::new("warehouse/analytics.duckdb"))
        );

        ctx.db_path = Some(PathBuf::from("postgres://host/db"));
        assert!(warehouse_location(&ctx).is_err());
    }
}
