//! Subcommand handlers.

use anyhow::{bail, Context, Result};
use burrow_core::services::{drop_statement, ColumnSpec, TableSpec, ViewSpec};
use burrow_core::{
    BurrowState, ConnectionProfile, DdlReconstructor, MetadataRepository, ObjectKind,
    PgConnector, Selection, Session, SslMode, Value,
};

use crate::render;
use crate::{Command, ProfileArgs, ProfileCommand, Target};

pub async fn dispatch(state: &BurrowState, command: Command, password: Option<&str>) -> Result<()> {
    match command {
        Command::Profile(command) => profile(state, command),
        Command::Test { profile } => test(state, &profile, password).await,
        Command::Browse { profile, path } => browse(state, &profile, &path, password).await,
        Command::Ddl { target, kind, object, table, reconstruct } => {
            if reconstruct && ObjectKind::parse(&kind) != Some(ObjectKind::Table) {
                bail!("--reconstruct only applies to tables");
            }
            let session = open(state, &target, password).await?;
            let (schema, name) = split_qualified(&object);
            let ddl = if reconstruct {
                DdlReconstructor::reconstruct_table_ddl(session.client(), schema, name).await
            } else {
                DdlReconstructor::get_object_ddl_by_kind_name(
                    session.client(),
                    &kind,
                    schema,
                    name,
                    table.as_deref(),
                )
                .await
            };
            session.close().await;
            println!("{ddl}");
            Ok(())
        }
        Command::Describe { target, table } => {
            let session = open(state, &target, password).await?;
            let (schema, name) = split_qualified(&table);
            let details = MetadataRepository::load_table_details(session.client(), schema, name).await;
            session.close().await;
            render::print_table_details(&details?);
            Ok(())
        }
        Command::Run { target, sql, params, json } => {
            let sql = if sql == "-" {
                std::io::read_to_string(std::io::stdin()).context("failed to read SQL from stdin")?
            } else {
                sql
            };
            let params: Vec<Value> = params.into_iter().map(Value::from).collect();
            let session = open(state, &target, password).await?;
            let envelope = session.run(&sql, &params).await;
            session.close().await;
            let envelope = envelope?;
            if json {
                println!("{}", serde_json::to_string_pretty(&envelope)?);
            } else {
                render::print_envelope(&envelope);
            }
            Ok(())
        }
        Command::CreateTable { target, table, columns, dry_run } => {
            let (schema, name) = split_qualified(&table);
            let spec = columns
                .iter()
                .map(|c| parse_column(c))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .fold(TableSpec::new(schema, name), TableSpec::column);
            apply(state, &target, &spec.build_sql()?, !dry_run, password).await
        }
        Command::CreateView { target, view, query, dry_run } => {
            let (schema, name) = split_qualified(&view);
            let sql = ViewSpec::new(schema, name, query).build_sql()?;
            apply(state, &target, &sql, !dry_run, password).await
        }
        Command::Drop { target, kind, object, yes } => {
            let kind = ObjectKind::parse(&kind).with_context(|| format!("unknown object kind '{kind}'"))?;
            let (schema, name) = split_qualified(&object);
            let sql = drop_statement(kind, schema, name)?;
            if !yes {
                eprintln!("not executed; pass --yes to run it");
            }
            apply(state, &target, &sql, yes, password).await
        }
    }
}

fn profile(state: &BurrowState, command: ProfileCommand) -> Result<()> {
    match command {
        ProfileCommand::Add(args) => {
            let mut profile = build_profile(&args)?;
            if let Some(existing) = state.storage().load_profile_by_name(&profile.name)? {
                profile.id = existing.id;
            }
            if !profile.ssl_mode.allows_plaintext() {
                tracing::warn!(
                    profile = %profile.name,
                    ssl_mode = profile.ssl_mode.as_str(),
                    "Saved profile requires TLS, which connections do not support"
                );
            }
            state.storage().save_profile(&profile)?;
            println!("saved profile '{}' ({})", profile.name, profile.display_url());
            Ok(())
        }
        ProfileCommand::List => {
            render::print_profiles(&state.storage().load_all_profiles()?);
            Ok(())
        }
        ProfileCommand::Remove { name } => {
            let profile = state
                .storage()
                .load_profile_by_name(&name)?
                .with_context(|| format!("no saved profile named '{name}'"))?;
            state.storage().delete_profile(profile.id)?;
            println!("removed profile '{name}'");
            Ok(())
        }
    }
}

fn build_profile(args: &ProfileArgs) -> Result<ConnectionProfile> {
    let mut builder = ConnectionProfile::builder()
        .name(&args.name)
        .host(&args.host)
        .port(args.port)
        .database(&args.database)
        .user(&args.user)
        .ssl_mode(SslMode::parse(&args.sslmode))
        .connect_timeout_secs(args.connect_timeout);
    if let Some(secs) = args.statement_timeout {
        builder = builder.statement_timeout_secs(secs);
    }
    builder.build().map_err(|e| anyhow::anyhow!("invalid profile: {e}"))
}

async fn test(state: &BurrowState, name: &str, password: Option<&str>) -> Result<()> {
    let profile = load_profile(state, name, password)?;
    PgConnector.test_connection(&profile).await?;
    println!("connected to {}", profile.display_url());
    Ok(())
}

async fn browse(
    state: &BurrowState,
    profile: &str,
    path: &[String],
    password: Option<&str>,
) -> Result<()> {
    let mut browser = state.browser(password)?;
    let mut current =
        browser.find_root(profile).with_context(|| format!("no saved profile named '{profile}'"))?;

    for segment in path {
        browser.expand(current).await?;
        current = browser.find_child(current, segment).with_context(|| {
            let parent = browser.node(current).map(|n| n.label.as_str()).unwrap_or(profile);
            format!("'{segment}' not found under '{parent}'")
        })?;
    }

    let node = browser.node(current).context("node vanished from the tree")?;
    if node.kind.is_container() {
        browser.expand(current).await?;
        render::print_children(&browser, current);
        return Ok(());
    }

    let owner = ConnectionProfile::clone(node.kind.profile());
    let mut session = state.open_session(owner, node.kind.database()).await?;
    let selection = browser.select(current, &mut session).await;
    session.close().await;

    match selection? {
        Selection::Table(details) => render::print_table_details(&details),
        Selection::Definition { ddl, .. } => println!("{ddl}"),
        Selection::Container => {}
    }
    Ok(())
}

/// Print `sql`, then run it when `execute` is set.
async fn apply(
    state: &BurrowState,
    target: &Target,
    sql: &str,
    execute: bool,
    password: Option<&str>,
) -> Result<()> {
    println!("{sql}");
    if !execute {
        return Ok(());
    }
    let session = open(state, target, password).await?;
    let envelope = session.run(sql, &[]).await;
    session.close().await;
    render::print_envelope(&envelope?);
    Ok(())
}

fn load_profile(state: &BurrowState, name: &str, password: Option<&str>) -> Result<ConnectionProfile> {
    let profile = state
        .storage()
        .load_profile_by_name(name)?
        .with_context(|| format!("no saved profile named '{name}'"))?;
    Ok(profile.with_password(password.map(String::from)))
}

async fn open(state: &BurrowState, target: &Target, password: Option<&str>) -> Result<Session> {
    let profile = load_profile(state, &target.profile, password)?;
    Ok(state.open_session(profile, target.database.as_deref()).await?)
}

/// `schema.name` → (`schema`, `name`); a bare name lives in `public`.
fn split_qualified(object: &str) -> (&str, &str) {
    object.split_once('.').unwrap_or(("public", object))
}

/// Parse `name:TYPE[:pk][:not-null][:unique][:default=EXPR]`.
///
/// `default=` must come last; everything after it, colons included, is the expression.
fn parse_column(spec: &str) -> Result<ColumnSpec> {
    let (head, default) = match spec.find(":default=") {
        Some(at) => (&spec[..at], Some(&spec[at + ":default=".len()..])),
        None => (spec, None),
    };

    let mut parts = head.split(':');
    let name = parts.next().unwrap_or_default();
    let Some(data_type) = parts.next() else {
        bail!("column '{spec}' needs a type, as in name:TYPE");
    };

    let mut column = ColumnSpec::new(name, data_type);
    for flag in parts {
        column = match flag.to_lowercase().as_str() {
            "pk" | "primary-key" => column.primary_key(),
            "not-null" | "notnull" => column.not_null(),
            "unique" => column.unique(),
            other => bail!("unknown column flag '{other}' in '{spec}'"),
        };
    }
    if let Some(expr) = default {
        column = column.default_expr(expr);
    }
    Ok(column)
}
