use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use client_core::{update_from_assignments, ArchiveClient, LoadStatus, QueryOutcome};
use shared::domain::{Person, Planet, Record, RecordId, Resource};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use config::{load_settings, Overrides, Settings, CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(name = "archive-admin", about = "Browse and edit the reference archive")]
struct Args {
    /// API base url, e.g. http://localhost:8000/api
    #[arg(long, global = true)]
    api_base_url: Option<String>,
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,
    /// Print raw JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One page of a collection.
    List(ListArgs),
    Show {
        resource: Resource,
        id: RecordId,
    },
    Update {
        resource: Resource,
        id: RecordId,
        /// field=value, repeatable
        #[arg(long = "set", value_parser = parse_assignment, required = true)]
        set: Vec<(String, String)>,
    },
    Insight {
        resource: Resource,
        name: String,
        #[arg(long)]
        via_query: bool,
    },
    /// Filterable and sortable fields of a resource.
    Fields { resource: Resource },
}

#[derive(ClapArgs, Debug)]
struct ListArgs {
    resource: Resource,
    /// 1-based page number.
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long)]
    size: Option<u32>,
    /// field=value
    #[arg(long, value_parser = parse_assignment)]
    filter: Option<(String, String)>,
    #[arg(long)]
    sort: Option<String>,
    #[arg(long, requires = "sort")]
    desc: bool,
    #[arg(long)]
    search: Option<String>,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }
    Ok((field.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let settings = load_settings(
        &args.config,
        Overrides {
            api_base_url: args.api_base_url.clone(),
            request_timeout_secs: args.timeout_secs,
        },
    )?;
    info!(api_base_url = %settings.api_base_url, "using archive api");
    let client = ArchiveClient::connect(&settings.api_base_url, Some(settings.request_timeout()))
        .context("failed to build api client")?;

    match args.command {
        Command::List(list) => match list.resource {
            Resource::People => run_list::<Person>(&client, &settings, list, args.json).await,
            Resource::Planets => run_list::<Planet>(&client, &settings, list, args.json).await,
        },
        Command::Show { resource, id } => match resource {
            Resource::People => run_show::<Person>(&client, &id, args.json).await,
            Resource::Planets => run_show::<Planet>(&client, &id, args.json).await,
        },
        Command::Update { resource, id, set } => match resource {
            Resource::People => run_update::<Person>(&client, &id, &set, args.json).await,
            Resource::Planets => run_update::<Planet>(&client, &id, &set, args.json).await,
        },
        Command::Insight {
            resource,
            name,
            via_query,
        } => {
            let insights = client.insights();
            let response = if via_query {
                insights.generate_by_query(resource, &name).await?
            } else {
                insights.generate(resource, &name).await?
            };
            if args.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print!("{}", render::render_insight(&response));
            }
            Ok(())
        }
        Command::Fields { resource } => {
            match resource {
                Resource::People => print!("{}", render::render_fields::<Person>()),
                Resource::Planets => print!("{}", render::render_fields::<Planet>()),
            }
            Ok(())
        }
    }
}

async fn run_list<R: Record>(
    client: &ArchiveClient,
    settings: &Settings,
    args: ListArgs,
    json: bool,
) -> Result<()> {
    if let Some((field, _)) = &args.filter {
        if !R::is_filterable(field) {
            bail!("cannot filter {} by '{field}'", R::RESOURCE);
        }
    }
    if let Some(field) = &args.sort {
        if !R::is_sortable(field) {
            bail!("cannot sort {} by '{field}'", R::RESOURCE);
        }
    }
    let Some(page_index) = args.page.checked_sub(1) else {
        bail!("--page starts at 1");
    };

    let list = client.list::<R>(settings.page_size()?);
    let mut ticket = list.mount().await;
    if let Some(size) = args.size {
        ticket = list.set_page_size(size).await?;
    }
    if let Some((field, value)) = &args.filter {
        ticket = list.set_filter(field, value).await;
    }
    if let Some(field) = &args.sort {
        ticket = list.set_sort(field).await;
        if args.desc {
            ticket = list.set_sort(field).await;
        }
    }
    if let Some(term) = &args.search {
        ticket = list.set_search_term(term).await;
    }
    if page_index > 0 {
        ticket = list.set_page(page_index).await;
    }

    let outcome = list.execute(ticket).await;
    let snapshot = list.snapshot().await;
    match outcome {
        QueryOutcome::Applied(LoadStatus::Ready) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot.view.items)?);
            } else {
                print!("{}", render::render_page(&snapshot));
            }
            Ok(())
        }
        QueryOutcome::Applied(LoadStatus::Error(failure)) => {
            eprintln!("Run the same command again to retry.");
            Err(failure).context(format!("failed to load {}", R::RESOURCE))
        }
        other => bail!("list query did not complete: {other:?}"),
    }
}

async fn run_show<R: Record>(client: &ArchiveClient, id: &RecordId, json: bool) -> Result<()> {
    let record = client
        .records::<R>()
        .fetch(id)
        .await
        .with_context(|| format!("failed to load {} {id}", R::RESOURCE.singular()))?;
    print_record(&record, json)
}

async fn run_update<R: Record>(
    client: &ArchiveClient,
    id: &RecordId,
    assignments: &[(String, String)],
    json: bool,
) -> Result<()> {
    let update = update_from_assignments::<R>(assignments)?;
    let record = client
        .records::<R>()
        .update(id, &update)
        .await
        .with_context(|| format!("failed to update {} {id}", R::RESOURCE.singular()))?;
    print_record(&record, json)
}

fn print_record<R: Record>(record: &R, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        print!("{}", render::render_record(record));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
