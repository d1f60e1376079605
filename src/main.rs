use anyhow::{bail, Context};
use clap::Parser;
use inquire::error::InquireResult;

mod app;
mod backup;
mod capture;
mod cli;
mod collections;
mod config;
mod errors;
mod events;
mod router;
mod search;
mod stats;
mod storage;
mod store;
#[cfg(test)]
mod tests;
mod web;

use capture::TabInfo;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = cli::Args::parse();

    let config = config::Config::load();
    let app = app::App::open(&config)?;

    match args.command {
        cli::Command::Daemon {} => {
            web::start_daemon(app, &config);
            Ok(())
        }

        cli::Command::Capture { url, title, tab_id } => {
            let tab = TabInfo {
                id: tab_id,
                url,
                title,
            };
            match app.capture(&tab)? {
                Some(outcome) => {
                    println!("{}", serde_json::to_string_pretty(&outcome).unwrap())
                }
                None => println!("capture skipped"),
            }
            Ok(())
        }

        cli::Command::Search { query, limit } => {
            let results = app.search_with_limit(&query, limit);
            println!("{}", serde_json::to_string_pretty(&results).unwrap());
            Ok(())
        }

        cli::Command::Collection { action } => match action {
            cli::CollectionAction::List {} => {
                let collections = app.collections().list();
                println!("{}", serde_json::to_string_pretty(&collections).unwrap());
                Ok(())
            }
            cli::CollectionAction::Create { name, id } => {
                let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                let collection = app.collections().create(&id, &name)?;
                println!("{}", serde_json::to_string_pretty(&collection).unwrap());
                Ok(())
            }
            cli::CollectionAction::Rename { id, name } => {
                let collection = app.collections().rename(&id, &name)?;
                println!("{}", serde_json::to_string_pretty(&collection).unwrap());
                Ok(())
            }
            cli::CollectionAction::Delete { id } => {
                let removed = app.collections().delete(&id)?;
                println!("{removed} links removed");
                Ok(())
            }
        },

        cli::Command::Link { action } => match action {
            cli::LinkAction::Get { id } => {
                let link = app.get_link(&id);
                println!("{}", serde_json::to_string_pretty(&link).unwrap());
                Ok(())
            }
            cli::LinkAction::Move { id, collection_id } => {
                let Some(collection) = app.db().get_collection(&collection_id) else {
                    bail!("no collection with id {collection_id}");
                };
                let link = app.update_link_collection(
                    &id,
                    app::CollectionRef {
                        id: collection.id,
                        name: collection.name,
                    },
                )?;
                println!("{}", serde_json::to_string_pretty(&link).unwrap());
                Ok(())
            }
            cli::LinkAction::Delete { id } => {
                app.delete_link(&id)?;
                println!("deleted {id}");
                Ok(())
            }
        },

        cli::Command::Stats {} => {
            let statistics = app.statistics();
            println!("{}", serde_json::to_string_pretty(&statistics).unwrap());
            Ok(())
        }

        cli::Command::Export { output } => {
            let payload = backup::export(app.db());
            let json = serde_json::to_string_pretty(&payload).unwrap();
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("exported to {}", path.display());
                }
                None => println!("{json}"),
            }
            Ok(())
        }

        cli::Command::Import { path, yes } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let payload: backup::ExportPayload =
                serde_json::from_str(&raw).context("export file is malformed")?;

            if !yes {
                match inquire::prompt_confirmation(format!(
                    "Replace all data with {} collections and {} links?",
                    payload.data.collections.len(),
                    payload.data.links.len()
                )) {
                    InquireResult::Ok(true) => {}
                    InquireResult::Ok(false) => return Ok(()),
                    InquireResult::Err(err) => bail!("An error occurred: {}", err),
                }
            }

            let imported = backup::import(app.db(), app.index(), payload)?;
            println!(
                "imported {} collections and {} links",
                imported.collections, imported.links
            );
            Ok(())
        }

        cli::Command::RefreshIndex {} => {
            app.index().refresh(app.db());
            println!("search index refreshed");
            Ok(())
        }
    }
}
