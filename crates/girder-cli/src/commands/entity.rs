//! Entity and property commands

use clap::{Args, Subcommand};

use crate::commands::{parse_pair, resolve_entity};
use crate::output::{self, emit};
use crate::AppContext;
use girder_core::{EntityFilter, EntityUpdate, NewEntity, SearchMode, SearchQuery, Value};

#[derive(Args)]
pub struct EntityArgs {
    #[command(subcommand)]
    pub command: EntityCommands,
}

#[derive(Subcommand)]
pub enum EntityCommands {
    /// Add a new entity
    Add {
        /// Entity name
        name: String,
        /// Entity type (building, floor, room, zone, device, ...)
        #[arg(short = 't', long)]
        r#type: String,
        /// Metadata entry, key=value (repeatable)
        #[arg(short, long, value_parser = parse_pair)]
        meta: Vec<(String, Value)>,
        /// External device reference
        #[arg(long)]
        device_uuid: Option<String>,
    },
    /// Get entity details
    Get {
        /// Entity id or name
        entity: String,
    },
    /// List entities, newest first
    List {
        /// Filter by type
        #[arg(short = 't', long)]
        r#type: Option<String>,
        /// Filter by name substring
        #[arg(short, long)]
        name: Option<String>,
        /// Filter by device reference
        #[arg(long)]
        device_uuid: Option<String>,
        /// Metadata entry that must match, key=value (repeatable)
        #[arg(short, long, value_parser = parse_pair)]
        meta: Vec<(String, Value)>,
        /// Limit results
        #[arg(short, long)]
        limit: Option<usize>,
        /// Skip this many results
        #[arg(long, default_value = "0")]
        offset: usize,
    },
    /// Update an existing entity
    Update {
        /// Entity id or name
        entity: String,
        /// New name
        #[arg(long = "set-name")]
        set_name: Option<String>,
        /// New type
        #[arg(long = "set-type")]
        set_type: Option<String>,
        /// Set a metadata entry, key=value (repeatable)
        #[arg(short, long, value_parser = parse_pair)]
        meta: Vec<(String, Value)>,
        /// Remove a metadata entry
        #[arg(long = "unset-meta")]
        unset_meta: Vec<String>,
        /// New device reference
        #[arg(long, conflicts_with = "clear_device_uuid")]
        device_uuid: Option<String>,
        /// Remove the device reference
        #[arg(long)]
        clear_device_uuid: bool,
    },
    /// Delete an entity with its relationships and properties
    Delete {
        /// Entity id or name
        entity: String,
        /// Force deletion without confirmation
        #[arg(long)]
        force: bool,
    },
    /// Search entities by name
    Search {
        /// Search text
        query: String,
        /// Search mode: exact, fuzzy, hybrid
        #[arg(long, default_value = "hybrid")]
        mode: SearchMode,
        /// Restrict to these types (repeatable)
        #[arg(short = 't', long)]
        r#type: Vec<String>,
        /// Limit results
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// List distinct entity types
    Types,
    /// Count entities per type
    Counts,
    /// List the properties of an entity
    Props {
        /// Entity id or name
        entity: String,
    },
    /// Set a property
    SetProp {
        /// Entity id or name
        entity: String,
        /// Property key
        key: String,
        /// Property value (JSON literal or plain text)
        value: String,
    },
    /// Remove a property
    UnsetProp {
        /// Entity id or name
        entity: String,
        /// Property key
        key: String,
    },
}

pub async fn run(args: &EntityArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let store = ctx.engine.entities();

    match &args.command {
        EntityCommands::Add {
            name,
            r#type,
            meta,
            device_uuid,
        } => {
            let mut new = NewEntity::new(r#type.as_str(), name.as_str());
            for (key, value) in meta {
                new = new.with_metadata(key.as_str(), value.clone());
            }
            if let Some(uuid) = device_uuid {
                new = new.with_device_uuid(uuid.as_str());
            }

            let entity = store.create_entity(new).await?;
            emit(ctx.format, &entity, |e| {
                println!("Created entity: {}", output::entity_line(e));
            })?;
        }
        EntityCommands::Get { entity } => {
            let entity = resolve_entity(ctx, entity).await?;
            emit(ctx.format, &entity, output::print_entity)?;
        }
        EntityCommands::List {
            r#type,
            name,
            device_uuid,
            meta,
            limit,
            offset,
        } => {
            let mut filter = EntityFilter::new()
                .with_limit(ctx.engine.config().page_size(*limit))
                .with_offset(*offset);
            if let Some(t) = r#type {
                filter = filter.with_type(t.as_str());
            }
            if let Some(n) = name {
                filter = filter.with_name(n.as_str());
            }
            if let Some(uuid) = device_uuid {
                filter = filter.with_device_uuid(uuid.as_str());
            }
            for (key, value) in meta {
                filter = filter.with_metadata(key.as_str(), value.clone());
            }

            let entities = store.list_entities(&filter).await?;
            tracing::info!("Found {} entities", entities.len());
            emit(ctx.format, &entities, |list| {
                output::print_entities(list, "No entities found")
            })?;
        }
        EntityCommands::Update {
            entity,
            set_name,
            set_type,
            meta,
            unset_meta,
            device_uuid,
            clear_device_uuid,
        } => {
            let current = resolve_entity(ctx, entity).await?;

            let mut update = EntityUpdate::new();
            if let Some(name) = set_name {
                update = update.name(name.as_str());
            }
            if let Some(t) = set_type {
                update = update.entity_type(t.as_str());
            }
            if !meta.is_empty() || !unset_meta.is_empty() {
                let mut metadata = current.metadata.clone();
                for key in unset_meta {
                    metadata.remove(key);
                }
                for (key, value) in meta {
                    metadata.insert(key.clone(), value.clone());
                }
                update = update.metadata(metadata);
            }
            if let Some(uuid) = device_uuid {
                update = update.device_uuid(Some(uuid.clone()));
            } else if *clear_device_uuid {
                update = update.device_uuid(None);
            }

            if update.is_empty() {
                println!("No changes specified");
                return Ok(());
            }

            let updated = store.update_entity(&current.id, update).await?;
            emit(ctx.format, &updated, |e| {
                println!("Updated entity: {}", output::entity_line(e));
            })?;
        }
        EntityCommands::Delete { entity, force } => {
            let entity = resolve_entity(ctx, entity).await?;

            if !force {
                println!(
                    "Use --force to confirm deletion of '{}' and all of its relationships",
                    entity.name
                );
                return Ok(());
            }

            store.delete_entity(&entity.id).await?;
            println!("Deleted entity: {}", output::entity_line(&entity));
        }
        EntityCommands::Search {
            query,
            mode,
            r#type,
            limit,
        } => {
            let mut search = SearchQuery::new(query.as_str())
                .with_mode(*mode)
                .with_limit(limit.unwrap_or(ctx.engine.config().search_limit));
            for t in r#type {
                search = search.with_entity_type(t.as_str());
            }

            let results = store.search(&search).await?;
            tracing::info!("Search returned {} results", results.len());
            emit(ctx.format, &results, |list| {
                output::print_entities(list, &format!("No results for '{}'", query))
            })?;
        }
        EntityCommands::Types => {
            let types = store.get_entity_types().await?;
            emit(ctx.format, &types, |types| {
                for t in types {
                    println!("{}", t);
                }
            })?;
        }
        EntityCommands::Counts => {
            let counts = store.count_entities_by_type().await?;
            emit(ctx.format, &counts, |counts| {
                for (t, n) in counts {
                    println!("{:<16} {}", t, n);
                }
            })?;
        }
        EntityCommands::Props { entity } => {
            let entity = resolve_entity(ctx, entity).await?;
            let properties = store.get_all_properties(&entity.id).await?;
            emit(ctx.format, &properties, |props| {
                if props.is_empty() {
                    println!("No properties on '{}'", entity.name);
                }
                for p in props {
                    println!("{} = {}", p.key, p.value);
                }
            })?;
        }
        EntityCommands::SetProp { entity, key, value } => {
            let entity = resolve_entity(ctx, entity).await?;
            let property = store
                .set_property(&entity.id, key, Value::parse_literal(value))
                .await?;
            emit(ctx.format, &property, |p| {
                println!("Set {}.{} = {}", entity.name, p.key, p.value);
            })?;
        }
        EntityCommands::UnsetProp { entity, key } => {
            let entity = resolve_entity(ctx, entity).await?;
            if store.delete_property(&entity.id, key).await? {
                println!("Removed {}.{}", entity.name, key);
            } else {
                println!("Property '{}' not set on '{}'", key, entity.name);
            }
        }
    }

    Ok(())
}
