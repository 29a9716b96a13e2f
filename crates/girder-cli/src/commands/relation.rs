//! Relationship commands

use clap::{Args, Subcommand};

use crate::commands::{parse_pair, resolve_entity};
use crate::output::{self, emit};
use crate::AppContext;
use girder_core::{Direction, NewRelationship, RelationshipFilter, RelationshipId, RelationshipType, Value};

#[derive(Args)]
pub struct RelationArgs {
    #[command(subcommand)]
    pub command: RelationCommands,
}

#[derive(Subcommand)]
pub enum RelationCommands {
    /// Add a new relationship
    Add {
        /// Source entity id or name
        from: String,
        /// Target entity id or name
        to: String,
        /// Relationship type (CONTAINS, DEPENDS_ON, RELATED_TO or any other name)
        #[arg(short = 't', long, default_value = "CONTAINS")]
        r#type: String,
        /// Metadata entry, key=value (repeatable)
        #[arg(short, long, value_parser = parse_pair)]
        meta: Vec<(String, Value)>,
    },
    /// Get relationship details
    Get {
        /// Relationship id
        id: RelationshipId,
    },
    /// List relationships, oldest first
    List {
        /// Only relationships touching this entity
        #[arg(short, long)]
        entity: Option<String>,
        /// Direction relative to --entity: outgoing, incoming, both
        #[arg(long, default_value = "both", requires = "entity")]
        direction: Direction,
        /// Filter by source entity
        #[arg(long)]
        from: Option<String>,
        /// Filter by target entity
        #[arg(long)]
        to: Option<String>,
        /// Filter by type
        #[arg(short = 't', long)]
        r#type: Option<String>,
    },
    /// Delete a relationship
    Delete {
        /// Relationship id
        id: RelationshipId,
    },
    /// Entities one hop away, with the connecting relationship
    Related {
        /// Entity id or name
        entity: String,
        /// Follow only this relationship type
        #[arg(short = 't', long)]
        r#type: Option<String>,
        /// Direction: outgoing, incoming, both
        #[arg(long, default_value = "both")]
        direction: Direction,
    },
}

pub async fn run(args: &RelationArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let store = ctx.engine.relationships();

    match &args.command {
        RelationCommands::Add {
            from,
            to,
            r#type,
            meta,
        } => {
            let source = resolve_entity(ctx, from).await?;
            let target = resolve_entity(ctx, to).await?;

            let mut new = NewRelationship::new(source.id, target.id, r#type.as_str());
            for (key, value) in meta {
                new = new.with_metadata(key.as_str(), value.clone());
            }

            let relationship = store.create_relationship(new).await?;
            emit(ctx.format, &relationship, |r| {
                println!(
                    "Created relationship: {} -[{}]-> {} ({})",
                    source.name, r.relationship_type, target.name, r.id
                );
            })?;
        }
        RelationCommands::Get { id } => {
            let relationship = store.require_relationship(id).await?;
            emit(ctx.format, &relationship, |r| {
                println!("Relationship: {}", r.id);
                println!("  Source: {}", r.source_id);
                println!("  Target: {}", r.target_id);
                println!("  Type: {}", r.relationship_type);
                println!("  Created: {}", r.created_at);
                if !r.metadata.is_empty() {
                    println!("  Metadata:");
                    output::print_metadata(&r.metadata, "    ");
                }
            })?;
        }
        RelationCommands::List {
            entity,
            direction,
            from,
            to,
            r#type,
        } => {
            let mut filter = match entity {
                Some(reference) => {
                    let entity = resolve_entity(ctx, reference).await?;
                    RelationshipFilter::for_entity(entity.id, *direction)
                }
                None => RelationshipFilter::all(),
            };
            if let Some(reference) = from {
                filter = filter.from_source(resolve_entity(ctx, reference).await?.id);
            }
            if let Some(reference) = to {
                filter = filter.to_target(resolve_entity(ctx, reference).await?.id);
            }
            if let Some(t) = r#type {
                filter = filter.with_type(t.as_str());
            }

            let relationships = store.list_relationships(&filter).await?;
            tracing::info!("Found {} relationships", relationships.len());
            emit(ctx.format, &relationships, |list| {
                if list.is_empty() {
                    println!("No relationships found");
                }
                for r in list {
                    println!("  {}", output::relationship_line(r));
                }
            })?;
        }
        RelationCommands::Delete { id } => {
            if store.delete_relationship(id).await? {
                println!("Deleted relationship: {}", id);
            } else {
                anyhow::bail!("Relationship '{}' not found", id);
            }
        }
        RelationCommands::Related {
            entity,
            r#type,
            direction,
        } => {
            let entity = resolve_entity(ctx, entity).await?;
            let relationship_type = r#type.as_deref().map(RelationshipType::from);

            let related = ctx
                .engine
                .traversal()
                .get_related_entities(&entity.id, relationship_type.as_ref(), *direction)
                .await?;
            emit(ctx.format, &related, |list| {
                if list.is_empty() {
                    println!("Nothing related to '{}'", entity.name);
                }
                for item in list {
                    let arrow = if item.relationship.source_id == entity.id {
                        "->"
                    } else {
                        "<-"
                    };
                    println!(
                        "  {} {} [{}]",
                        arrow,
                        output::entity_line(&item.entity),
                        item.relationship.relationship_type
                    );
                }
            })?;
        }
    }

    Ok(())
}
