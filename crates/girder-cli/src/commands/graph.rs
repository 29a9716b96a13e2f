//! Traversal commands

use clap::{Args, Subcommand};

use crate::commands::resolve_entity;
use crate::output::{self, emit};
use crate::AppContext;
use girder_core::{Direction, PathQuery, RelationshipType};

#[derive(Args)]
pub struct GraphArgs {
    #[command(subcommand)]
    pub command: GraphCommands,
}

#[derive(Subcommand)]
pub enum GraphCommands {
    /// Direct CONTAINS children
    Children {
        /// Entity id or name
        entity: String,
    },
    /// The CONTAINS parent
    Parent {
        /// Entity id or name
        entity: String,
    },
    /// Everything contained, transitively
    Descendants {
        /// Entity id or name
        entity: String,
        /// Maximum depth
        #[arg(long)]
        depth: Option<u32>,
    },
    /// Containers up to the root
    Ancestors {
        /// Entity id or name
        entity: String,
        /// Maximum depth
        #[arg(long)]
        depth: Option<u32>,
    },
    /// Entities that depend on this one
    Dependents {
        /// Entity id or name
        entity: String,
        /// Maximum depth
        #[arg(long)]
        depth: Option<u32>,
    },
    /// Entities this one depends on
    Dependencies {
        /// Entity id or name
        entity: String,
        /// Maximum depth
        #[arg(long)]
        depth: Option<u32>,
    },
    /// Containment tree rooted at an entity
    Tree {
        /// Entity id or name
        entity: String,
        /// Maximum depth
        #[arg(long)]
        depth: Option<u32>,
    },
    /// Shortest path between two entities
    Path {
        /// Starting entity
        from: String,
        /// Target entity
        to: String,
        /// Maximum number of hops
        #[arg(long)]
        depth: Option<u32>,
        /// Direction: outgoing, incoming, both
        #[arg(long, default_value = "both")]
        direction: Direction,
        /// Follow only these relationship types (comma-separated)
        #[arg(short = 't', long, value_delimiter = ',')]
        types: Vec<String>,
    },
}

pub async fn run(args: &GraphArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let traversal = ctx.engine.traversal();
    let config = ctx.engine.config();

    match &args.command {
        GraphCommands::Children { entity } => {
            let entity = resolve_entity(ctx, entity).await?;
            let children = traversal.get_children(&entity.id).await?;
            emit(ctx.format, &children, |list| {
                output::print_entities(list, &format!("'{}' contains nothing", entity.name))
            })?;
        }
        GraphCommands::Parent { entity } => {
            let entity = resolve_entity(ctx, entity).await?;
            let parent = traversal.get_parent(&entity.id).await?;
            emit(ctx.format, &parent, |parent| match parent {
                Some(p) => println!("{}", output::entity_line(p)),
                None => println!("'{}' has no parent", entity.name),
            })?;
        }
        GraphCommands::Descendants { entity, depth } => {
            let entity = resolve_entity(ctx, entity).await?;
            let found = traversal
                .get_descendants(&entity.id, config.depth(*depth))
                .await?;
            emit(ctx.format, &found, |list| {
                output::print_with_depth(list, &format!("'{}' contains nothing", entity.name))
            })?;
        }
        GraphCommands::Ancestors { entity, depth } => {
            let entity = resolve_entity(ctx, entity).await?;
            let found = traversal
                .get_ancestors(&entity.id, config.depth(*depth))
                .await?;
            emit(ctx.format, &found, |list| {
                output::print_with_depth(list, &format!("'{}' has no ancestors", entity.name))
            })?;
        }
        GraphCommands::Dependents { entity, depth } => {
            let entity = resolve_entity(ctx, entity).await?;
            let found = traversal
                .get_dependents(&entity.id, config.depth(*depth))
                .await?;
            emit(ctx.format, &found, |list| {
                output::print_with_depth(list, &format!("Nothing depends on '{}'", entity.name))
            })?;
        }
        GraphCommands::Dependencies { entity, depth } => {
            let entity = resolve_entity(ctx, entity).await?;
            let found = traversal
                .get_dependencies(&entity.id, config.depth(*depth))
                .await?;
            emit(ctx.format, &found, |list| {
                output::print_with_depth(list, &format!("'{}' has no dependencies", entity.name))
            })?;
        }
        GraphCommands::Tree { entity, depth } => {
            let entity = resolve_entity(ctx, entity).await?;
            let tree = traversal
                .build_hierarchy_tree(&entity.id, config.depth(*depth))
                .await?
                .ok_or_else(|| anyhow::anyhow!("Entity '{}' not found", entity.id))?;
            emit(ctx.format, &tree, |tree| output::print_tree(tree, 0))?;
        }
        GraphCommands::Path {
            from,
            to,
            depth,
            direction,
            types,
        } => {
            let source = resolve_entity(ctx, from).await?;
            let target = resolve_entity(ctx, to).await?;

            let query = PathQuery::new(source.id, target.id)
                .with_depth(config.depth(*depth))
                .with_direction(*direction)
                .filter_relationship_types(
                    types
                        .iter()
                        .map(|t| RelationshipType::from(t.as_str()))
                        .collect(),
                );

            let path = traversal.find_path(&query).await?;
            emit(ctx.format, &path, |path| match path {
                Some(path) => {
                    println!("Path ({} hops):", path.length());
                    for step in &path.steps {
                        match &step.via {
                            Some(rel) => println!(
                                "  -[{}]- {}",
                                rel.relationship_type,
                                output::entity_line(&step.entity)
                            ),
                            None => println!("  {}", output::entity_line(&step.entity)),
                        }
                    }
                }
                None => println!("No path from '{}' to '{}'", source.name, target.name),
            })?;
        }
    }

    Ok(())
}
