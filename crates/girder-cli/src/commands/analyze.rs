//! Analytics commands

use clap::{Args, Subcommand};

use crate::commands::resolve_entity;
use crate::output::{self, emit};
use crate::AppContext;
use girder_engine::{DeviceState, StatusSummary};

#[derive(Args)]
pub struct AnalyzeArgs {
    #[command(subcommand)]
    pub command: AnalyzeCommands,
}

#[derive(Subcommand)]
pub enum AnalyzeCommands {
    /// Nodes and edges of the graph
    Topology {
        /// Only entities of this type (and edges between them)
        #[arg(short = 't', long)]
        r#type: Option<String>,
    },
    /// Everything affected if an entity fails
    Impact {
        /// Entity id or name
        entity: String,
    },
    /// Aggregated metrics over an entity's subtree
    Metrics {
        /// Entity id or name
        entity: String,
    },
    /// Floors, rooms and device status of a building
    Building {
        /// Building id or name
        entity: String,
    },
    /// Where every device sits in the containment hierarchy
    Locations,
    /// Devices sharing the container of a device
    Correlated {
        /// Device UUID
        device_uuid: String,
    },
    /// Global counts
    Stats,
    /// Entities without any relationship
    Orphans,
}

fn summary_line(summary: &StatusSummary) -> String {
    format!(
        "{} devices: {} online, {} offline, {} unknown",
        summary.total, summary.online, summary.offline, summary.unknown
    )
}

fn print_devices(devices: &[DeviceState], indent: &str) {
    for state in devices {
        println!(
            "{}{} [{}]",
            indent,
            output::entity_line(&state.device),
            state.status.as_str()
        );
    }
}

pub async fn run(args: &AnalyzeArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let analytics = ctx.engine.analytics();

    match &args.command {
        AnalyzeCommands::Topology { r#type } => {
            let topology = analytics.get_topology(r#type.as_deref()).await?;
            emit(ctx.format, &topology, |t| {
                println!("Nodes ({}):", t.nodes.len());
                for node in &t.nodes {
                    println!("  {}", output::entity_line(node));
                }
                println!("Edges ({}):", t.edges.len());
                for edge in &t.edges {
                    println!("  {}", output::relationship_line(edge));
                }
            })?;
        }
        AnalyzeCommands::Impact { entity } => {
            let entity = resolve_entity(ctx, entity).await?;
            let report = analytics.analyze_impact(&entity.id).await?;
            emit(ctx.format, &report, |r| {
                if r.impacted.is_empty() {
                    println!("Nothing depends on or sits inside '{}'", r.source.name);
                    return;
                }
                println!("Impact of '{}' ({} entities):", r.source.name, r.impacted.len());
                for item in &r.impacted {
                    println!(
                        "  [{}] {} ({:?})",
                        item.depth,
                        output::entity_line(&item.entity),
                        item.reason
                    );
                }
            })?;
        }
        AnalyzeCommands::Metrics { entity } => {
            let entity = resolve_entity(ctx, entity).await?;
            let metrics = analytics.get_aggregate_metrics(&entity.id).await?;
            emit(ctx.format, &metrics, |m| {
                println!("{}: {} entities", entity.name, m.entity_count);
                println!("  {}", summary_line(&m.devices));
                for (name, metric) in &m.metrics {
                    println!(
                        "  {} = {} ({} of {} samples)",
                        name, metric.value, metric.aggregation, metric.samples
                    );
                }
            })?;
        }
        AnalyzeCommands::Building { entity } => {
            let entity = resolve_entity(ctx, entity).await?;
            let status = analytics.get_building_status(&entity.id).await?;
            emit(ctx.format, &status, |s| {
                println!("{}: {}", s.building.name, summary_line(&s.summary));
                for floor in &s.floors {
                    println!("  {}: {}", floor.floor.name, summary_line(&floor.summary));
                    print_devices(&floor.devices, "    ");
                    for room in &floor.rooms {
                        println!("    {}: {}", room.room.name, summary_line(&room.summary));
                        print_devices(&room.devices, "      ");
                    }
                }
                for room in &s.rooms {
                    println!("  {}: {}", room.room.name, summary_line(&room.summary));
                    print_devices(&room.devices, "    ");
                }
            })?;
        }
        AnalyzeCommands::Locations => {
            let locations = analytics.get_device_locations().await?;
            emit(ctx.format, &locations, |list| {
                if list.is_empty() {
                    println!("No devices found");
                }
                for location in list {
                    let path = location.display_path();
                    println!(
                        "  {}  {}",
                        output::entity_line(&location.device),
                        if path.is_empty() { "(unplaced)" } else { path.as_str() }
                    );
                }
            })?;
        }
        AnalyzeCommands::Correlated { device_uuid } => {
            let devices = analytics.find_correlated_devices(device_uuid).await?;
            emit(ctx.format, &devices, |list| {
                output::print_entities(list, "No correlated devices")
            })?;
        }
        AnalyzeCommands::Stats => {
            let stats = analytics.get_statistics().await?;
            emit(ctx.format, &stats, |s| {
                println!("Entities: {}", s.total_entities);
                for (t, n) in &s.entities_by_type {
                    println!("  {:<16} {}", t, n);
                }
                println!("Relationships: {}", s.total_relationships);
                for (t, n) in &s.relationships_by_type {
                    println!("  {:<16} {}", t, n);
                }
            })?;
        }
        AnalyzeCommands::Orphans => {
            let orphans = analytics.find_orphaned_entities().await?;
            emit(ctx.format, &orphans, |list| {
                output::print_entities(list, "No orphaned entities")
            })?;
        }
    }

    Ok(())
}
