//! Output formatting utilities

use clap::ValueEnum;
use girder_core::{Entity, EntityWithDepth, HierarchyNode, Metadata, Relationship};
use serde::{Deserialize, Serialize};

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

/// Print `data` as pretty JSON, or hand it to `table` for human output
pub fn emit<T: Serialize>(
    format: OutputFormat,
    data: &T,
    table: impl FnOnce(&T),
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
        OutputFormat::Table => table(data),
    }
    Ok(())
}

pub fn entity_line(entity: &Entity) -> String {
    format!("{} ({}) {}", entity.name, entity.entity_type, entity.id)
}

pub fn relationship_line(rel: &Relationship) -> String {
    format!(
        "{} -[{}]-> {}  {}",
        rel.source_id, rel.relationship_type, rel.target_id, rel.id
    )
}

pub fn print_metadata(metadata: &Metadata, indent: &str) {
    for (key, value) in metadata {
        println!("{}{}: {}", indent, key, value);
    }
}

pub fn print_entity(entity: &Entity) {
    println!("Entity: {}", entity.name);
    println!("  ID: {}", entity.id);
    println!("  Type: {}", entity.entity_type);
    if let Some(uuid) = &entity.device_uuid {
        println!("  Device UUID: {}", uuid);
    }
    println!("  Created: {}", entity.created_at);
    println!("  Modified: {}", entity.modified_at);
    if !entity.metadata.is_empty() {
        println!("  Metadata:");
        print_metadata(&entity.metadata, "    ");
    }
}

pub fn print_entities(entities: &[Entity], empty: &str) {
    if entities.is_empty() {
        println!("{}", empty);
        return;
    }
    println!("{} found:", entities.len());
    for entity in entities {
        println!("  {}", entity_line(entity));
    }
}

pub fn print_with_depth(items: &[EntityWithDepth], empty: &str) {
    if items.is_empty() {
        println!("{}", empty);
        return;
    }
    for item in items {
        println!("  [{}] {}", item.depth, entity_line(&item.entity));
    }
}

pub fn print_tree(node: &HierarchyNode, level: usize) {
    println!("{}{}", "  ".repeat(level), entity_line(&node.entity));
    for child in &node.children {
        print_tree(child, level + 1);
    }
}
