//! Import/Export commands

use std::io::Write;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use clap::{Args, ValueEnum};

use crate::output::{emit, OutputFormat};
use crate::AppContext;
use girder_core::Metadata;
use girder_engine::GraphSnapshot;

/// Export format
#[derive(Clone, Copy, Default, ValueEnum)]
pub enum ExportFormat {
    /// Full snapshot, importable
    #[default]
    Json,
    Csv,
    #[value(name = "graphml")]
    GraphML,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Input file (JSON snapshot)
    pub file: PathBuf,

    /// Merge with existing data (default: error if the graph is not empty)
    #[arg(long)]
    pub merge: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Export format
    #[arg(long = "as", value_enum, default_value = "json")]
    pub export_format: ExportFormat,
}

pub async fn run_import(args: &ImportArgs, ctx: &AppContext) -> anyhow::Result<()> {
    tracing::info!("Importing from {:?}", args.file);

    let content = std::fs::read_to_string(&args.file)?;
    let snapshot: GraphSnapshot = serde_json::from_str(&content)?;
    tracing::debug!("Snapshot version: {}", snapshot.version);

    let summary = match ctx.engine.import_snapshot(&snapshot, args.merge).await {
        Err(err) if err.kind() == girder_core::ErrorKind::Conflict && !args.merge => {
            anyhow::bail!("{}. Use --merge to add to existing data.", err)
        }
        other => other?,
    };

    emit(ctx.format, &summary, |s| {
        println!(
            "Imported {} entities, {} relationships and {} properties from {:?}",
            s.entities, s.relationships, s.properties, args.file
        );
        if s.skipped_relationships > 0 {
            println!("  skipped {} existing relationships", s.skipped_relationships);
        }
    })?;

    Ok(())
}

pub async fn run_export(args: &ExportArgs, ctx: &AppContext) -> anyhow::Result<()> {
    tracing::info!("Exporting data");

    let snapshot = ctx.engine.export_snapshot().await?;

    let content = match args.export_format {
        ExportFormat::Json => serde_json::to_string_pretty(&snapshot)?,
        ExportFormat::Csv => export_to_csv(&snapshot),
        ExportFormat::GraphML => export_to_graphml(&snapshot),
    };

    if let Some(ref path) = args.output {
        // Write with secure permissions (0o600 = owner read/write only)
        #[cfg(unix)]
        {
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)?;
            file.write_all(content.as_bytes())?;
        }
        #[cfg(not(unix))]
        {
            std::fs::write(path, &content)?;
        }
        if ctx.format == OutputFormat::Table {
            println!(
                "Exported {} entities and {} relationships to {:?}",
                snapshot.entities.len(),
                snapshot.relationships.len(),
                path
            );
        }
    } else {
        println!("{}", content);
    }

    Ok(())
}

fn metadata_json(metadata: &Metadata) -> String {
    if metadata.is_empty() {
        return String::new();
    }
    serde_json::to_string(metadata).unwrap_or_default()
}

fn export_to_csv(snapshot: &GraphSnapshot) -> String {
    let mut output = String::new();

    output.push_str("# Entities\n");
    output.push_str("id,type,name,device_uuid,metadata\n");
    for entity in &snapshot.entities {
        output.push_str(&format!(
            "{},{},{},{},{}\n",
            entity.id,
            csv_escape(entity.entity_type.as_str()),
            csv_escape(&entity.name),
            csv_escape(entity.device_uuid.as_deref().unwrap_or("")),
            csv_escape(&metadata_json(&entity.metadata))
        ));
    }

    output.push_str("\n# Relationships\n");
    output.push_str("id,source,target,type\n");
    for rel in &snapshot.relationships {
        output.push_str(&format!(
            "{},{},{},{}\n",
            rel.id,
            rel.source_id,
            rel.target_id,
            csv_escape(rel.relationship_type.as_str())
        ));
    }

    output
}

/// Escape a string for CSV output with formula injection protection
fn csv_escape(s: &str) -> String {
    // Prefix dangerous chars with ' to prevent spreadsheet interpretation
    let needs_formula_protection = s
        .chars()
        .next()
        .map(|c| matches!(c, '=' | '+' | '-' | '@' | '\t' | '\r'))
        .unwrap_or(false);

    let escaped = if needs_formula_protection {
        format!("'{}", s)
    } else {
        s.to_string()
    };

    if escaped.contains(',') || escaped.contains('"') || escaped.contains('\n') {
        format!("\"{}\"", escaped.replace('"', "\"\""))
    } else {
        escaped
    }
}

fn export_to_graphml(snapshot: &GraphSnapshot) -> String {
    let mut xml = String::new();

    xml.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns"
         xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
         xsi:schemaLocation="http://graphml.graphdrawing.org/xmlns
         http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd">
  <key id="d0" for="node" attr.name="type" attr.type="string"/>
  <key id="d1" for="node" attr.name="name" attr.type="string"/>
  <key id="d2" for="node" attr.name="device_uuid" attr.type="string"/>
  <key id="d3" for="edge" attr.name="type" attr.type="string"/>
  <graph id="girder" edgedefault="directed">
"#,
    );

    for entity in &snapshot.entities {
        xml.push_str(&format!(
            "    <node id=\"{}\">\n      <data key=\"d0\">{}</data>\n      <data key=\"d1\">{}</data>\n",
            entity.id,
            xml_escape(entity.entity_type.as_str()),
            xml_escape(&entity.name)
        ));
        if let Some(uuid) = &entity.device_uuid {
            xml.push_str(&format!(
                "      <data key=\"d2\">{}</data>\n",
                xml_escape(uuid)
            ));
        }
        xml.push_str("    </node>\n");
    }

    for rel in &snapshot.relationships {
        xml.push_str(&format!(
            "    <edge id=\"{}\" source=\"{}\" target=\"{}\">\n      <data key=\"d3\">{}</data>\n    </edge>\n",
            rel.id,
            rel.source_id,
            rel.target_id,
            xml_escape(rel.relationship_type.as_str())
        ));
    }

    xml.push_str("  </graph>\n</graphml>\n");
    xml
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use girder_core::{Entity, Relationship, RelationshipType};

    fn snapshot() -> GraphSnapshot {
        let room = Entity::new("room", "R&D, west").with_metadata("area", 40.0);
        let sensor = Entity::new("device", "=SUM(A1)").with_device_uuid("abc");
        let rel = Relationship::new(room.id, sensor.id, RelationshipType::Contains);
        GraphSnapshot {
            version: 1,
            exported_at: Utc::now(),
            entities: vec![room, sensor],
            relationships: vec![rel],
            properties: Vec::new(),
        }
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("=1+1"), "'=1+1");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_export() {
        let csv = export_to_csv(&snapshot());
        assert!(csv.contains("\"R&D, west\""));
        assert!(csv.contains("'=SUM(A1)"));
        assert!(csv.contains(",CONTAINS\n"));
    }

    #[test]
    fn test_graphml_export() {
        let data = snapshot();
        let xml = export_to_graphml(&data);
        assert!(xml.contains("R&amp;D, west"));
        assert!(xml.contains("<data key=\"d2\">abc</data>"));
        assert!(xml.contains(&format!("source=\"{}\"", data.entities[0].id)));
        assert!(xml.ends_with("</graphml>\n"));
    }
}
