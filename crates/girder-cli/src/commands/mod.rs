//! CLI command implementations

pub mod analyze;
pub mod completions;
pub mod config;
pub mod entity;
pub mod graph;
pub mod io;
pub mod relation;

use girder_core::{Entity, EntityFilter, EntityId, Value};

use crate::AppContext;

/// Find an entity by ULID, or by exact (case-insensitive) name when unambiguous
pub async fn resolve_entity(ctx: &AppContext, reference: &str) -> anyhow::Result<Entity> {
    if let Ok(id) = reference.parse::<EntityId>() {
        if let Some(entity) = ctx.engine.entities().get_entity(&id).await? {
            return Ok(entity);
        }
    }

    let filter = EntityFilter::all().with_name(reference);
    let mut matches: Vec<Entity> = ctx
        .engine
        .entities()
        .list_entities(&filter)
        .await?
        .into_iter()
        .filter(|e| e.name.eq_ignore_ascii_case(reference))
        .collect();

    match matches.len() {
        0 => anyhow::bail!("Entity '{}' not found", reference),
        1 => Ok(matches.remove(0)),
        n => anyhow::bail!(
            "'{}' matches {} entities; use an id instead:\n{}",
            reference,
            n,
            matches
                .iter()
                .map(|e| format!("  {}", crate::output::entity_line(e)))
                .collect::<Vec<_>>()
                .join("\n")
        ),
    }
}

/// Parse `key=value`; the value is read as JSON when it parses, else as a string
pub fn parse_pair(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    Ok((key.to_string(), Value::parse_literal(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair() {
        let (key, value) = parse_pair("floor=3").unwrap();
        assert_eq!(key, "floor");
        assert_eq!(value.as_f64(), Some(3.0));

        let (_, value) = parse_pair("label=north wing").unwrap();
        assert_eq!(value.as_str(), Some("north wing"));

        let (_, value) = parse_pair("note=a=b").unwrap();
        assert_eq!(value.as_str(), Some("a=b"));

        assert!(parse_pair("novalue").is_err());
        assert!(parse_pair("=1").is_err());
    }
}
