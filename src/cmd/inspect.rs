use super::source::CatalogSource;
use anyhow::{bail, Result};
use erd_diagram::diagram::{DiagramSummary, EdgeKind};
use erd_diagram::{CancellationToken, DefaultDecorator, DiagramCodec, DiagramContainer};
use std::path::PathBuf;
use std::sync::Arc;

pub fn run(
    diagram: PathBuf,
    catalog: CatalogSource,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    if !diagram.exists() {
        bail!("diagram file does not exist: {}", diagram.display());
    }

    let catalog = Arc::new(catalog.load()?);
    let mut container = DiagramContainer::new(catalog.clone(), Arc::new(DefaultDecorator::default()));
    let codec = DiagramCodec::new(catalog.as_ref());
    let report = codec.load_file(&diagram, &mut container, &CancellationToken::new())?;

    let mut save_diagnostics = Vec::new();
    if let Some(ref path) = output {
        save_diagnostics = codec.save_to_file(&container, path)?;
    }

    let summary = DiagramSummary::from_container(&container);
    if json {
        let mut summary = summary;
        summary.diagnostics.extend(save_diagnostics);
        println!("{}", summary.to_json());
        return Ok(());
    }

    println!("Diagram: {}", summary.name.as_deref().unwrap_or("(unnamed)"));
    println!();
    println!("Entities ({}):", summary.entities.len());
    for entity in &summary.entities {
        let mut line = format!("  {}", entity.full_name);
        if let Some(ref alias) = entity.alias {
            line.push_str(&format!(" as {}", alias));
        }
        if entity.primary {
            line.push_str(" [primary]");
        }
        match entity.position {
            Some((x, y)) => line.push_str(&format!(" @ {},{}", x, y)),
            None => line.push_str(" (needs layout)"),
        }
        println!("{}", line);
    }
    println!();
    println!("Relations ({}):", summary.relations.len());
    for relation in &summary.relations {
        let columns: Vec<String> = relation
            .columns
            .iter()
            .map(|(from, to)| format!("{} -> {}", from, to))
            .collect();
        let kind = match relation.kind {
            EdgeKind::Physical => "",
            EdgeKind::Logical => " (logical)",
        };
        println!(
            "  {}{}: {} -> {} [{}]{}",
            relation.name,
            kind,
            relation.from_table,
            relation.to_table,
            columns.join(", "),
            if relation.dangling { " dangling" } else { "" }
        );
    }
    if summary.notes > 0 {
        println!();
        println!("Notes: {}", summary.notes);
    }

    let diagnostics: Vec<&String> = report.diagnostics.iter().chain(&save_diagnostics).collect();
    if !diagnostics.is_empty() {
        eprintln!();
        for diagnostic in diagnostics {
            eprintln!("Warning: {}", diagnostic);
        }
    }
    if let Some(ref path) = output {
        eprintln!("Saved: {}", path.display());
    }
    Ok(())
}
