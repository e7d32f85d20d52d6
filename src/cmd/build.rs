use super::source::{parse_root, CatalogSource};
use anyhow::{anyhow, Result};
use erd_diagram::diagram::{AttributeVisibility, DiagramSummary};
use erd_diagram::meta::NameFilter;
use erd_diagram::{
    BuildOptions, CancellationToken, DefaultDecorator, DiagramCodec, DiagramConfig,
    DiagramContainer, EntityGraphBuilder,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

pub struct BuildArgs {
    pub catalog: CatalogSource,
    pub roots: Vec<String>,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub attributes: Option<String>,
    pub include: Option<String>,
    pub exclude: Option<String>,
    pub exclude_views: bool,
    pub allow_duplicates: bool,
    pub name: Option<String>,
    pub json: bool,
    pub progress: bool,
}

fn split_patterns(list: Option<&str>) -> Vec<String> {
    list.map(|l| {
        l.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

pub fn run(args: BuildArgs) -> Result<()> {
    let start_time = Instant::now();

    let mut config = match args.config {
        Some(ref path) => DiagramConfig::load(path)?,
        None => DiagramConfig::default(),
    };
    if let Some(ref attributes) = args.attributes {
        config.attribute_visibility = attributes
            .parse::<AttributeVisibility>()
            .map_err(|e| anyhow!("{}", e))?;
    }
    if args.include.is_some() || args.exclude.is_some() {
        config.filters.default = NameFilter::new(
            split_patterns(args.include.as_deref()),
            split_patterns(args.exclude.as_deref()),
        );
        config.filters.compile();
    }
    config.exclude_views |= args.exclude_views;
    config.allow_duplicates |= args.allow_duplicates;

    let catalog = Arc::new(args.catalog.load()?);
    let roots = if args.roots.is_empty() {
        catalog.data_sources().to_vec()
    } else {
        args.roots
            .iter()
            .map(|r| parse_root(&catalog, r))
            .collect::<Result<Vec<_>>>()?
    };

    if !args.json {
        eprintln!(
            "Building diagram: {} [{} root(s), attributes: {}]",
            args.catalog.path.display(),
            roots.len(),
            config.attribute_visibility
        );
    }

    let decorator = Arc::new(DefaultDecorator::from(&config));
    let mut container = DiagramContainer::new(catalog.clone(), decorator);
    container.set_name(args.name.clone());

    let pb = if args.progress && !args.json {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} entities {msg}",
            )?
            .progress_chars("█▓▒░  ")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        Some(pb)
    } else {
        None
    };

    let mut builder = EntityGraphBuilder::new(BuildOptions::from(&config));
    if let Some(ref pb) = pb {
        let pb = pb.clone();
        builder = builder.with_progress(move |done, total| {
            pb.set_length(total);
            pb.set_position(done);
        });
    }
    let report = builder.build(&mut container, &roots, &CancellationToken::new());
    if let Some(pb) = pb {
        pb.finish_with_message("done");
    }

    let codec = DiagramCodec::new(catalog.as_ref());
    let saved = codec.save(&container)?;
    match args.output {
        Some(ref path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &saved.xml)?;
        }
        None if !args.json => print!("{}", saved.xml),
        None => {}
    }

    if args.json {
        let mut summary = DiagramSummary::from_container(&container);
        summary.diagnostics.extend(saved.diagnostics);
        println!("{}", summary.to_json());
        return Ok(());
    }

    for diagnostic in report.diagnostics.iter().chain(&saved.diagnostics) {
        eprintln!("Warning: {}", diagnostic);
    }
    eprintln!();
    eprintln!("Diagram built:");
    eprintln!("  Entities: {}", report.entities_added);
    eprintln!("  Relations: {}", report.edges_created);
    if report.duplicates > 0 {
        eprintln!("  Duplicates skipped: {}", report.duplicates);
    }
    if report.pending > 0 {
        eprintln!("  Unresolved references: {}", report.pending);
    }
    if let Some(ref path) = args.output {
        eprintln!("  Output: {}", path.display());
    }
    eprintln!("  Elapsed: {:.3?}", start_time.elapsed());

    Ok(())
}
