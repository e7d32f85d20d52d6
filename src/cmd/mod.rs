mod build;
mod inspect;
mod source;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "erd-diagram")]
#[command(version)]
#[command(about = "Build and inspect entity-relationship diagrams from database metadata", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a diagram document from a catalog
    Build {
        /// Catalog file: YAML/JSON catalog, or a .sql DDL script
        catalog: PathBuf,

        /// Roots to add, as DATA_SOURCE[:dotted.path] (repeatable; default: every data source)
        #[arg(short, long)]
        root: Vec<String>,

        /// Output diagram file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// YAML diagram configuration (visibility, filters)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Attributes shown on entities: all, keys, primary, none
        #[arg(short, long)]
        attributes: Option<String>,

        /// Only include entities matching these glob patterns (comma-separated)
        #[arg(long)]
        include: Option<String>,

        /// Exclude entities matching these glob patterns (comma-separated)
        #[arg(short, long)]
        exclude: Option<String>,

        /// Skip views while expanding containers
        #[arg(long)]
        exclude_views: bool,

        /// Allow an entity to appear more than once
        #[arg(long)]
        allow_duplicates: bool,

        /// Diagram name stored in the document
        #[arg(short, long)]
        name: Option<String>,

        /// Data source id used for .sql catalogs
        #[arg(long, default_value = "default")]
        data_source: String,

        /// Schema name used for .sql catalogs
        #[arg(long, default_value = "public")]
        schema: String,

        /// Print a JSON summary to stdout instead of status lines
        #[arg(long)]
        json: bool,

        /// Show progress during processing
        #[arg(short, long)]
        progress: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Load a diagram document against a catalog and report its contents
    Inspect {
        /// Diagram document
        diagram: PathBuf,

        /// Catalog file: YAML/JSON catalog, or a .sql DDL script
        #[arg(long)]
        catalog: PathBuf,

        /// Re-save the loaded diagram to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Data source id used for .sql catalogs
        #[arg(long, default_value = "default")]
        data_source: String,

        /// Schema name used for .sql catalogs
        #[arg(long, default_value = "public")]
        schema: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Build {
            catalog,
            root,
            output,
            config,
            attributes,
            include,
            exclude,
            exclude_views,
            allow_duplicates,
            name,
            data_source,
            schema,
            json,
            progress,
            verbose,
        } => {
            init_logging(verbose);
            build::run(build::BuildArgs {
                catalog: source::CatalogSource {
                    path: catalog,
                    data_source,
                    schema,
                },
                roots: root,
                output,
                config,
                attributes,
                include,
                exclude,
                exclude_views,
                allow_duplicates,
                name,
                json,
                progress,
            })
        }
        Commands::Inspect {
            diagram,
            catalog,
            output,
            data_source,
            schema,
            json,
            verbose,
        } => {
            init_logging(verbose);
            inspect::run(
                diagram,
                source::CatalogSource {
                    path: catalog,
                    data_source,
                    schema,
                },
                output,
                json,
            )
        }
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "erd-diagram",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides the level chosen by `--verbose`
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .with_target(false)
        .try_init();
}
