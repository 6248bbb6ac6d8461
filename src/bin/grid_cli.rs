//! Scenario grid command line interface
//!
//! Parses scenario files and builds their road network.
//!
//! # Usage
//!
//! ```bash
//! # Check that a scenario reads cleanly
//! grid_cli parse --file highway.scn
//!
//! # Build the network and dump it as JSON
//! grid_cli build --file highway.scn -o json
//!
//! # List nodes with their incident links
//! cat highway.scn | grid_cli nodes
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use freeway_grid::{
    build_network, parse_scenario_named, BuildConfig, ConfigLoader, NodeBinding, NodeId,
    RoadNetwork, ScenarioGrid,
};

#[derive(Parser)]
#[command(name = "grid_cli")]
#[command(version)]
#[command(about = "Build road networks from freeway scenario grids")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: json, text, or pretty (default)
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,

    /// Build configuration file (defaults to FREEWAY_GRID_CONFIG, then config/build.yaml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Read and validate a scenario without building the network
    Parse {
        /// Input file (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Build the road network (links, nodes and geometry)
    Build {
        /// Input file (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Build the network and list its nodes
    Nodes {
        /// Input file (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse { file } => cmd_parse(file, cli.format),
        Commands::Build { file } => cmd_build(file, cli.config, cli.format),
        Commands::Nodes { file } => cmd_nodes(file, cli.config, cli.format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                let output = serde_json::json!({ "success": false, "error": format!("{:#}", e) });
                println!("{}", output);
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn cmd_parse(file: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let grid = read_grid(file)?;

    match format {
        OutputFormat::Json => print_json(&grid)?,
        OutputFormat::Text | OutputFormat::Pretty => {
            println!(
                "{} {} section(s), {} lane(s), {} source(s), {} sink(s)",
                "OK".green(),
                grid.section_count(),
                grid.lane_count(),
                grid.sources().len(),
                grid.sinks().len()
            );
            if let Some(version) = &grid.version {
                println!("  version {}", version);
            }
            println!("  length {:.1} m", grid.length());
        }
    }
    Ok(())
}

fn cmd_build(file: Option<PathBuf>, config: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let network = read_network(file, config)?;

    match format {
        OutputFormat::Json => print_json(&network)?,
        OutputFormat::Text | OutputFormat::Pretty => {
            println!(
                "{} {} link(s), {} node(s)",
                "OK".green(),
                network.links().len(),
                network.nodes().len()
            );
            for link in network.links() {
                let name = |id: Option<NodeId>| {
                    id.and_then(|id| network.node(id))
                        .map(|n| n.name().to_string())
                        .unwrap_or_default()
                };
                println!(
                    "  link {:>3}  section {:>3}  lanes {}..={}  {} -> {}",
                    link.id.to_string().cyan(),
                    link.section,
                    link.from_lane,
                    link.to_lane,
                    name(link.from_node()),
                    name(link.to_node())
                );
                if format == OutputFormat::Pretty {
                    if let Some(geometry) = network.geometry(link.id) {
                        for lane in &geometry.lanes {
                            println!(
                                "        lane {:>2}  {:>7.2} -> {:>7.2}  width {:.2} -> {:.2}",
                                lane.lane,
                                lane.start_offset,
                                lane.end_offset,
                                lane.start_width,
                                lane.end_width
                            );
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn cmd_nodes(file: Option<PathBuf>, config: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let network = read_network(file, config)?;

    match format {
        OutputFormat::Json => print_json(&network.nodes())?,
        OutputFormat::Text | OutputFormat::Pretty => {
            for node in network.nodes() {
                let role = match node.binding() {
                    Some(NodeBinding::Source(i)) => format!("source {}", i).as_str().green(),
                    Some(NodeBinding::Sink(i)) => format!("sink {}", i).as_str().yellow(),
                    None => "node".dimmed(),
                };
                println!(
                    "{:<20} {:<10} in {:?} out {:?}",
                    node.name().bold(),
                    role,
                    node.in_links().iter().map(|l| l.0).collect::<Vec<_>>(),
                    node.out_links().iter().map(|l| l.0).collect::<Vec<_>>()
                );
            }
        }
    }
    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

fn read_input(file: Option<&PathBuf>) -> Result<(String, String)> {
    match file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read '{}'", path.display()))?;
            Ok((text, path.display().to_string()))
        }
        None => {
            if io::stdin().is_terminal() {
                return Err(anyhow!(
                    "No input provided. Use --file or pipe input via stdin."
                ));
            }
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok((buffer, "<stdin>".to_string()))
        }
    }
}

fn read_grid(file: Option<PathBuf>) -> Result<ScenarioGrid> {
    let (text, name) = read_input(file.as_ref())?;
    parse_scenario_named(&text, &name).with_context(|| format!("Failed to read scenario {}", name))
}

fn load_config(path: Option<PathBuf>) -> Result<BuildConfig> {
    let loader = match path {
        Some(path) => ConfigLoader::new(path),
        None => ConfigLoader::from_env(),
    };
    loader.load()
}

fn read_network(file: Option<PathBuf>, config: Option<PathBuf>) -> Result<RoadNetwork> {
    let config = load_config(config)?;
    let grid = read_grid(file)?;
    build_network(&grid, &config).context("Failed to build road network")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("JSON serialization failed")?
    );
    Ok(())
}
