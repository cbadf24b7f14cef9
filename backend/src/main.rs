//! Leaguegrid CLI - extract typed tables from league spreadsheet exports
//!
//! # Main Commands
//!
//! ```bash
//! leaguegrid extract ranking.csv --shape history        # Table as JSON
//! leaguegrid extract week.csv --shape league-standings --format csv
//! leaguegrid compare matchups.json --stats FG%,TO        # W/L/T per pairing
//! leaguegrid serve                                       # HTTP server (port 3000)
//! ```
//!
//! # Other Commands
//!
//! ```bash
//! leaguegrid ingest export.csv                 # Raw grid as JSON
//! leaguegrid leaders history.csv --stat PTS    # Top/bottom entities
//! leaguegrid podiums history.csv               # Best of each league
//! leaguegrid shape list                        # Known table shapes
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use leaguegrid::api::BroadcastLayer;
use leaguegrid::{
    category_leaders, extract_file, ingest_file, matchup_report, podiums, resolve_key, sort_table, AppConfig,
    Direction, Extraction, StatKey, Table, TableShape,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directory used by `shape import` when no shapes directory is configured.
const DEFAULT_SHAPES_DIR: &str = "shapes";

#[derive(Parser)]
#[command(name = "leaguegrid")]
#[command(about = "Extract typed league tables from spreadsheet exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an export into a raw grid and output JSON
    Ingest {
        /// Input file (CSV or GViz JSON)
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract one table from an export
    Extract {
        /// Input file (CSV or GViz JSON)
        input: PathBuf,

        /// Shape name or shape JSON file
        #[arg(short, long)]
        shape: String,

        /// Sort by this column
        #[arg(long)]
        sort: Option<String>,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        #[arg(short, long, value_enum, default_value = "json")]
        format: Format,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score consecutive entities category by category
    Compare {
        input: PathBuf,

        #[arg(short, long, default_value = "league-matchups")]
        shape: String,

        /// Categories to compare (detected when omitted)
        #[arg(long, value_delimiter = ',')]
        stats: Vec<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Best and worst entities for one statistic
    Leaders {
        input: PathBuf,

        #[arg(short, long, default_value = "history")]
        shape: String,

        /// Statistic column
        #[arg(long)]
        stat: String,

        #[arg(long, default_value = "Team")]
        entity: String,

        /// Use the n-th occurrence of a repeated column (`PTS_2` for 2)
        #[arg(long, default_value = "1")]
        variant: usize,

        /// Smaller values are better (ranks, turnovers)
        #[arg(long)]
        lower_is_better: bool,

        #[arg(short = 'n', long, default_value = "5")]
        top: usize,
    },

    /// Best entities of each group
    Podiums {
        input: PathBuf,

        #[arg(short, long, default_value = "history")]
        shape: String,

        #[arg(long, default_value = "League")]
        group: String,

        #[arg(long, default_value = "League Ranking")]
        rank: String,

        #[arg(short = 'n', long, default_value = "3")]
        top: usize,
    },

    /// Manage table shapes
    Shape {
        #[command(subcommand)]
        action: ShapeAction,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: LEAGUEGRID_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum ShapeAction {
    /// List all shapes
    List,

    /// Show one shape as JSON
    Show { name: String },

    /// Import a shape JSON file into the shapes directory
    Import { file: PathBuf },

    /// Delete a user shape
    Delete { name: String },
}

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("leaguegrid=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(BroadcastLayer)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ingest { input, output } => cmd_ingest(&input, output.as_deref()),

        Commands::Extract {
            input,
            shape,
            sort,
            desc,
            format,
            output,
        } => cmd_extract(&config, &input, &shape, sort.as_deref(), desc, format, output.as_deref()),

        Commands::Compare {
            input,
            shape,
            stats,
            output,
        } => cmd_compare(&config, &input, &shape, &stats, output.as_deref()),

        Commands::Leaders {
            input,
            shape,
            stat,
            entity,
            variant,
            lower_is_better,
            top,
        } => cmd_leaders(&config, &input, &shape, &stat, &entity, variant, lower_is_better, top),

        Commands::Podiums {
            input,
            shape,
            group,
            rank,
            top,
        } => cmd_podiums(&config, &input, &shape, &group, &rank, top),

        Commands::Shape { action } => cmd_shape(&config, action),

        Commands::Serve { port } => {
            let mut config = config;
            if let Some(port) = port {
                config.port = port;
            }
            leaguegrid::server::start_server(config).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

fn load(config: &AppConfig, input: &Path, shape: &str) -> Result<Extraction, Box<dyn std::error::Error>> {
    let shape: TableShape = config.catalog().resolve(shape)?;
    info!(input = %input.display(), shape = %shape.name, "extracting");
    Ok(extract_file(input, &shape)?)
}

fn cmd_ingest(input: &Path, output: Option<&Path>) -> CmdResult {
    let ingested = ingest_file(input)?;
    info!(
        kind = ?ingested.kind,
        rows = ingested.grid.len(),
        columns = ingested.grid.width(),
        encoding = ingested.encoding.as_deref().unwrap_or("utf-8"),
        "ingested"
    );
    write_output(&serde_json::to_string_pretty(&ingested)?, output)
}

fn cmd_extract(
    config: &AppConfig,
    input: &Path,
    shape: &str,
    sort: Option<&str>,
    desc: bool,
    format: Format,
    output: Option<&Path>,
) -> CmdResult {
    let mut extraction = load(config, input, shape)?;

    if let Some(key) = sort {
        if !extraction.table.has_header(key) {
            return Err(format!("Unknown sort key: {}", key).into());
        }
        let direction = if desc { Direction::Desc } else { Direction::Asc };
        sort_table(&mut extraction.table, key, direction);
    }

    for skipped in &extraction.diagnostics.skipped {
        eprintln!("   skipped row {}: {}", skipped.row, skipped.reason);
    }
    eprintln!(
        "{} records, {} columns from '{}'",
        extraction.table.len(),
        extraction.table.headers.len(),
        extraction.shape
    );

    let content = match format {
        Format::Json => serde_json::to_string_pretty(&extraction)?,
        Format::Csv => table_to_csv(&extraction.table)?,
    };
    write_output(&content, output)
}

fn cmd_compare(
    config: &AppConfig,
    input: &Path,
    shape: &str,
    stats: &[String],
    output: Option<&Path>,
) -> CmdResult {
    let extraction = load(config, input, shape)?;
    let report = matchup_report(&extraction.table, stats);

    for m in &report.matchups {
        eprintln!(
            "   {} vs {}: {}-{}-{}",
            m.home, m.away, m.record.wins, m.record.losses, m.record.ties
        );
    }
    write_output(&serde_json::to_string_pretty(&report)?, output)
}

#[allow(clippy::too_many_arguments)]
fn cmd_leaders(
    config: &AppConfig,
    input: &Path,
    shape: &str,
    stat: &str,
    entity: &str,
    variant: usize,
    lower_is_better: bool,
    top: usize,
) -> CmdResult {
    let extraction = load(config, input, shape)?;
    let key = resolve_key(&extraction.table, stat, variant);
    let stat = if lower_is_better {
        StatKey::rank(key.as_str())
    } else {
        StatKey::lookup(key.as_str())
    };
    let leaders = category_leaders(&extraction.table, entity, &stat, top);
    println!("{}", serde_json::to_string_pretty(&leaders)?);
    Ok(())
}

fn cmd_podiums(
    config: &AppConfig,
    input: &Path,
    shape: &str,
    group: &str,
    rank: &str,
    top: usize,
) -> CmdResult {
    let extraction = load(config, input, shape)?;
    let podiums = podiums(&extraction.table, group, rank, top);
    println!("{}", serde_json::to_string_pretty(&podiums)?);
    Ok(())
}

fn cmd_shape(config: &AppConfig, action: ShapeAction) -> CmdResult {
    let mut catalog = match &config.shapes_dir {
        Some(dir) => leaguegrid::ShapeCatalog::with_dir(dir),
        None => leaguegrid::ShapeCatalog::with_dir(DEFAULT_SHAPES_DIR),
    };

    match action {
        ShapeAction::List => {
            for shape in catalog.list() {
                let origin = match catalog.origin(&shape.name) {
                    Some(leaguegrid::catalog::Origin::File(path)) => path.display().to_string(),
                    _ => "built-in".to_string(),
                };
                println!("  {:<20} {} ({})", shape.name, shape.description, origin);
            }
        }

        ShapeAction::Show { name } => {
            let shape = catalog.resolve(&name)?;
            println!("{}", shape.to_json()?);
        }

        ShapeAction::Import { file } => {
            let shape = TableShape::from_json(&fs::read_to_string(&file)?)?;
            let name = shape.name.clone();
            let path = catalog.save(shape)?;
            eprintln!("Shape '{}' saved to {}", name, path.display());
        }

        ShapeAction::Delete { name } => {
            catalog.delete(&name)?;
            eprintln!("Shape deleted: {}", name);
        }
    }

    Ok(())
}

fn table_to_csv(table: &Table) -> Result<String, Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.headers.iter().map(|h| h.as_str()))?;
    for record in &table.records {
        writer.write_record(table.headers.iter().map(|h| record.value(h.as_str())))?;
    }
    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    Ok(String::from_utf8(bytes)?)
}

fn write_output(content: &str, path: Option<&Path>) -> CmdResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
