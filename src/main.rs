use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use hexmap::{
    config::AppConfig,
    generator::{GenerationRequest, MapGenerator},
    logging,
    render::PngRenderer,
    tables::TerrainTables,
    terrain::TerrainKind,
    web,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Procedural hex terrain map generator")]
struct Cli {
    /// Path to a YAML config file (built-in defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate one map and write it as a PNG
    Generate(GenerateArgs),
    /// Serve the web form front end
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct GenerateArgs {
    /// Number of rows (overrides config)
    #[arg(long)]
    rows: Option<usize>,

    /// Number of columns (overrides config)
    #[arg(long)]
    cols: Option<usize>,

    /// Terrain every cell holds before generation
    #[arg(long)]
    default_terrain: Option<TerrainKind>,

    /// Seed for reproducible output (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Output PNG path
    #[arg(long)]
    output: Option<PathBuf>,

    /// YAML terrain tables replacing the configured ones
    #[arg(long)]
    tables: Option<PathBuf>,

    /// Also write the generated map as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Hex radius in pixels
    #[arg(long)]
    radius: Option<u32>,
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Listen host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides config)
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_yaml(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::default(),
    };
    logging::init_logging(Some(&config.logging));

    match cli.command {
        Command::Generate(args) => generate(config, args),
        Command::Serve(args) => serve(config, args),
    }
}

fn generate(config: AppConfig, args: GenerateArgs) -> Result<()> {
    let tables = match &args.tables {
        Some(path) => TerrainTables::from_yaml(path)
            .with_context(|| format!("loading tables {}", path.display()))?,
        None => config.terrain_tables(),
    };

    let mut request = GenerationRequest::new(
        args.rows.unwrap_or(config.map.rows),
        args.cols.unwrap_or(config.map.cols),
    )
    .with_default_terrain(args.default_terrain.unwrap_or(config.map.default_terrain));
    let seed = args
        .seed
        .or(config.map.seed)
        .unwrap_or_else(rand::random::<u64>);
    request = request.with_seed(seed);

    let output = args.output.unwrap_or(config.output.path);
    let renderer = PngRenderer::new(args.radius.unwrap_or(config.output.hex_radius));
    let generator = MapGenerator::new(Arc::new(tables));

    let map = generator.generate_and_render(&request, &renderer, &output)?;

    if let Some(json_path) = args.json {
        let json = serde_json::to_string_pretty(&map)?;
        fs::write(&json_path, json)
            .with_context(|| format!("writing {}", json_path.display()))?;
        info!(path = %json_path.display(), "map json written");
    }

    println!(
        "Generated {}x{} map (seed {}) -> {}",
        map.rows(),
        map.cols(),
        seed,
        output.display()
    );
    for (terrain, count) in map.terrain_counts() {
        println!("  {terrain:<9} {count}");
    }
    Ok(())
}

fn serve(mut config: AppConfig, args: ServeArgs) -> Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(web::run(config))
}
