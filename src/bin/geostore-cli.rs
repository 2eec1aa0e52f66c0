//! geostore command line
//!
//! Thin wrapper over [`geostore::Database`]: every subcommand maps to one
//! store operation and prints its result as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geostore::{
    BoundsQuery, ContainsPointQuery, Database, FeatureId, ImportRequest, NewPoint, RadiusQuery,
    RawParams, StoreConfig, ValueRangeQuery,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "geostore-cli", version)]
#[command(about = "Query and edit a geostore feature database")]
struct Cli {
    /// Data directory (defaults to ./geostore-data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON store configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a point feature
    AddPoint {
        title: String,
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        #[arg(allow_hyphen_values = true)]
        lng: f64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Fetch a point by id
    GetPoint { id: String },
    /// Delete a point by id
    DeletePoint { id: String },
    /// List points, optionally by category
    Points {
        #[arg(long)]
        category: Option<String>,
    },
    /// Points inside a bounding box (wraps the antimeridian when west > east)
    Bounds {
        #[arg(long, allow_hyphen_values = true)]
        north: String,
        #[arg(long, allow_hyphen_values = true)]
        south: String,
        #[arg(long, allow_hyphen_values = true)]
        east: String,
        #[arg(long, allow_hyphen_values = true)]
        west: String,
    },
    /// Points within a radius (km) of a location, nearest first
    Radius {
        #[arg(long, allow_hyphen_values = true)]
        lat: String,
        #[arg(long, allow_hyphen_values = true)]
        lng: String,
        #[arg(long)]
        radius: String,
    },
    /// Import polygons from a GeoJSON FeatureCollection file
    Import {
        file: PathBuf,
        #[arg(long)]
        layer_group: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// List polygons, optionally by category or layer group
    Polygons {
        #[arg(long, conflicts_with = "layer")]
        category: Option<String>,
        #[arg(long)]
        layer: Option<String>,
    },
    /// Polygons whose value lies in [min, max]
    ValueRange {
        #[arg(long, allow_hyphen_values = true)]
        min: String,
        #[arg(long, allow_hyphen_values = true)]
        max: String,
    },
    /// Polygons containing a point
    Contains {
        #[arg(long, allow_hyphen_values = true)]
        lat: String,
        #[arg(long, allow_hyphen_values = true)]
        lng: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("geostore=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = open_database(&cli)?;
    run(&db, cli.command)?;
    db.flush()?;
    Ok(())
}

fn open_database(cli: &Cli) -> Result<Database> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir);
    } else if config.data_dir.is_none() {
        config = config.with_data_dir("geostore-data");
    }
    debug!(data_dir = ?config.data_dir, "opening store");
    Database::open_with_config(config).context("opening store")
}

fn run(db: &Database, command: Commands) -> Result<()> {
    match command {
        Commands::AddPoint {
            title,
            lat,
            lng,
            description,
            category,
        } => {
            let mut attrs = NewPoint::new(title, lat, lng);
            attrs.description = description;
            attrs.category = category;
            print_json(&db.create_point(attrs)?)
        }
        Commands::GetPoint { id } => {
            let query = geostore::ByIdQuery::from_params(&RawParams::new().with("id", id))?;
            print_json(&db.get_point(&query)?)
        }
        Commands::DeletePoint { id } => {
            let id: FeatureId = id.parse()?;
            db.delete_point(&id)?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
        Commands::Points { category } => {
            let points = match category {
                Some(category) => db.points_by_category(&category)?,
                None => db.list_points()?,
            };
            print_json(&points.try_collect()?)
        }
        Commands::Bounds {
            north,
            south,
            east,
            west,
        } => {
            let params = RawParams::from_iter([
                ("north", north),
                ("south", south),
                ("east", east),
                ("west", west),
            ]);
            let query = BoundsQuery::from_params(&params)?;
            print_json(&db.points_in_bounds(&query)?.try_collect()?)
        }
        Commands::Radius { lat, lng, radius } => {
            let params = RawParams::from_iter([("lat", lat), ("lng", lng), ("radius", radius)]);
            let query = RadiusQuery::from_params(&params)?;
            print_json(&db.points_within_radius(&query)?.try_collect()?)
        }
        Commands::Import {
            file,
            layer_group,
            category,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let mut request: ImportRequest = serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", file.display()))?;
            if layer_group.is_some() {
                request.layer_group = layer_group;
            }
            if category.is_some() {
                request.category = category;
            }
            print_json(&db.import_polygons(&request)?)
        }
        Commands::Polygons { category, layer } => {
            let polygons = match (category, layer) {
                (Some(category), _) => db.polygons_by_category(&category)?,
                (None, Some(layer)) => db.polygons_by_layer(&layer)?,
                (None, None) => db.list_polygons()?,
            };
            print_json(&polygons.try_collect()?)
        }
        Commands::ValueRange { min, max } => {
            let params = RawParams::from_iter([("min", min), ("max", max)]);
            let query = ValueRangeQuery::from_params(&params)?;
            print_json(&db.polygons_in_value_range(&query)?.try_collect()?)
        }
        Commands::Contains { lat, lng } => {
            let params = RawParams::from_iter([("lat", lat), ("lng", lng)]);
            let query = ContainsPointQuery::from_params(&params)?;
            print_json(&db.polygons_containing(&query)?.try_collect()?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
