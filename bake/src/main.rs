use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use water::{FlatTerrain, TerrainSampler};

use crate::files::load_from_file::{load_heightmap, load_manifest};
use crate::init::BakeSettings;

mod files;
mod init;

/// Precomputes the shoreline tables of every water surface in a manifest.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// RON manifest listing the water surfaces
    #[arg(short, long)]
    manifest: PathBuf,

    /// RON heightmap to sample; flat ground at `ground_height` otherwise
    #[arg(short, long)]
    terrain: Option<PathBuf>,

    #[arg(short, long, default_value_t = -10.0, allow_hyphen_values = true)]
    ground_height: f32,

    /// Recompute tables even when a current file exists
    #[arg(short, long)]
    force: bool,

    /// Where to write the RON bake report
    #[arg(short, long)]
    report: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let manifest = match load_manifest(&args.manifest) {
        Ok(manifest) => manifest,
        Err(err) => {
            eprintln!("Error: could not load {}: {err}", args.manifest.display());
            std::process::exit(1);
        }
    };

    let terrain: Arc<dyn TerrainSampler> = match &args.terrain {
        Some(path) => match load_heightmap(path) {
            Ok(heightmap) => Arc::new(heightmap),
            Err(err) => {
                eprintln!("Error: could not load {}: {err}", path.display());
                std::process::exit(1);
            }
        },
        None => Arc::new(FlatTerrain {
            height: args.ground_height,
        }),
    };

    let exit = init::init(
        manifest.surfaces,
        terrain,
        BakeSettings {
            force: args.force,
            report_path: args.report,
        },
    );

    if exit.is_error() {
        std::process::exit(1);
    }
}
