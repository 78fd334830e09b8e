mod data;
mod dem;
mod errors;
mod etl;
mod paint;
mod projection;

use std::env;
use std::fs::{create_dir_all, File};
use std::io;
use std::path::Path;

use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use crate::errors::Result;
use crate::etl::parse_osm::ParseOsmEtl;
use crate::etl::render_map::RenderMapEtl;
use crate::etl::vector_map::VectorMapEtl;
use crate::etl::Etl;
use crate::projection::Ch1903Projection;

#[derive(Deserialize)]
pub struct UserConfig {
    pub osm_path: String,
    pub hgt_path: String,
    pub dest_path: String,
    pub bottom_left_lon: f64,
    pub bottom_left_lat: f64,
    pub top_right_lon: f64,
    pub top_right_lat: f64,
    pub dpi: f64,
}

fn load_user_config(path: &str) -> UserConfig {
    let file = File::open(path).expect("Could not open config file.");
    serde_json::from_reader(file).expect("Could not parse config.")
}

fn setup_logging() {
    Builder::with_level("info")
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn main() -> Result<()> {
    setup_logging();

    let config_path = env::args().nth(1).unwrap_or_else(|| "config.json".into());
    let user_config = load_user_config(&config_path);
    create_dir_all(&user_config.dest_path)?;
    let output_dir = Path::new(&user_config.dest_path);

    let projection = Ch1903Projection;
    ParseOsmEtl::new(&user_config).process(output_dir)?;
    VectorMapEtl::new(&projection).process(output_dir)?;
    RenderMapEtl::new(&user_config, &projection).process(output_dir)?;

    Ok(())
}
