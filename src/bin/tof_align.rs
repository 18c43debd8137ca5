// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::Parser;
use std::{fs, path::Path, path::PathBuf, process};

use tof_align::core::error::{AtStage, Error, Result, RunError, Stage};
use tof_align::core::homography::Coefficients;
use tof_align::core::pipeline::{self, PipelineConfig};
use tof_align::dataset::blaze;
use tof_align::misc::interop;

/// Align IR and RGB captures using the depth of a ToF point cloud.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Binary point cloud of the ToF sensor
    #[arg(required_unless_present = "dump_config")]
    point_cloud: Option<PathBuf>,

    /// IR image (8 or 16 bits)
    #[arg(required_unless_present = "dump_config")]
    ir_image: Option<PathBuf>,

    /// RGB image
    #[arg(required_unless_present = "dump_config")]
    rgb_image: Option<PathBuf>,

    /// Directory receiving the tables and aligned images
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,

    /// JSON configuration, missing fields take their default value
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// IR coefficients in the text format of the linear fitting tool
    #[arg(long)]
    ir_coeffs: Option<PathBuf>,

    /// RGB coefficients in the text format of the linear fitting tool
    #[arg(long)]
    rgb_coeffs: Option<PathBuf>,

    /// Also write the IR heat map overlay and the false color depth image
    #[arg(long)]
    composite: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    if let Err(error) = run(&cli) {
        log::error!("{}", error);
        eprintln!("{}", error);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> std::result::Result<(), RunError> {
    let config = load_config(cli).at_stage(Stage::Configuration)?;
    if cli.dump_config {
        let json = serde_json::to_string_pretty(&config)
            .map_err(Error::from)
            .at_stage(Stage::Configuration)?;
        println!("{}", json);
        return Ok(());
    }

    // Guaranteed by clap without --dump-config.
    let (cloud, ir, rgb) = match (&cli.point_cloud, &cli.ir_image, &cli.rgb_image) {
        (Some(cloud), Some(ir), Some(rgb)) => (cloud, ir, rgb),
        _ => return Ok(()),
    };
    let output = config.run_files(cloud, ir, rgb)?;

    let rgb_mat = if cli.composite {
        Some(interop::read_rgb(rgb).at_stage(Stage::LoadImages)?)
    } else {
        None
    };
    let threshold = config.ir_threshold.unwrap_or(0);
    pipeline::write_outputs(&output, &cli.out_dir, rgb_mat.as_ref().map(|m| (m, threshold)))
        .at_stage(Stage::WriteOutputs)
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(path) = &cli.ir_coeffs {
        config.ir_coefficients = read_coefficients(path)?;
    }
    if let Some(path) = &cli.rgb_coeffs {
        config.rgb_coefficients = read_coefficients(path)?;
    }
    config.validate()?;
    Ok(config)
}

fn read_coefficients(path: &Path) -> Result<Coefficients> {
    let coefs = blaze::parse::coefficients(&fs::read_to_string(path)?)?;
    log::info!("Loaded coefficients from {}", path.display());
    Ok(coefs)
}
