// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use log::{debug, info, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use taxinet_core::geo::{KT_PER_M_PER_S, M_PER_FT, M_PER_NM};
use taxinet_core::{
    AircraftModel, AircraftState, ConstantElevation, FlatEarthFrame, GroundProbe, NoTerrain,
    Position, RefreshOutcome, TaxiNet, TaxinetConfig, XPlaneSource,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to X-Plane root
    #[arg(short, long, env = "XPLANE_ROOT")]
    root: Option<PathBuf>,

    /// Settings file, defaults to taxinet.json in the user's config directory
    #[arg(short, long, env = "TAXINET_CONFIG")]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// More log output, repeat for trace level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List airports found around a location
    Airports {
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        #[arg(allow_hyphen_values = true)]
        lon: f64,
        /// Search radius in nautical miles, overrides the configured distance
        #[arg(long)]
        radius_nm: Option<f64>,
    },
    /// Snap a ground position onto the closest runway or taxiway
    Snap {
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        #[arg(allow_hyphen_values = true)]
        lon: f64,
        /// True heading of travel in degrees
        heading: f64,
    },
    /// Pick the runway an approaching aircraft will most likely land on
    Runway {
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        #[arg(allow_hyphen_values = true)]
        lon: f64,
        /// Altitude in feet MSL
        #[arg(allow_hyphen_values = true)]
        alt_ft: f64,
        /// True heading in degrees
        heading: f64,
        /// Ground speed in knots
        speed_kt: f64,
        /// Ground elevation of the runways in feet, there is no terrain lookup outside the sim
        #[arg(long, allow_hyphen_values = true)]
        ground_elev_ft: f64,
        /// Typical vertical speed on final in ft/min
        #[arg(long, allow_hyphen_values = true, default_value_t = AircraftModel::default().vsi_final_fpm)]
        vsi_fpm: f64,
        /// Max speed with flaps down in knots
        #[arg(long, default_value_t = AircraftModel::default().flaps_down_speed_kt)]
        flaps_kt: f64,
    },
    /// Write the current settings to the settings file
    InitConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = match cli.config {
        Some(p) => p,
        None => default_config_path()?,
    };
    let config = TaxinetConfig::load(&config_path)
        .with_context(|| format!("Failed to load settings from {}", config_path.display()))?;

    if let Commands::InitConfig = cli.command {
        config
            .save(&config_path)
            .with_context(|| format!("Failed to save settings to {}", config_path.display()))?;
        println!("Settings written to {}", config_path.display());
        return Ok(());
    }

    let root = cli
        .root
        .or_else(XPlaneSource::try_find_root)
        .ok_or_else(|| anyhow!("Could not find X-Plane root. Please specify with --root."))?;

    match cli.command {
        Commands::Airports {
            lat,
            lon,
            radius_nm,
        } => {
            let mut config = config;
            if let Some(nm) = radius_nm {
                config.std_search_distance_m = nm * M_PER_NM;
            }
            let net = load_around(&root, config, lat, lon, Box::new(NoTerrain))?;
            list_airports(&net, cli.json)
        }
        Commands::Snap { lat, lon, heading } => {
            let net = load_around(&root, config, lat, lon, Box::new(NoTerrain))?;
            let mut pos = Position::new(lat, lon).with_heading(heading);
            if !net.snap(&mut pos) {
                bail!("No runway or taxiway within reach of {}", pos);
            }
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&pos)?);
            } else {
                println!(
                    "Snapped to {:.7} {:.7} ({:.1} m away)",
                    pos.lat,
                    pos.lon,
                    Position::new(lat, lon).distance_to(&pos)
                );
            }
            Ok(())
        }
        Commands::Runway {
            lat,
            lon,
            alt_ft,
            heading,
            speed_kt,
            ground_elev_ft,
            vsi_fpm,
            flaps_kt,
        } => {
            let probe = Box::new(ConstantElevation(ground_elev_ft * M_PER_FT));
            let net = load_around(&root, config, lat, lon, probe)?;
            let ac = AircraftState {
                target: Position::new(lat, lon)
                    .with_alt_m(alt_ft * M_PER_FT)
                    .with_heading(heading),
                speed_m_s: speed_kt / KT_PER_M_PER_S,
                model: AircraftModel {
                    vsi_final_fpm: vsi_fpm,
                    flaps_down_speed_kt: flaps_kt,
                    ..AircraftModel::default()
                },
            };
            let Some(found) = net.find_landing_runway(&ac) else {
                bail!("No runway matches the approach");
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                println!(
                    "{} runway {} ({:.1} deg off), touchdown at {:.7} {:.7} {:.0} ft",
                    found.airport_id,
                    found.runway_id,
                    found.heading_diff,
                    found.touchdown.lat,
                    found.touchdown.lon,
                    found.touchdown.alt_m / M_PER_FT
                );
            }
            Ok(())
        }
        Commands::InitConfig => Ok(()),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let config = ConfigBuilder::new()
        .add_filter_allow_str("taxinet")
        .build();
    // a second logger is the only failure, nothing to report then
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
}

fn default_config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("org", "StarTuz", "taxinet")
        .ok_or_else(|| anyhow!("Could not determine the user's config directory"))?;
    Ok(dirs.config_dir().join("taxinet.json"))
}

/// Scans once around the location and backfills altitudes and local coordinates.
fn load_around(
    root: &Path,
    config: TaxinetConfig,
    lat: f64,
    lon: f64,
    probe: Box<dyn GroundProbe>,
) -> Result<TaxiNet> {
    let here = Position::new(lat, lon);
    if !here.is_normal() {
        bail!("{} is not a valid location", here);
    }

    let source = Arc::new(XPlaneSource::new(root));
    info!("Using X-Plane at {}", source.root().display());
    let mut net = TaxiNet::new(
        config,
        source,
        Box::new(FlatEarthFrame::new(lat, lon)),
        probe,
    );

    match net.refresh(&here) {
        RefreshOutcome::ScanStarted => {}
        other => bail!("Could not start reading apt.dat files: {:?}", other),
    }
    let report = net
        .wait_for_scan()
        .cloned()
        .context("apt.dat scan did not finish")?;
    if report.files_read == 0 {
        bail!("Could not read any apt.dat file below {}", root.display());
    }
    debug!(
        "Read {} files, {} airports, {} failed",
        report.files_read,
        report.airports_added,
        report.failed_files.len()
    );

    let outcome = net.refresh(&here);
    debug!("Backfill: {:?}", outcome);
    Ok(net)
}

fn list_airports(net: &TaxiNet, json: bool) -> Result<()> {
    let rows: Vec<serde_json::Value> = net.registry().with_airports(|map| {
        map.values()
            .map(|apt| {
                let (lat, lon) = apt.bounds().center();
                serde_json::json!({
                    "id": apt.id(),
                    "runways": apt.runways_string(),
                    "lat": lat,
                    "lon": lon,
                    "elevation_m": apt.elevation_m(),
                    "taxi_nodes": apt.taxi_nodes().len(),
                    "taxiways": apt.taxiway_count(),
                })
            })
            .collect()
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if let Some(report) = net.last_report() {
        println!(
            "Read {} apt.dat files, {} could not be read",
            report.files_read,
            report.failed_files.len()
        );
        for path in &report.failed_files {
            println!("  unreadable: {}", path);
        }
    }
    println!("{} airports:", rows.len());
    for row in &rows {
        println!(
            "  {:<8} {:>4} nodes {:>5} taxiways  {}",
            row["id"].as_str().unwrap_or_default(),
            row["taxi_nodes"],
            row["taxiways"],
            row["runways"].as_str().unwrap_or_default()
        );
    }
    Ok(())
}
