// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::geo::M_PER_NM;

/// Shortest taxiway segment kept when thinning centerlines.
pub const MIN_TAXI_SEGM_LEN_M: f64 = 10.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Tunables of the airport index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxinetConfig {
    /// Snap tolerance, also the margin added around each airport. `<= 0` disables snapping.
    pub snap_taxi_dist_m: f64,
    /// Distance the viewpoint must move before airports are re-read
    pub std_search_distance_m: f64,
    /// Heading tolerance when snapping to an edge
    pub edge_angle_tolerance_deg: f64,
    /// Heading tolerance and maximum turn for landing runway selection
    pub runway_max_heading_diff_deg: f64,
    /// Widens the model's final approach VSI into an acceptable range
    pub runway_vsi_factor: f64,
    /// Approach speed cap as a fraction of flaps-down speed
    pub approach_speed_factor: f64,
}

impl Default for TaxinetConfig {
    fn default() -> Self {
        Self {
            snap_taxi_dist_m: 5.0,
            std_search_distance_m: 15.0 * M_PER_NM,
            edge_angle_tolerance_deg: 20.0,
            runway_max_heading_diff_deg: 15.0,
            runway_vsi_factor: 1.5,
            approach_speed_factor: 0.8,
        }
    }
}

impl TaxinetConfig {
    /// Reads a JSON config. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(io_err)
    }

    pub fn snapping_enabled(&self) -> bool {
        self.snap_taxi_dist_m > 0.0
    }
}
