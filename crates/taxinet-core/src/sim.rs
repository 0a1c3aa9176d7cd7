// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Simulator-side collaborators: terrain probing and the local coordinate system.
//!
//! Inside X-Plane these wrap `XPLMProbeTerrainXYZ` and `XPLMWorldToLocal`;
//! the implementations here are self-contained and serve the CLI and tests.

use crate::geo::{lon_deg_in_m, LAT_DEG_IN_M};

/// A point in the local planar system: `x` east, `y` up, `z` south.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Conversion between geographic and local planar coordinates.
///
/// Both directions are pure and never fail.
pub trait LocalFrame: Send + Sync {
    fn world_to_local(&self, lat: f64, lon: f64, alt_m: f64) -> LocalPoint;
    /// Returns `(lat, lon, alt_m)`.
    fn local_to_world(&self, p: LocalPoint) -> (f64, f64, f64);
}

/// Equirectangular tangent plane anchored at a reference point.
///
/// Accurate enough within an airport's extent, which is all it is used for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatEarthFrame {
    ref_lat: f64,
    ref_lon: f64,
    lon_scale: f64,
}

impl FlatEarthFrame {
    pub fn new(ref_lat: f64, ref_lon: f64) -> Self {
        Self {
            ref_lat,
            ref_lon,
            lon_scale: lon_deg_in_m(ref_lat),
        }
    }
}

impl LocalFrame for FlatEarthFrame {
    fn world_to_local(&self, lat: f64, lon: f64, alt_m: f64) -> LocalPoint {
        LocalPoint {
            x: (lon - self.ref_lon) * self.lon_scale,
            y: alt_m,
            z: -(lat - self.ref_lat) * LAT_DEG_IN_M,
        }
    }

    fn local_to_world(&self, p: LocalPoint) -> (f64, f64, f64) {
        (
            self.ref_lat - p.z / LAT_DEG_IN_M,
            self.ref_lon + p.x / self.lon_scale,
            p.y,
        )
    }
}

/// Terrain height lookup.
///
/// Implementations may be bound to a particular thread (X-Plane's probes
/// only work on the sim's main thread), hence `&mut self` and no `Sync`.
pub trait GroundProbe {
    /// Ground elevation in meters at the given location, NaN on failure.
    fn ground_altitude(&mut self, lat: f64, lon: f64) -> f64;

    /// Frees any sim-side resources held by the probe.
    fn release(&mut self) {}
}

/// Probe that never finds terrain.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTerrain;

impl GroundProbe for NoTerrain {
    fn ground_altitude(&mut self, _lat: f64, _lon: f64) -> f64 {
        f64::NAN
    }
}

/// Probe reporting the same elevation everywhere.
#[derive(Debug, Clone, Copy)]
pub struct ConstantElevation(pub f64);

impl GroundProbe for ConstantElevation {
    fn ground_altitude(&mut self, _lat: f64, _lon: f64) -> f64 {
        self.0
    }
}

/// Converts the probe's NaN sentinel into an `Option`.
pub(crate) fn probe_at(probe: &mut dyn GroundProbe, lat: f64, lon: f64) -> Option<f64> {
    let alt = probe.ground_altitude(lat, lon);
    alt.is_finite().then_some(alt)
}
