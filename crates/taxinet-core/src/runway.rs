// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Picks the runway an approaching aircraft most likely lands on.

use crate::config::TaxinetConfig;
use crate::geo::{
    angle_between, distance_between, fold_heading, heading_difference, heading_normalize,
    FlightPhase, Position, KT_PER_M_PER_S, M_S_PER_FT_MIN,
};
use crate::graph::{Airport, EdgeKind};
use log::debug;
use serde::{Deserialize, Serialize};

/// Flight model limits relevant for the final approach.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AircraftModel {
    /// Typical vertical speed on final, negative for descent
    pub vsi_final_fpm: f64,
    pub flaps_down_speed_kt: f64,
    pub pitch_flare_deg: f64,
}

impl Default for AircraftModel {
    fn default() -> Self {
        Self {
            vsi_final_fpm: -750.0,
            flaps_down_speed_kt: 180.0,
            pitch_flare_deg: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AircraftState {
    /// Where the aircraft is heading to next, with heading, altitude and timestamp
    pub target: Position,
    pub speed_m_s: f64,
    pub model: AircraftModel,
}

/// The selected runway and the synthesized touchdown position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunwayMatch {
    pub airport_id: String,
    /// Designator of the runway end landed on, like "27L"
    pub runway_id: String,
    pub heading_diff: f64,
    pub touchdown: Position,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunwaySearch {
    pub max_heading_diff_deg: f64,
    pub vsi_factor: f64,
    pub approach_speed_factor: f64,
}

impl Default for RunwaySearch {
    fn default() -> Self {
        Self::from_config(&TaxinetConfig::default())
    }
}

impl RunwaySearch {
    pub fn from_config(config: &TaxinetConfig) -> Self {
        Self {
            max_heading_diff_deg: config.runway_max_heading_diff_deg,
            vsi_factor: config.runway_vsi_factor,
            approach_speed_factor: config.approach_speed_factor,
        }
    }

    /// Best landing runway across `airports` for the aircraft.
    ///
    /// A runway qualifies if the turn towards its touchdown point stays below
    /// the heading limit and reaching it implies a descent rate within the
    /// model's envelope. Among those, the least turn wins; on equal turns the
    /// first one found is kept.
    pub fn find_landing_runway<'a>(
        &self,
        airports: impl IntoIterator<Item = &'a Airport>,
        ac: &AircraftState,
    ) -> Option<RunwayMatch> {
        let from = &ac.target;
        let vsi_min = ac.model.vsi_final_fpm * self.vsi_factor * M_S_PER_FT_MIN;
        let vsi_max = ac.model.vsi_final_fpm / self.vsi_factor * M_S_PER_FT_MIN;

        let (head_search, inverted) = fold_heading(from.heading);
        let speed_m_s = ac.speed_m_s.min(
            ac.model.flaps_down_speed_kt * self.approach_speed_factor / KT_PER_M_PER_S,
        );
        if !(speed_m_s > 0.0) || !from.heading.is_finite() {
            return None;
        }

        let mut best: Option<RunwayMatch> = None;
        let mut best_diff = self.max_heading_diff_deg;

        for apt in airports {
            let runways =
                apt.find_edges_for_heading(head_search, self.max_heading_diff_deg, Some(EdgeKind::Runway));
            for e in runways {
                let Some((a, b)) = apt.edge_runway_ends(e) else {
                    continue;
                };
                let end = if inverted { b } else { a };
                let Some(end_alt) = end.alt_m else {
                    continue;
                };

                // turn needed towards the touchdown point, not towards the runway's direction
                let bearing = angle_between(from.lat, from.lon, end.lat(), end.lon());
                let heading_diff = heading_difference(from.heading, bearing).abs();
                if heading_diff >= best_diff {
                    continue;
                }

                let dist = distance_between(from.lat, from.lon, end.lat(), end.lon());
                let d_ts = dist / speed_m_s;
                let vsi = (end_alt - from.alt_m) / d_ts;
                if !(vsi >= vsi_min && vsi <= vsi_max) {
                    continue;
                }

                best_diff = heading_diff;
                best = Some(RunwayMatch {
                    airport_id: apt.id().to_string(),
                    runway_id: end.id.clone(),
                    heading_diff,
                    touchdown: Position {
                        lat: end.lat(),
                        lon: end.lon(),
                        alt_m: end_alt,
                        ts: from.ts + d_ts,
                        heading: heading_normalize(e.heading() + if inverted { 180.0 } else { 0.0 }),
                        pitch: ac.model.pitch_flare_deg,
                        roll: 0.0,
                        on_ground: true,
                        phase: FlightPhase::TouchDown,
                    },
                });
            }
        }

        match &best {
            Some(m) => debug!(
                "Found runway {}/{} at {} for aircraft at {}",
                m.airport_id, m.runway_id, m.touchdown, from
            ),
            None => debug!(
                "Didn't find runway for aircraft at {} with heading {:.0}°",
                from, from.heading
            ),
        }
        best
    }
}
