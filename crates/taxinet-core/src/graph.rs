// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Per-airport runway/taxiway network.
//!
//! Nodes live in two append-only arenas (taxi nodes and runway ends) and are
//! addressed by stable indices. Edges carry typed index pairs, so the edge
//! kind alone tells which arena an index belongs to.

use crate::geo::{
    angle_between, base_location_on_line, destination, distance_between, estimated_distance,
    fold_heading, heading_normalize, point_to_segment_sqr, BoundingBox, FlightPhase, Position,
    SegmentDistance,
};
use crate::sim::{probe_at, GroundProbe, LocalFrame, LocalPoint};
use log::{debug, warn};
use thiserror::Error;

/// Fraction of the usable runway length between a runway end and the touchdown point.
pub const RWY_TD_POINT_F: f64 = 0.10;

/// Index into an airport's taxi node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaxiNodeId(pub usize);

/// Index into an airport's runway end arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunwayEndId(pub usize);

/// A node of the taxi network.
///
/// There can be tens of thousands of these per scan, so only the location
/// and the lazily computed local coordinates are stored.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxiNode {
    pub lat: f64,
    pub lon: f64,
    /// Local `(x, z)`, filled by [`Airport::local_coords_update`]
    local: Option<(f64, f64)>,
}

impl TaxiNode {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            local: None,
        }
    }

    pub fn has_geo_coords(&self) -> bool {
        !self.lat.is_nan() && !self.lon.is_nan()
    }

    pub fn has_local_coords(&self) -> bool {
        self.local.is_some()
    }

    pub fn local(&self) -> Option<(f64, f64)> {
        self.local
    }

    fn update_local(&mut self, force: bool, alt_m: f64, frame: &dyn LocalFrame) {
        if force || self.local.is_none() {
            let p = frame.world_to_local(self.lat, self.lon, alt_m);
            self.local = Some((p.x, p.z));
        }
    }
}

/// A runway's touchdown point.
#[derive(Debug, Clone, PartialEq)]
pub struct RunwayEnd {
    /// Runway designator, like "23" or "05R"
    pub id: String,
    pub node: TaxiNode,
    /// Ground altitude, unknown until backfilled by the ground probe
    pub alt_m: Option<f64>,
}

impl RunwayEnd {
    pub fn new(id: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            id: id.into(),
            node: TaxiNode::new(lat, lon),
            alt_m: None,
        }
    }

    pub fn lat(&self) -> f64 {
        self.node.lat
    }

    pub fn lon(&self) -> f64 {
        self.node.lon
    }
}

/// One end of a runway as described in a layout file, before the touchdown inset.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRunwayEnd {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    /// Displaced threshold length
    pub displaced_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Runway,
    Taxiway,
}

/// The two endpoints of an edge, typed by the arena they index into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEnds {
    Runway(RunwayEndId, RunwayEndId),
    Taxiway(TaxiNodeId, TaxiNodeId),
}

impl EdgeEnds {
    fn swapped(self) -> Self {
        match self {
            EdgeEnds::Runway(a, b) => EdgeEnds::Runway(b, a),
            EdgeEnds::Taxiway(a, b) => EdgeEnds::Taxiway(b, a),
        }
    }
}

/// A connection between two nodes of the same kind.
///
/// The heading is always in `[0, 180)`: an edge pointing the other way is
/// stored with its ends swapped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    ends: EdgeEnds,
    heading: f64,
    distance_m: f64,
}

impl Edge {
    pub fn new(ends: EdgeEnds, heading: f64, distance_m: f64) -> Self {
        let (heading, inverted) = fold_heading(heading);
        let ends = if inverted { ends.swapped() } else { ends };
        Self {
            ends,
            heading,
            distance_m,
        }
    }

    pub fn kind(&self) -> EdgeKind {
        match self.ends {
            EdgeEnds::Runway(..) => EdgeKind::Runway,
            EdgeEnds::Taxiway(..) => EdgeKind::Taxiway,
        }
    }

    pub fn ends(&self) -> EdgeEnds {
        self.ends
    }

    /// Heading from the first to the second end, in `[0, 180)`.
    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("taxi node {from} or {to} not found among {len} nodes, edge not added")]
    NodeOutOfRange { from: usize, to: usize, len: usize },
    #[error("taxi node {from} or {to} has no valid location, edge not added")]
    MissingCoordinates { from: usize, to: usize },
}

/// Result of [`Airport::find_closest_edge`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeMatch {
    pub edge: Edge,
    /// Base point on the edge's line closest to the searched position
    pub lat: f64,
    pub lon: f64,
    /// Distance between the searched position and the edge
    pub distance_m: f64,
}

/// An airport as read from a layout file.
#[derive(Debug, Clone, Default)]
pub struct Airport {
    id: String,
    bounds: BoundingBox,
    alt_m: Option<f64>,
    declared_elevation_m: Option<f64>,
    taxi_nodes: Vec<TaxiNode>,
    runway_ends: Vec<RunwayEnd>,
    edges: Vec<Edge>,
}

impl Airport {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Typically the ICAO code
    pub fn id(&self) -> &str {
        &self.id
    }

    /// An empty id marks an airport that is read but not wanted.
    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    /// Usable only with an id, some edges and at least one runway.
    pub fn is_valid(&self) -> bool {
        self.has_id() && self.has_taxiways() && self.has_runway_ends()
    }

    pub fn has_taxiways(&self) -> bool {
        !self.edges.is_empty()
    }

    pub fn has_runway_ends(&self) -> bool {
        !self.runway_ends.is_empty()
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.bounds.contains(lat, lon)
    }

    pub fn enlarge_bounds_m(&mut self, meters: f64) {
        self.bounds.enlarge_m(meters, meters);
    }

    /// Ground altitude at the center of the airport, once backfilled.
    pub fn alt_m(&self) -> Option<f64> {
        self.alt_m
    }

    /// Probed altitude, else the declared elevation. Not used for runway selection.
    pub fn elevation_m(&self) -> Option<f64> {
        self.alt_m.or(self.declared_elevation_m)
    }

    /// Elevation as declared in the airport's header record.
    pub fn declared_elevation_m(&self) -> Option<f64> {
        self.declared_elevation_m
    }

    pub fn set_declared_elevation_m(&mut self, elevation_m: f64) {
        self.declared_elevation_m = elevation_m.is_finite().then_some(elevation_m);
    }

    pub fn taxi_nodes(&self) -> &[TaxiNode] {
        &self.taxi_nodes
    }

    pub fn runway_ends(&self) -> &[RunwayEnd] {
        &self.runway_ends
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of taxiway edges, runways not counted.
    pub fn taxiway_count(&self) -> usize {
        self.edges.len() - self.runways().count()
    }

    // --- Construction

    /// Appends a taxi node and grows the bounding box around it.
    pub fn add_taxi_node(&mut self, lat: f64, lon: f64) -> TaxiNodeId {
        self.bounds.enlarge_pos(lat, lon);
        self.taxi_nodes.push(TaxiNode::new(lat, lon));
        TaxiNodeId(self.taxi_nodes.len() - 1)
    }

    /// Connects two existing taxi nodes. The distance is computed if not given.
    pub fn add_taxi_edge(
        &mut self,
        from: TaxiNodeId,
        to: TaxiNodeId,
        distance_m: Option<f64>,
    ) -> Result<(), GraphError> {
        let (a, b) = match (self.taxi_nodes.get(from.0), self.taxi_nodes.get(to.0)) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(GraphError::NodeOutOfRange {
                    from: from.0,
                    to: to.0,
                    len: self.taxi_nodes.len(),
                })
            }
        };
        if !a.has_geo_coords() || !b.has_geo_coords() {
            return Err(GraphError::MissingCoordinates {
                from: from.0,
                to: to.0,
            });
        }

        let dist = distance_m.unwrap_or_else(|| estimated_distance(a.lat, a.lon, b.lat, b.lon));
        let heading = angle_between(a.lat, a.lon, b.lat, b.lon);
        self.edges
            .push(Edge::new(EdgeEnds::Taxiway(from, to), heading, dist));
        Ok(())
    }

    /// Adds both ends of a runway and the runway edge between them.
    ///
    /// Each end is moved inward by its displaced threshold plus 10% of the
    /// remaining length, approximating where aircraft actually touch down.
    /// The recorded runway length shrinks to the 80% in between.
    /// Displaced thresholds leaving no runway in between are ignored.
    pub fn add_runway_ends(&mut self, end1: RawRunwayEnd, end2: RawRunwayEnd) {
        let angle = angle_between(end1.lat, end1.lon, end2.lat, end2.lon);
        let back = angle_between(end2.lat, end2.lon, end1.lat, end1.lon);
        let valid_displacement = |d: f64| if d.is_finite() && d > 0.0 { d } else { 0.0 };
        let mut displaced1 = valid_displacement(end1.displaced_m);
        let mut displaced2 = valid_displacement(end2.displaced_m);

        let full_len = distance_between(end1.lat, end1.lon, end2.lat, end2.lon);
        if displaced1 + displaced2 >= full_len {
            warn!(
                "apt.dat: {} runway {}-{}: displaced thresholds of {:.0}m exceed its length of {:.0}m, ignored",
                self.id,
                end1.id,
                end2.id,
                displaced1 + displaced2,
                full_len
            );
            displaced1 = 0.0;
            displaced2 = 0.0;
        }
        let mut len = full_len - (displaced1 + displaced2);
        let (lat1, lon1) = destination(end1.lat, end1.lon, angle, displaced1 + len * RWY_TD_POINT_F);
        let (lat2, lon2) = destination(end2.lat, end2.lon, back, displaced2 + len * RWY_TD_POINT_F);
        len *= 1.0 - 2.0 * RWY_TD_POINT_F;

        self.bounds.enlarge_pos(lat1, lon1);
        self.runway_ends.push(RunwayEnd::new(end1.id, lat1, lon1));
        self.bounds.enlarge_pos(lat2, lon2);
        self.runway_ends.push(RunwayEnd::new(end2.id, lat2, lon2));

        let n = self.runway_ends.len();
        self.edges.push(Edge::new(
            EdgeEnds::Runway(RunwayEndId(n - 2), RunwayEndId(n - 1)),
            angle,
            len,
        ));
    }

    /// Sorts edges by heading, which [`Self::find_edges_for_heading`] relies on.
    pub fn sort_edges(&mut self) {
        self.edges.sort_by(|a, b| a.heading.total_cmp(&b.heading));
    }

    // --- Edge resolution

    /// Both nodes of an edge, in the edge's stored order.
    pub fn edge_nodes(&self, edge: &Edge) -> (&TaxiNode, &TaxiNode) {
        match edge.ends {
            EdgeEnds::Runway(a, b) => (&self.runway_ends[a.0].node, &self.runway_ends[b.0].node),
            EdgeEnds::Taxiway(a, b) => (&self.taxi_nodes[a.0], &self.taxi_nodes[b.0]),
        }
    }

    /// Both runway ends of a runway edge, `None` for taxiways.
    pub fn edge_runway_ends(&self, edge: &Edge) -> Option<(&RunwayEnd, &RunwayEnd)> {
        match edge.ends {
            EdgeEnds::Runway(a, b) => Some((&self.runway_ends[a.0], &self.runway_ends[b.0])),
            EdgeEnds::Taxiway(..) => None,
        }
    }

    /// All runway edges, in edge order.
    pub fn runways(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(|e| e.kind() == EdgeKind::Runway)
    }

    /// Human-readable list of runways like "05-23 / 09L-27R".
    pub fn runways_string(&self) -> String {
        self.runways()
            .filter_map(|e| self.edge_runway_ends(e))
            .map(|(a, b)| format!("{}-{}", a.id, b.id))
            .collect::<Vec<_>>()
            .join(" / ")
    }

    // --- Queries

    /// Edges whose heading lies within `tolerance` of `heading`.
    ///
    /// Both the search heading and edge headings live in `[0, 180)`, so a
    /// window crossing 0° or 180° is searched as two ranges. Requires edges
    /// sorted by [`Self::sort_edges`].
    pub fn find_edges_for_heading(
        &self,
        heading: f64,
        tolerance: f64,
        kind: Option<EdgeKind>,
    ) -> Vec<&Edge> {
        let mut found = Vec::new();
        if !heading.is_finite() || !tolerance.is_finite() {
            return found;
        }
        let wanted = |e: &Edge| kind.map_or(true, |k| e.kind() == k);

        // windows this wide would make the two ranges overlap
        if tolerance >= 90.0 {
            found.extend(self.edges.iter().filter(|e| wanted(e)));
            return found;
        }

        let (heading, _) = fold_heading(heading);
        let begin = heading - tolerance;
        let end = heading + tolerance;
        let ranges: Vec<(f64, f64)> = if begin >= 0.0 && end < 180.0 {
            vec![(begin, end)]
        } else if begin < 0.0 {
            vec![(0.0, end), (begin + 180.0, 180.0)]
        } else {
            vec![(0.0, end - 180.0), (begin, 180.0)]
        };

        for (lo, hi) in ranges {
            let start = self.edges.partition_point(|e| e.heading < lo);
            found.extend(
                self.edges[start..]
                    .iter()
                    .take_while(|e| e.heading <= hi)
                    .filter(|e| wanted(e)),
            );
        }
        found
    }

    /// Closest edge matching the position and its heading.
    ///
    /// Lateral distance and how far the base point lies beyond the edge's
    /// ends are both limited to `max_dist_m`. Nodes need local coordinates.
    pub fn find_closest_edge(
        &self,
        pos: &Position,
        max_dist_m: f64,
        angle_tolerance: f64,
        frame: &dyn LocalFrame,
    ) -> Option<EdgeMatch> {
        if !pos.heading.is_finite() || max_dist_m <= 0.0 {
            return None;
        }
        let max_dist_sqr = max_dist_m * max_dist_m;
        let alt = if pos.alt_m.is_finite() { pos.alt_m } else { 0.0 };
        let pt = frame.world_to_local(pos.lat, pos.lon, alt);

        let head_search = heading_normalize(pos.heading);
        let inverted = head_search >= 180.0;

        let mut best: Option<(&Edge, (f64, f64), (f64, f64), SegmentDistance)> = None;
        for e in self.find_edges_for_heading(head_search, angle_tolerance, None) {
            let (a, b) = self.edge_nodes(e);
            let (from, to) = if inverted { (b, a) } else { (a, b) };
            let (Some(from), Some(to)) = (from.local(), to.local()) else {
                continue;
            };

            let dist = point_to_segment_sqr(pt.x, pt.z, from.0, from.1, to.0, to.1);
            let best_sqr = best.map_or(max_dist_sqr, |(_, _, _, d)| d.dist_sqr);
            if dist.dist_sqr >= best_sqr {
                continue;
            }
            if dist.beyond_segment_sqr() > max_dist_sqr {
                continue;
            }
            best = Some((e, from, to, dist));
        }

        let (edge, from, to, dist) = best?;
        let (x, z) = base_location_on_line(from.0, from.1, to.0, to.1, &dist);
        let (lat, lon, _) = frame.local_to_world(LocalPoint { x, y: pt.y, z });
        Some(EdgeMatch {
            edge: *edge,
            lat,
            lon,
            distance_m: dist.dist_sqr.sqrt(),
        })
    }

    /// Moves `pos` onto the best matching edge, if any.
    ///
    /// Positions snapped onto a taxiway are tagged as taxiing. Runway snaps
    /// stay untagged so take-off and landing handling is not disturbed.
    pub fn snap_to_taxiway(
        &self,
        pos: &mut Position,
        max_dist_m: f64,
        angle_tolerance: f64,
        frame: &dyn LocalFrame,
    ) -> bool {
        let Some(m) = self.find_closest_edge(pos, max_dist_m, angle_tolerance, frame) else {
            return false;
        };
        debug!(
            "Snapped to {:?} at {} from ({:.6}, {:.6}) to ({:.6}, {:.6})",
            m.edge.kind(),
            self.id,
            pos.lat,
            pos.lon,
            m.lat,
            m.lon
        );
        pos.lat = m.lat;
        pos.lon = m.lon;
        if m.edge.kind() != EdgeKind::Runway {
            pos.phase = FlightPhase::Taxi;
        }
        true
    }

    // --- Backfill

    /// Samples terrain for the airport center and every runway end without altitude.
    ///
    /// Must run wherever terrain lookups work (the sim's main thread for X-Plane).
    /// Runway ends without ground altitude stay unknown and are looked up again next time.
    pub fn update_altitudes(&mut self, probe: &mut dyn GroundProbe) {
        let (lat, lon) = self.bounds.center();
        self.alt_m = probe_at(probe, lat, lon);

        for re in self.runway_ends.iter_mut().filter(|re| re.alt_m.is_none()) {
            re.alt_m = probe_at(probe, re.lat(), re.lon());
        }
    }

    /// Computes local coordinates of all nodes. Without `force` only missing ones.
    pub fn local_coords_update(&mut self, force: bool, frame: &dyn LocalFrame) {
        let apt_alt = self.elevation_m().unwrap_or(0.0);
        for node in &mut self.taxi_nodes {
            node.update_local(force, apt_alt, frame);
        }
        for re in &mut self.runway_ends {
            let alt = re.alt_m.unwrap_or(apt_alt);
            re.node.update_local(force, alt, frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{lon_deg_in_m, LAT_DEG_IN_M};
    use crate::sim::{ConstantElevation, FlatEarthFrame, NoTerrain};

    /// Airport with a single north-bound taxiway of ~111m at (47.0, 8.0).
    fn straight_taxiway() -> (Airport, FlatEarthFrame) {
        let mut apt = Airport::new("LSZX");
        let a = apt.add_taxi_node(47.0, 8.0);
        let b = apt.add_taxi_node(47.001, 8.0);
        apt.add_taxi_edge(a, b, None).unwrap();
        apt.sort_edges();
        let frame = FlatEarthFrame::new(47.0, 8.0);
        apt.local_coords_update(false, &frame);
        (apt, frame)
    }

    fn edge_with_heading(apt: &mut Airport, heading: f64) {
        let (lat, lon) = destination(10.0, 10.0, heading, 100.0);
        let a = apt.add_taxi_node(10.0, 10.0);
        let b = apt.add_taxi_node(lat, lon);
        apt.add_taxi_edge(a, b, None).unwrap();
    }

    fn headings(edges: &[&Edge]) -> Vec<i64> {
        let mut v: Vec<i64> = edges.iter().map(|e| e.heading().round() as i64).collect();
        v.sort();
        v
    }

    #[test]
    fn test_edge_normalization_swaps_ends() {
        let e = Edge::new(
            EdgeEnds::Taxiway(TaxiNodeId(3), TaxiNodeId(4)),
            250.0,
            12.0,
        );
        assert_eq!(e.heading(), 70.0);
        assert_eq!(e.ends(), EdgeEnds::Taxiway(TaxiNodeId(4), TaxiNodeId(3)));
        assert_eq!(e.kind(), EdgeKind::Taxiway);

        let e = Edge::new(EdgeEnds::Runway(RunwayEndId(0), RunwayEndId(1)), 70.0, 12.0);
        assert_eq!(e.ends(), EdgeEnds::Runway(RunwayEndId(0), RunwayEndId(1)));
    }

    #[test]
    fn test_add_taxi_edge_rejects_bad_input() {
        let mut apt = Airport::new("TEST");
        let a = apt.add_taxi_node(1.0, 1.0);
        let err = apt.add_taxi_edge(a, TaxiNodeId(7), None).unwrap_err();
        assert_eq!(
            err,
            GraphError::NodeOutOfRange {
                from: 0,
                to: 7,
                len: 1
            }
        );

        let b = apt.add_taxi_node(f64::NAN, 1.0);
        assert!(matches!(
            apt.add_taxi_edge(a, b, None),
            Err(GraphError::MissingCoordinates { .. })
        ));
        assert!(apt.edges().is_empty());
    }

    #[test]
    fn test_add_taxi_edge_computes_distance() {
        let mut apt = Airport::new("TEST");
        let a = apt.add_taxi_node(47.0, 8.0);
        let b = apt.add_taxi_node(47.0001, 8.0);
        apt.add_taxi_edge(a, b, None).unwrap();
        let e = apt.edges()[0];
        assert!((e.distance_m() - 11.119).abs() < 0.01);
        assert_eq!(e.heading(), 0.0);

        apt.add_taxi_edge(b, a, Some(42.0)).unwrap();
        assert_eq!(apt.edges()[1].distance_m(), 42.0);
        // walked south, stored north-bound with swapped ends
        assert_eq!(apt.edges()[1].ends(), EdgeEnds::Taxiway(a, b));
    }

    #[test]
    fn test_runway_inset_touchdown_points() {
        let mut apt = Airport::new("KTST");
        let (lat2, lon2) = destination(40.0, -75.0, 60.0, 2000.0);
        apt.add_runway_ends(
            RawRunwayEnd {
                id: "06".into(),
                lat: 40.0,
                lon: -75.0,
                displaced_m: 0.0,
            },
            RawRunwayEnd {
                id: "24".into(),
                lat: lat2,
                lon: lon2,
                displaced_m: 0.0,
            },
        );

        assert_eq!(apt.runway_ends().len(), 2);
        let e = apt.edges()[0];
        assert_eq!(e.kind(), EdgeKind::Runway);
        assert!((e.distance_m() - 1600.0).abs() < 0.01);
        assert!((e.heading() - 60.0).abs() < 0.01);

        let (re1, re2) = apt.edge_runway_ends(&e).unwrap();
        assert_eq!(re1.id, "06");
        assert_eq!(re2.id, "24");
        assert!((distance_between(40.0, -75.0, re1.lat(), re1.lon()) - 200.0).abs() < 0.01);
        assert!((distance_between(lat2, lon2, re2.lat(), re2.lon()) - 200.0).abs() < 0.01);
        assert!((re1.node.lat - 40.0) > 0.0, "moved inward, north-east");
        assert!(apt.contains(re1.lat(), re1.lon()));
        assert_eq!(apt.runways_string(), "06-24");
    }

    #[test]
    fn test_runway_inset_with_displaced_threshold() {
        let mut apt = Airport::new("KTST");
        let (lat2, lon2) = destination(40.0, -75.0, 270.0, 3000.0);
        apt.add_runway_ends(
            RawRunwayEnd {
                id: "27".into(),
                lat: 40.0,
                lon: -75.0,
                displaced_m: 500.0,
            },
            RawRunwayEnd {
                id: "09".into(),
                lat: lat2,
                lon: lon2,
                displaced_m: 0.0,
            },
        );
        // usable 2500m: end 1 moves 500 + 250, end 2 moves 250
        let e = apt.edges()[0];
        assert!((e.distance_m() - 2000.0).abs() < 0.01);
        // heading 270 is stored as 90 with ends swapped: first end is "09"
        assert!((e.heading() - 90.0).abs() < 0.01);
        let (first, second) = apt.edge_runway_ends(&e).unwrap();
        assert_eq!(first.id, "09");
        assert!((distance_between(40.0, -75.0, second.lat(), second.lon()) - 750.0).abs() < 0.01);
    }

    #[test]
    fn test_find_edges_window_straddling_zero() {
        let mut apt = Airport::new("TEST");
        for h in [178.0, 8.0, 90.0, 20.0, 170.0] {
            edge_with_heading(&mut apt, h);
        }
        apt.sort_edges();

        let found = apt.find_edges_for_heading(5.0, 10.0, None);
        assert_eq!(headings(&found), vec![8, 178]);

        // reverse direction folds into the same window
        let found = apt.find_edges_for_heading(185.0, 10.0, None);
        assert_eq!(headings(&found), vec![8, 178]);
    }

    #[test]
    fn test_find_edges_window_straddling_180() {
        let mut apt = Airport::new("TEST");
        for h in [2.0, 170.0, 178.0, 160.0, 30.0] {
            edge_with_heading(&mut apt, h);
        }
        apt.sort_edges();

        let found = apt.find_edges_for_heading(175.0, 10.0, None);
        assert_eq!(headings(&found), vec![2, 170, 178]);
    }

    #[test]
    fn test_find_edges_plain_window_and_filter() {
        let mut apt = Airport::new("TEST");
        for h in [40.0, 45.0, 50.0, 100.0] {
            edge_with_heading(&mut apt, h);
        }
        let (lat2, lon2) = destination(10.0, 10.0, 44.0, 2000.0);
        apt.add_runway_ends(
            RawRunwayEnd {
                id: "04".into(),
                lat: 10.0,
                lon: 10.0,
                displaced_m: 0.0,
            },
            RawRunwayEnd {
                id: "22".into(),
                lat: lat2,
                lon: lon2,
                displaced_m: 0.0,
            },
        );
        apt.sort_edges();

        assert_eq!(apt.find_edges_for_heading(45.0, 6.0, None).len(), 4);
        let rwys = apt.find_edges_for_heading(225.0, 5.0, Some(EdgeKind::Runway));
        assert_eq!(rwys.len(), 1);
        assert_eq!(rwys[0].kind(), EdgeKind::Runway);
        assert!(apt
            .find_edges_for_heading(45.0, 5.0, Some(EdgeKind::Taxiway))
            .iter()
            .all(|e| e.kind() == EdgeKind::Taxiway));
        assert!(apt.find_edges_for_heading(f64::NAN, 5.0, None).is_empty());
        assert_eq!(apt.find_edges_for_heading(0.0, 90.0, None).len(), 5);
    }

    #[test]
    fn test_closest_edge_lateral_offset() {
        let (apt, frame) = straight_taxiway();
        let lon = 8.0 + 3.0 / lon_deg_in_m(47.0);
        let pos = Position::new(47.0005, lon).with_heading(2.0);

        let m = apt.find_closest_edge(&pos, 5.0, 15.0, &frame).unwrap();
        assert_eq!(m.edge.kind(), EdgeKind::Taxiway);
        assert!((m.distance_m - 3.0).abs() < 1e-6);
        assert!((m.lat - 47.0005).abs() < 1e-9);
        assert!((m.lon - 8.0).abs() < 1e-9);

        // heading the other way matches the same edge
        let pos = pos.with_heading(182.0);
        assert!(apt.find_closest_edge(&pos, 5.0, 15.0, &frame).is_some());

        // crossing heading does not
        let pos = pos.with_heading(90.0);
        assert!(apt.find_closest_edge(&pos, 5.0, 15.0, &frame).is_none());
    }

    #[test]
    fn test_closest_edge_beyond_end_rejected() {
        let (apt, frame) = straight_taxiway();
        let lon = 8.0 + 3.0 / lon_deg_in_m(47.0);
        let lat = 47.001 + 6.0 / LAT_DEG_IN_M;
        let pos = Position::new(lat, lon).with_heading(0.0);
        assert!(apt.find_closest_edge(&pos, 5.0, 15.0, &frame).is_none());

        // 2m past the end is within budget
        let lat = 47.001 + 2.0 / LAT_DEG_IN_M;
        let pos = Position::new(lat, lon).with_heading(0.0);
        let m = apt.find_closest_edge(&pos, 5.0, 15.0, &frame).unwrap();
        assert!((m.lat - lat).abs() < 1e-9, "base is not clamped to the segment");
    }

    #[test]
    fn test_closest_edge_picks_nearest() {
        let (mut apt, frame) = straight_taxiway();
        let off = 4.0 / lon_deg_in_m(47.0);
        let a = apt.add_taxi_node(47.0, 8.0 + off);
        let b = apt.add_taxi_node(47.001, 8.0 + off);
        apt.add_taxi_edge(a, b, None).unwrap();
        apt.sort_edges();
        apt.local_coords_update(false, &frame);

        let pos = Position::new(47.0005, 8.0 + 3.0 / lon_deg_in_m(47.0)).with_heading(0.0);
        let m = apt.find_closest_edge(&pos, 5.0, 15.0, &frame).unwrap();
        assert!((m.distance_m - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_closest_edge_needs_local_coords() {
        let mut apt = Airport::new("TEST");
        let a = apt.add_taxi_node(47.0, 8.0);
        let b = apt.add_taxi_node(47.001, 8.0);
        apt.add_taxi_edge(a, b, None).unwrap();
        let frame = FlatEarthFrame::new(47.0, 8.0);
        let pos = Position::new(47.0005, 8.0).with_heading(0.0);
        assert!(apt.find_closest_edge(&pos, 5.0, 15.0, &frame).is_none());
    }

    #[test]
    fn test_snap_tags_taxiway_positions() {
        let (apt, frame) = straight_taxiway();
        let mut pos = Position::new(47.0005, 8.0 + 2.0 / lon_deg_in_m(47.0)).with_heading(359.0);
        assert!(apt.snap_to_taxiway(&mut pos, 5.0, 15.0, &frame));
        assert_eq!(pos.phase, FlightPhase::Taxi);
        assert!((pos.lon - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_update_altitudes_skips_known_ends() {
        let mut apt = Airport::new("TEST");
        let (lat2, lon2) = destination(10.0, 10.0, 0.0, 2000.0);
        apt.add_runway_ends(
            RawRunwayEnd {
                id: "36".into(),
                lat: 10.0,
                lon: 10.0,
                displaced_m: 0.0,
            },
            RawRunwayEnd {
                id: "18".into(),
                lat: lat2,
                lon: lon2,
                displaced_m: 0.0,
            },
        );

        apt.update_altitudes(&mut NoTerrain);
        assert_eq!(apt.alt_m(), None);
        assert!(apt.runway_ends().iter().all(|re| re.alt_m.is_none()));

        apt.update_altitudes(&mut ConstantElevation(120.0));
        assert_eq!(apt.alt_m(), Some(120.0));
        apt.update_altitudes(&mut ConstantElevation(300.0));
        assert_eq!(apt.alt_m(), Some(300.0));
        assert!(apt.runway_ends().iter().all(|re| re.alt_m == Some(120.0)));
    }

    #[test]
    fn test_failed_ground_lookup_retried_on_next_backfill() {
        let mut apt = Airport::new("TEST");
        apt.set_declared_elevation_m(55.0);
        apt.add_runway_ends(
            RawRunwayEnd {
                id: "01".into(),
                lat: 10.0,
                lon: 10.0,
                displaced_m: 0.0,
            },
            RawRunwayEnd {
                id: "19".into(),
                lat: 10.02,
                lon: 10.0,
                displaced_m: 0.0,
            },
        );

        apt.update_altitudes(&mut NoTerrain);
        assert_eq!(apt.alt_m(), None);
        assert_eq!(apt.elevation_m(), Some(55.0));
        assert!(apt.runway_ends().iter().all(|re| re.alt_m.is_none()));

        apt.update_altitudes(&mut ConstantElevation(300.0));
        assert_eq!(apt.alt_m(), Some(300.0));
        assert_eq!(apt.elevation_m(), Some(300.0));
        assert!(apt.runway_ends().iter().all(|re| re.alt_m == Some(300.0)));
    }

    #[test]
    fn test_runway_inset_ignores_oversized_displacement() {
        let mut apt = Airport::new("KTST");
        let (lat2, lon2) = destination(40.0, -75.0, 90.0, 1000.0);
        apt.add_runway_ends(
            RawRunwayEnd {
                id: "09".into(),
                lat: 40.0,
                lon: -75.0,
                displaced_m: 700.0,
            },
            RawRunwayEnd {
                id: "27".into(),
                lat: lat2,
                lon: lon2,
                displaced_m: 400.0,
            },
        );
        let e = apt.edges()[0];
        assert!((e.distance_m() - 800.0).abs() < 0.01);
        let (first, second) = apt.edge_runway_ends(&e).unwrap();
        assert!((distance_between(40.0, -75.0, first.lat(), first.lon()) - 100.0).abs() < 0.01);
        assert!((distance_between(lat2, lon2, second.lat(), second.lon()) - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_local_coords_update_force() {
        let (mut apt, _) = straight_taxiway();
        let before = apt.taxi_nodes()[1].local().unwrap();

        let other = FlatEarthFrame::new(46.9, 8.1);
        apt.local_coords_update(false, &other);
        assert_eq!(apt.taxi_nodes()[1].local().unwrap(), before);

        apt.local_coords_update(true, &other);
        assert_ne!(apt.taxi_nodes()[1].local().unwrap(), before);
    }

    #[test]
    fn test_validity_and_runway_iteration() {
        let mut apt = Airport::new("");
        assert!(!apt.is_valid());
        apt = Airport::new("EDDF");
        let a = apt.add_taxi_node(50.03, 8.55);
        let b = apt.add_taxi_node(50.031, 8.55);
        apt.add_taxi_edge(a, b, None).unwrap();
        assert!(!apt.is_valid(), "no runway yet");

        for (id1, id2, h) in [("07C", "25C", 70.0), ("18", "36", 180.0)] {
            let (lat2, lon2) = destination(50.03, 8.55, h, 3000.0);
            apt.add_runway_ends(
                RawRunwayEnd {
                    id: id1.into(),
                    lat: 50.03,
                    lon: 8.55,
                    displaced_m: 0.0,
                },
                RawRunwayEnd {
                    id: id2.into(),
                    lat: lat2,
                    lon: lon2,
                    displaced_m: 0.0,
                },
            );
        }
        assert!(apt.is_valid());
        assert_eq!(apt.runways().count(), 2);
        assert_eq!(apt.taxiway_count(), 1);
        // 180° is stored as 0° with the ends swapped
        assert_eq!(apt.runways_string(), "07C-25C / 36-18");
    }
}
