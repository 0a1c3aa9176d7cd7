// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Keeps the registry populated around a moving viewpoint and answers queries.
//!
//! All methods run on the foreground (sim) thread. Layout files are read by
//! at most one background scan at a time; terrain probing and local
//! coordinates are filled in afterwards on the foreground thread, as the
//! sim's probes only work there.

use crate::config::TaxinetConfig;
use crate::geo::Position;
use crate::registry::AirportRegistry;
use crate::runway::{AircraftState, RunwayMatch, RunwaySearch};
use crate::scan::{spawn_scan, ScanReport, StopFlag};
use crate::sim::{GroundProbe, LocalFrame};
use crate::source::LayoutSource;
use log::{debug, error};
use rayon::prelude::*;
use std::sync::Arc;
use std::thread::JoinHandle;

/// What a call to [`TaxiNet::refresh`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A scan is still running, nothing done
    ScanInFlight,
    /// The viewpoint is not a valid location
    InvalidViewpoint,
    /// Altitudes and local coordinates of newly read airports were filled in
    Backfilled,
    /// Nothing to do
    Idle,
    /// A new scan around the viewpoint has started
    ScanStarted,
    /// The scan thread could not be started
    ScanNotStarted,
    /// [`TaxiNet::shutdown`] was called before
    ShutDown,
}

/// Airport index around the viewpoint, with snapping and runway finding.
pub struct TaxiNet {
    config: TaxinetConfig,
    runway_search: RunwaySearch,
    registry: Arc<AirportRegistry>,
    source: Arc<dyn LayoutSource>,
    frame: Box<dyn LocalFrame>,
    probe: Box<dyn GroundProbe>,
    stop: StopFlag,
    scan: Option<JoinHandle<ScanReport>>,
    last_report: Option<ScanReport>,
    /// Center of the last scan started
    last_center: Option<Position>,
    /// Airports may have been added since the last backfill
    airports_added: bool,
    shut_down: bool,
}

impl TaxiNet {
    pub fn new(
        config: TaxinetConfig,
        source: Arc<dyn LayoutSource>,
        frame: Box<dyn LocalFrame>,
        probe: Box<dyn GroundProbe>,
    ) -> Self {
        Self {
            runway_search: RunwaySearch::from_config(&config),
            registry: Arc::new(AirportRegistry::new(config.snap_taxi_dist_m)),
            config,
            source,
            frame,
            probe,
            stop: StopFlag::new(),
            scan: None,
            last_report: None,
            last_center: None,
            airports_added: false,
            shut_down: false,
        }
    }

    pub fn config(&self) -> &TaxinetConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AirportRegistry> {
        &self.registry
    }

    /// Result of the most recently completed scan.
    pub fn last_report(&self) -> Option<&ScanReport> {
        self.last_report.as_ref()
    }

    pub fn is_scanning(&self) -> bool {
        self.scan.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Replaces the local coordinate system, e.g. after the sim moved its reference point.
    /// Follow up with [`Self::update_local_coordinates`] with `force` set.
    pub fn set_local_frame(&mut self, frame: Box<dyn LocalFrame>) {
        self.frame = frame;
    }

    /// Call regularly with the current viewpoint.
    ///
    /// Starts a scan once the viewpoint moved farther than the standard search
    /// distance from the last scan's center, reading airports within twice
    /// that distance. The first call after a scan finished backfills
    /// altitudes and local coordinates.
    pub fn refresh(&mut self, viewpoint: &Position) -> RefreshOutcome {
        if self.shut_down {
            return RefreshOutcome::ShutDown;
        }
        if self.is_scanning() {
            return RefreshOutcome::ScanInFlight;
        }
        self.join_scan();

        if !viewpoint.is_normal() {
            return RefreshOutcome::InvalidViewpoint;
        }

        let radius = self.config.std_search_distance_m;
        if let Some(last) = &self.last_center {
            if last.distance_to(viewpoint) < radius {
                if !self.airports_added {
                    return RefreshOutcome::Idle;
                }
                self.update_altitudes();
                self.update_local_coordinates(false);
                self.airports_added = false;
                return RefreshOutcome::Backfilled;
            }
        }

        self.stop.reset();
        match spawn_scan(
            Arc::clone(&self.source),
            Arc::clone(&self.registry),
            *viewpoint,
            2.0 * radius,
            self.stop.clone(),
        ) {
            Ok(handle) => {
                self.scan = Some(handle);
                self.last_center = Some(*viewpoint);
                self.airports_added = true;
                RefreshOutcome::ScanStarted
            }
            Err(e) => {
                error!("Could not start apt.dat scan thread: {}", e);
                RefreshOutcome::ScanNotStarted
            }
        }
    }

    /// Blocks until the running scan, if any, is done.
    pub fn wait_for_scan(&mut self) -> Option<&ScanReport> {
        self.join_scan();
        self.last_report.as_ref()
    }

    fn join_scan(&mut self) {
        let Some(handle) = self.scan.take() else {
            return;
        };
        match handle.join() {
            Ok(report) => self.last_report = Some(report),
            Err(_) => error!("apt.dat scan thread panicked"),
        }
    }

    /// Moves `pos` onto the closest matching runway or taxiway of the airport it is in.
    ///
    /// Returns `false` and leaves `pos` untouched if snapping is disabled,
    /// `pos` is not at any known airport, or no edge matches.
    pub fn snap(&self, pos: &mut Position) -> bool {
        if !self.config.snapping_enabled() {
            return false;
        }
        let (lat, lon) = (pos.lat, pos.lon);
        let frame = self.frame.as_ref();
        self.registry
            .with_airport_at(lat, lon, |apt| {
                apt.snap_to_taxiway(
                    pos,
                    self.config.snap_taxi_dist_m,
                    self.config.edge_angle_tolerance_deg,
                    frame,
                )
            })
            .unwrap_or(false)
    }

    /// Best runway to land on for the aircraft, across all known airports.
    pub fn find_landing_runway(&self, ac: &AircraftState) -> Option<RunwayMatch> {
        self.registry
            .with_airports(|map| self.runway_search.find_landing_runway(map.values(), ac))
    }

    /// Probes terrain for all airports and runway ends still lacking an altitude.
    pub fn update_altitudes(&mut self) {
        let probe = self.probe.as_mut();
        self.registry.with_airports_mut(|map| {
            for apt in map.values_mut() {
                apt.update_altitudes(probe);
            }
        });
        debug!("apt.dat: Finished updating ground altitudes");
    }

    /// Computes local coordinates of all nodes, with `force` also of those already known.
    pub fn update_local_coordinates(&self, force: bool) {
        let frame = self.frame.as_ref();
        self.registry.with_airports_mut(|map| {
            map.par_iter_mut()
                .for_each(|(_, apt)| apt.local_coords_update(force, frame));
        });
        debug!("apt.dat: Finished updating local coordinates");
    }

    /// Stops a running scan, waits for it, and releases the ground probe.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.stop.stop();
        self.join_scan();
        self.probe.release();
        self.shut_down = true;
    }
}

impl Drop for TaxiNet {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{destination, lon_deg_in_m, FlightPhase};
    use crate::sim::{ConstantElevation, FlatEarthFrame};
    use crate::source::{LayoutReader, MemorySource, SourceError};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::{channel, Receiver, Sender};
    use std::sync::Mutex;

    fn small_field() -> String {
        let mut text = String::from("1 1300 0 0 LSZS Small Field\n");
        text.push_str(
            "100 30.00 1 0 0.25 1 2 1 01 47.00000000 8.00000000 0.00 0.00 3 0 0 1 \
             19 47.02000000 8.00000000 0.00 0.00 3 0 0 1\n",
        );
        let (lat, lon) = destination(47.005, 8.001, 0.0, 100.0);
        text.push_str(&format!(
            "120\n111 47.00500000 8.00100000 1\n115 {:.8} {:.8}\n99\n",
            lat, lon
        ));
        text
    }

    fn net(source: Arc<dyn LayoutSource>) -> TaxiNet {
        TaxiNet::new(
            TaxinetConfig::default(),
            source,
            Box::new(FlatEarthFrame::new(47.0, 8.0)),
            Box::new(ConstantElevation(396.0)),
        )
    }

    #[test]
    fn test_refresh_cycle() {
        let mut net = net(Arc::new(MemorySource::new().with_file("apt.dat", small_field())));
        let here = Position::new(47.01, 8.0);

        assert_eq!(net.refresh(&Position::new(f64::NAN, f64::NAN)), RefreshOutcome::InvalidViewpoint);
        assert_eq!(net.refresh(&here), RefreshOutcome::ScanStarted);
        assert_eq!(net.wait_for_scan().map(|r| r.airports_added), Some(1));

        // not backfilled yet
        net.registry()
            .with_airport("LSZS", |apt| assert_eq!(apt.alt_m(), None))
            .unwrap();

        assert_eq!(net.refresh(&here), RefreshOutcome::Backfilled);
        net.registry()
            .with_airport("LSZS", |apt| {
                assert_eq!(apt.alt_m(), Some(396.0));
                assert!(apt.taxi_nodes().iter().all(|n| n.has_local_coords()));
                assert!(apt.runway_ends().iter().all(|re| re.alt_m == Some(396.0)));
            })
            .unwrap();
        assert_eq!(net.refresh(&here), RefreshOutcome::Idle);

        // moving a little is not enough
        let (lat, lon) = destination(47.01, 8.0, 45.0, 20_000.0);
        assert_eq!(net.refresh(&Position::new(lat, lon)), RefreshOutcome::Idle);

        // moving beyond the standard distance rescans and purges
        assert_eq!(net.refresh(&Position::new(-33.9, 151.2)), RefreshOutcome::ScanStarted);
        let report = net.wait_for_scan().cloned().unwrap();
        assert_eq!(report.airports_purged, 1);
        assert!(net.registry().is_empty());
    }

    #[test]
    fn test_snap_and_disabled_snap() {
        let mut net = net(Arc::new(MemorySource::new().with_file("apt.dat", small_field())));
        let here = Position::new(47.01, 8.0);
        net.refresh(&here);
        net.wait_for_scan();
        net.refresh(&here);

        let mut pos = Position::new(47.0055, 8.001 + 2.0 / lon_deg_in_m(47.0)).with_heading(1.0);
        assert!(net.snap(&mut pos));
        assert!((pos.lon - 8.001).abs() < 1e-6);
        assert_eq!(pos.phase, FlightPhase::Taxi);

        // outside every airport
        let mut far = Position::new(10.0, 10.0).with_heading(0.0);
        assert!(!net.snap(&mut far));
        assert_eq!((far.lat, far.lon, far.phase), (10.0, 10.0, FlightPhase::Unknown));

        net.config.snap_taxi_dist_m = 0.0;
        let mut pos = Position::new(47.0055, 8.001 + 2.0 / lon_deg_in_m(47.0)).with_heading(1.0);
        assert!(!net.snap(&mut pos));
    }

    #[test]
    fn test_new_local_frame_recomputes_coordinates() {
        let mut net = net(Arc::new(MemorySource::new().with_file("apt.dat", small_field())));
        let here = Position::new(47.01, 8.0);
        net.refresh(&here);
        net.wait_for_scan();
        assert_eq!(net.refresh(&here), RefreshOutcome::Backfilled);

        let local_of = |net: &TaxiNet| {
            net.registry()
                .with_airport("LSZS", |apt| {
                    (apt.taxi_nodes()[0].local(), apt.runway_ends()[0].node.local())
                })
                .unwrap()
        };
        let (node_before, end_before) = local_of(&net);
        assert!(node_before.is_some() && end_before.is_some());

        net.set_local_frame(Box::new(FlatEarthFrame::new(46.9, 8.1)));
        // without force, known coordinates are kept
        net.update_local_coordinates(false);
        assert_eq!(local_of(&net), (node_before, end_before));

        net.update_local_coordinates(true);
        let (node_after, end_after) = local_of(&net);
        let (x0, z0) = node_before.unwrap();
        let (x1, z1) = node_after.unwrap();
        assert!((x1 - x0).abs() > 1000.0 && (z1 - z0).abs() > 1000.0);
        assert_ne!(end_after, end_before);

        let mut pos = Position::new(47.0055, 8.001 + 2.0 / lon_deg_in_m(47.0)).with_heading(1.0);
        assert!(net.snap(&mut pos));
        assert!((pos.lon - 8.001).abs() < 1e-6);
        assert_eq!(pos.phase, FlightPhase::Taxi);
    }

    /// Source that blocks opening its only file until the test lets it go.
    struct GatedSource {
        gate: Mutex<Receiver<()>>,
        content: String,
    }

    impl LayoutSource for GatedSource {
        fn layout_paths(&self) -> Vec<String> {
            vec!["gated".to_string()]
        }

        fn open(&self, _path: &str) -> Result<LayoutReader, SourceError> {
            let _ = self.gate.lock().unwrap().recv();
            Ok(Box::new(Cursor::new(self.content.clone().into_bytes())))
        }
    }

    fn gated() -> (Arc<GatedSource>, Sender<()>) {
        let (tx, rx) = channel();
        let src = GatedSource {
            gate: Mutex::new(rx),
            content: small_field(),
        };
        (Arc::new(src), tx)
    }

    #[test]
    fn test_only_one_scan_in_flight() {
        let (src, gate) = gated();
        let mut net = net(src);
        let here = Position::new(47.01, 8.0);

        assert_eq!(net.refresh(&here), RefreshOutcome::ScanStarted);
        assert!(net.is_scanning());
        assert_eq!(net.refresh(&Position::new(-33.9, 151.2)), RefreshOutcome::ScanInFlight);

        gate.send(()).unwrap();
        assert_eq!(net.wait_for_scan().map(|r| r.files_read), Some(1));
        assert!(!net.is_scanning());
        assert!(net.registry().contains_id("LSZS"));
    }

    struct TrackedProbe(Arc<AtomicBool>);

    impl GroundProbe for TrackedProbe {
        fn ground_altitude(&mut self, _lat: f64, _lon: f64) -> f64 {
            100.0
        }

        fn release(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_shutdown_waits_and_releases_terrain() {
        let (src, gate) = gated();
        let released = Arc::new(AtomicBool::new(false));
        let mut net = TaxiNet::new(
            TaxinetConfig::default(),
            src,
            Box::new(FlatEarthFrame::new(47.0, 8.0)),
            Box::new(TrackedProbe(Arc::clone(&released))),
        );
        assert_eq!(net.refresh(&Position::new(47.01, 8.0)), RefreshOutcome::ScanStarted);

        gate.send(()).unwrap();
        net.shutdown();
        assert!(!net.is_scanning());
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(net.refresh(&Position::new(47.01, 8.0)), RefreshOutcome::ShutDown);
    }
}
