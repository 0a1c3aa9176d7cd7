// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! One pass over all layout files around a center point.

use crate::geo::{BoundingBox, Position, M_PER_NM};
use crate::parser::LayoutParser;
use crate::registry::AirportRegistry;
use crate::source::{LayoutSource, SourceError};
use log::{debug, error, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Cooperative cancellation, polled once per line read.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub files_read: usize,
    pub airports_added: usize,
    pub airports_purged: usize,
    /// Files that exist but could not be read
    pub failed_files: Vec<String>,
}

/// Drops airports outside the box of `width_m` around `center`, then reads
/// every layout file the source lists and adds the airports found inside.
pub fn scan_layouts(
    source: &dyn LayoutSource,
    registry: &AirportRegistry,
    center: &Position,
    width_m: f64,
    stop: &StopFlag,
) -> ScanReport {
    let search_box = BoundingBox::around(center.lat, center.lon, width_m, width_m);
    let mut report = ScanReport {
        airports_purged: registry.purge(&search_box),
        ..ScanReport::default()
    };

    let mut parser = LayoutParser::new(registry, search_box, stop);
    for path in source.layout_paths() {
        if stop.is_stopped() {
            debug!("apt.dat: scan stopped before {}", path);
            return report;
        }

        let mut reader = match source.open(&path) {
            Ok(reader) => reader,
            Err(SourceError::NotFound(_)) => continue,
            Err(e) => {
                error!("{}", e);
                report.failed_files.push(path);
                continue;
            }
        };

        debug!("Reading apt.dat from {}", path);
        match parser.parse(&mut reader) {
            Ok(added) => {
                report.files_read += 1;
                report.airports_added += added;
            }
            Err(e) => {
                error!("Could not read {}: {}", path, e);
                report.failed_files.push(path);
            }
        }
    }

    if report.files_read == 0 {
        warn!("Could not open ANY apt.dat file. No taxiway snapping or runway finding available.");
        return report;
    }

    debug!(
        "Done reading from {} apt.dat files, have now {} airports",
        report.files_read,
        registry.len()
    );
    report
}

/// Runs [`scan_layouts`] on its own thread.
pub fn spawn_scan(
    source: Arc<dyn LayoutSource>,
    registry: Arc<AirportRegistry>,
    center: Position,
    width_m: f64,
    stop: StopFlag,
) -> io::Result<JoinHandle<ScanReport>> {
    debug!(
        "Starting thread to read apt.dat for airports {:.1}nm around {}",
        width_m / M_PER_NM,
        center
    );
    thread::Builder::new()
        .name("taxinet-scan".to_string())
        .spawn(move || scan_layouts(source.as_ref(), &registry, &center, width_m, &stop))
}
