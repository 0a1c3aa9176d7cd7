// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Registry of all airports currently known, keyed by airport id.
//!
//! One mutex guards the whole map. The scanner takes it only to check ids
//! and to insert a finished airport, never while reading files, so
//! foreground queries wait at most for a single map mutation.

use crate::geo::BoundingBox;
use crate::graph::Airport;
use log::debug;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

pub type AirportMap = BTreeMap<String, Airport>;

#[derive(Debug, Default)]
pub struct AirportRegistry {
    airports: Mutex<AirportMap>,
    /// Added around every airport's bounding box on insert
    margin_m: f64,
}

impl AirportRegistry {
    pub fn new(margin_m: f64) -> Self {
        Self {
            airports: Mutex::new(BTreeMap::new()),
            margin_m,
        }
    }

    fn lock(&self) -> MutexGuard<'_, AirportMap> {
        // every mutation is a single map call, so a poisoned map is still consistent
        self.airports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Moves a finished airport into the registry.
    ///
    /// Grows its bounding box by the margin and sorts its edges by heading
    /// first. An id already present is kept and the new airport dropped.
    pub fn insert(&self, mut airport: Airport) -> bool {
        airport.enlarge_bounds_m(self.margin_m);
        airport.sort_edges();

        let mut map = self.lock();
        match map.entry(airport.id().to_string()) {
            Entry::Occupied(_) => {
                debug!("apt.dat: {} already known, ignored", airport.id());
                false
            }
            Entry::Vacant(slot) => {
                debug!(
                    "apt.dat: Added {} at {} with {} runways ({}) and [{}|{}] taxi nodes|edges",
                    airport.id(),
                    airport.bounds(),
                    airport.runway_ends().len() / 2,
                    airport.runways_string(),
                    airport.taxi_nodes().len(),
                    airport.taxiway_count()
                );
                slot.insert(airport);
                true
            }
        }
    }

    /// Removes every airport whose bounding box does not overlap `bx`.
    /// Returns the number of airports removed.
    pub fn purge(&self, bx: &BoundingBox) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|id, apt| {
            let keep = apt.bounds().overlaps(bx);
            if !keep {
                debug!("apt.dat: Removed {} at {}", id, apt.bounds());
            }
            keep
        });
        debug!("Done purging, {} airports left", map.len());
        before - map.len()
    }

    /// Id of the airport whose bounding box contains the location.
    pub fn find(&self, lat: f64, lon: f64) -> Option<String> {
        self.with_airport_at(lat, lon, |apt| apt.id().to_string())
    }

    /// Runs `f` on the airport containing the location, under the lock.
    pub fn with_airport_at<R>(&self, lat: f64, lon: f64, f: impl FnOnce(&Airport) -> R) -> Option<R> {
        let map = self.lock();
        map.values().find(|apt| apt.contains(lat, lon)).map(f)
    }

    /// Runs `f` on the airport with the given id, under the lock.
    pub fn with_airport<R>(&self, id: &str, f: impl FnOnce(&Airport) -> R) -> Option<R> {
        self.lock().get(id).map(f)
    }

    /// Runs `f` over all airports, under the lock.
    pub fn with_airports<R>(&self, f: impl FnOnce(&AirportMap) -> R) -> R {
        f(&self.lock())
    }

    /// Runs `f` over all airports with mutable access, under the lock.
    pub fn with_airports_mut<R>(&self, f: impl FnOnce(&mut AirportMap) -> R) -> R {
        f(&mut self.lock())
    }
}
