// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Streaming `apt.dat` reader feeding the airport registry.
//!
//! Only three kinds of records matter here:
//! - `1` airport headers (with `16`/`17` seaplane bases and heliports closing the
//!   previous airport without starting a new one of interest)
//! - `100` land runways, also used to decide whether an airport is in the search area
//! - `120` line sections whose `111`-`116` nodes describe taxiway centerlines
//!
//! Everything else is skipped. A section reader hands the line that ended its
//! section back to the main loop instead of peeking ahead.

use crate::config::MIN_TAXI_SEGM_LEN_M;
use crate::geo::{estimated_distance_sqr, BoundingBox, M_PER_FT};
use crate::graph::{Airport, RawRunwayEnd, TaxiNodeId};
use crate::registry::AirportRegistry;
use crate::scan::StopFlag;
use log::debug;
use std::io::{self, BufRead};
use std::mem;

const MIN_TAXI_SEGM_LEN_M2: f64 = MIN_TAXI_SEGM_LEN_M * MIN_TAXI_SEGM_LEN_M;

/// Line type codes of taxiway centerlines (plain and lighted, each with and without border).
const CENTERLINE_TYPES: [u32; 4] = [1, 7, 51, 57];

/// A runway description has exactly this many fields.
const RUNWAY_FIELDS: usize = 26;

/// Reads airports from one layout file into a registry.
pub struct LayoutParser<'a> {
    registry: &'a AirportRegistry,
    search_box: BoundingBox,
    stop: &'a StopFlag,
    line_buf: Vec<u8>,
}

/// What a line inside a `120` section turned out to be.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SectionLine {
    Node(f64, f64),
    /// Blank or unreadable, ignored
    Skip,
    /// Not part of the centerline, ends the section
    End,
}

impl<'a> LayoutParser<'a> {
    pub fn new(registry: &'a AirportRegistry, search_box: BoundingBox, stop: &'a StopFlag) -> Self {
        Self {
            registry,
            search_box,
            stop,
            line_buf: Vec::with_capacity(256),
        }
    }

    /// Parses one file. Returns the number of airports added to the registry.
    ///
    /// An I/O error abandons the rest of the file and the airport in progress.
    pub fn parse<R: BufRead + ?Sized>(&mut self, reader: &mut R) -> io::Result<usize> {
        let mut apt = Airport::default();
        let mut pending: Option<String> = None;
        let mut added = 0;

        while !self.stop.is_stopped() {
            // a line handed back by the section reader goes first
            let line = match pending.take() {
                Some(line) => line,
                None => match self.next_line(reader)? {
                    Some(line) => line,
                    None => break,
                },
            };

            let fields: Vec<&str> = line.split_whitespace().collect();
            let Some(&code) = fields.first() else {
                continue;
            };

            match code {
                // too short for a header, not the start of an airport
                "1" if line.len() <= 10 => {}
                "1" => {
                    added += self.flush(&mut apt);
                    apt = self.start_airport(&fields);
                }
                "16" | "17" => added += self.flush(&mut apt),
                "99" => added += self.flush(&mut apt),
                "100" if apt.has_id() => self.read_runway(&fields, &mut apt),
                "120" if apt.has_runway_ends() => {
                    pending = self.read_centerline(reader, &mut apt)?;
                }
                _ => {}
            }
        }

        added += self.flush(&mut apt);
        Ok(added)
    }

    /// Next line without its line break, `None` at the end of input.
    fn next_line<R: BufRead + ?Sized>(&mut self, reader: &mut R) -> io::Result<Option<String>> {
        self.line_buf.clear();
        if reader.read_until(b'\n', &mut self.line_buf)? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.line_buf);
        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    }

    /// Hands a finished airport to the registry if it is usable.
    fn flush(&self, apt: &mut Airport) -> usize {
        let done = mem::take(apt);
        if done.is_valid() && self.registry.insert(done) {
            1
        } else {
            0
        }
    }

    /// Airports already known stay anonymous, and with that get ignored.
    fn start_airport(&self, fields: &[&str]) -> Airport {
        let Some(&id) = fields.get(4) else {
            return Airport::default();
        };
        if self.registry.contains_id(id) {
            return Airport::default();
        }

        let mut apt = Airport::new(id);
        if let Some(elev_ft) = fields.get(1).and_then(|s| s.parse::<f64>().ok()) {
            apt.set_declared_elevation_m(elev_ft * M_PER_FT);
        }
        apt
    }

    /// The first runway decides if the airport is in the search area at all.
    fn read_runway(&self, fields: &[&str], apt: &mut Airport) {
        if fields.len() != RUNWAY_FIELDS {
            return;
        }
        let num = |i: usize| fields[i].parse::<f64>().ok();

        let (Some(lat), Some(lon)) = (num(9), num(10)) else {
            return;
        };
        if !valid_location(lat, lon) {
            return;
        }

        if !apt.has_taxiways() && !self.search_box.contains(lat, lon) {
            *apt = Airport::default();
            return;
        }

        let (Some(displaced1), Some(lat2), Some(lon2), Some(displaced2)) =
            (num(11), num(18), num(19), num(20))
        else {
            return;
        };
        if !valid_location(lat2, lon2) {
            return;
        }

        apt.add_runway_ends(
            RawRunwayEnd {
                id: fields[8].to_string(),
                lat,
                lon,
                displaced_m: displaced1,
            },
            RawRunwayEnd {
                id: fields[17].to_string(),
                lat: lat2,
                lon: lon2,
                displaced_m: displaced2,
            },
        );
    }

    /// Reads the nodes following a `120` marker and adds the thinned centerline.
    ///
    /// Returns the line that ended the section for the main loop to process.
    fn read_centerline<R: BufRead + ?Sized>(
        &mut self,
        reader: &mut R,
        apt: &mut Airport,
    ) -> io::Result<Option<String>> {
        let mut nodes = Vec::new();
        let returned = loop {
            if self.stop.is_stopped() {
                break None;
            }
            let Some(line) = self.next_line(reader)? else {
                break None;
            };
            match classify_section_line(&line) {
                SectionLine::Node(lat, lon) => nodes.push((lat, lon)),
                SectionLine::Skip => continue,
                SectionLine::End => break Some(line),
            }
        };

        add_centerline(apt, nodes);
        Ok(returned)
    }
}

fn valid_location(lat: f64, lon: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..180.0).contains(&lon)
}

fn classify_section_line(line: &str) -> SectionLine {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.is_empty() {
        return SectionLine::Skip;
    }
    // at least code, latitude, longitude
    if fields.len() < 3 {
        return SectionLine::End;
    }
    let code = match fields[0].parse::<u32>() {
        Ok(c) if (111..=116).contains(&c) => c,
        _ => return SectionLine::End,
    };

    // 115/116 (and short lines) carry no line type, they count as centerline
    let type_field = match code {
        111 | 113 => fields.get(3),
        112 | 114 => fields.get(5),
        _ => None,
    };
    let line_type = match type_field.map(|s| s.parse::<u32>()) {
        None => 1,
        Some(Ok(t)) => t,
        Some(Err(_)) => return SectionLine::Skip,
    };
    if !CENTERLINE_TYPES.contains(&line_type) {
        return SectionLine::End;
    }

    match (fields[1].parse::<f64>(), fields[2].parse::<f64>()) {
        (Ok(lat), Ok(lon)) if valid_location(lat, lon) => SectionLine::Node(lat, lon),
        _ => SectionLine::Skip,
    }
}

/// Appends a node and connects it to `prev`, which then moves on to the new node.
fn extend_centerline(apt: &mut Airport, prev: &mut TaxiNodeId, node: (f64, f64), dist: f64) {
    let idx = apt.add_taxi_node(node.0, node.1);
    if let Err(e) = apt.add_taxi_edge(*prev, idx, Some(dist)) {
        debug!("apt.dat: {} at {}", e, apt.id());
    }
    *prev = idx;
}

/// Adds a centerline to the taxi network, thinned to segments of at least 10m.
///
/// The first and last node are always kept. Interior nodes too close to the
/// last kept node are dropped. Of the final three nodes, the middle one is
/// dropped if it is too close to either neighbour, and the last edge then
/// gets the length of both segments.
pub(crate) fn add_centerline(apt: &mut Airport, mut nodes: Vec<(f64, f64)>) {
    if nodes.len() < 2 {
        return;
    }
    let dist_sqr = |a: (f64, f64), b: (f64, f64)| estimated_distance_sqr(a.0, a.1, b.0, b.1);

    let mut prev = apt.add_taxi_node(nodes[0].0, nodes[0].1);

    let mut i = 0;
    while i + 3 < nodes.len() {
        let d = dist_sqr(nodes[i], nodes[i + 1]);
        if d < MIN_TAXI_SEGM_LEN_M2 {
            nodes.remove(i + 1);
        } else {
            extend_centerline(apt, &mut prev, nodes[i + 1], d.sqrt());
            i += 1;
        }
    }

    let mut dist_to_last = None;
    if nodes.len() >= 3 {
        let n = nodes.len();
        let (a, b, c) = (nodes[n - 3], nodes[n - 2], nodes[n - 1]);
        let ab = dist_sqr(a, b);
        let bc = dist_sqr(b, c);
        if ab < MIN_TAXI_SEGM_LEN_M2 || bc < MIN_TAXI_SEGM_LEN_M2 {
            nodes.remove(n - 2);
            dist_to_last = Some(ab.sqrt() + bc.sqrt());
        } else {
            extend_centerline(apt, &mut prev, b, ab.sqrt());
            dist_to_last = Some(bc.sqrt());
        }
    }

    let n = nodes.len();
    let (y, z) = (nodes[n - 2], nodes[n - 1]);
    let dist = dist_to_last.unwrap_or_else(|| dist_sqr(y, z).sqrt());
    extend_centerline(apt, &mut prev, z, dist);
}
