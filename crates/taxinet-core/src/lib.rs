// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

pub mod config;
pub mod geo;
pub mod graph;
pub mod parser;
pub mod refresh;
pub mod registry;
pub mod runway;
pub mod scan;
pub mod sim;
pub mod source;

pub use config::{ConfigError, TaxinetConfig};
pub use geo::{BoundingBox, FlightPhase, Position};
pub use graph::{Airport, Edge, EdgeKind, GraphError};
pub use refresh::{RefreshOutcome, TaxiNet};
pub use registry::AirportRegistry;
pub use runway::{AircraftModel, AircraftState, RunwayMatch, RunwaySearch};
pub use scan::{ScanReport, StopFlag};
pub use sim::{ConstantElevation, FlatEarthFrame, GroundProbe, LocalFrame, NoTerrain};
pub use source::{LayoutSource, MemorySource, SourceError, XPlaneSource};
