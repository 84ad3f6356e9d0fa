//! # Geography Module
//!
//! Tax points and geo paths: the positions in an itinerary where a tax may
//! be assessed.
//!
//! ## Geo Path Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  A geo path lists BOTH ends of every flight segment:                    │
//! │                                                                         │
//! │   index:   0         1         2         3                              │
//! │   tag:     Departure Arrival   Departure Arrival                        │
//! │            JFK ────────► LHR   LHR ────────► CDG                        │
//! │                                                                         │
//! │   Departure taxes walk indices 0, 2, 4, ... (even = departures)         │
//! │   Arrival taxes walk indices N-1, N-3, ..., 1 (odd = arrivals)          │
//! │   Sale taxes apply once, at the point-of-sale tax point                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Geo paths are owned by the request and read-only during processing.

use serde::{Deserialize, Serialize};

use crate::codes::{CarrierCode, Nation};

// =============================================================================
// Tax Point Tag
// =============================================================================

/// Where in the journey a tax point sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxPointTag {
    /// A flight segment's origin.
    Departure,
    /// A flight segment's destination.
    Arrival,
    /// The point of sale.
    Sale,
}

// =============================================================================
// Geo / GeoPath
// =============================================================================

/// One indexed position in a geo path (or the point of sale).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geo {
    /// Departure/Arrival for path positions, Sale for the point of sale.
    pub tag: TaxPointTag,
    /// Nation of the location.
    pub nation: Nation,
}

impl Geo {
    pub fn new(tag: TaxPointTag, nation: impl Into<Nation>) -> Self {
        Geo {
            tag,
            nation: nation.into(),
        }
    }
}

/// An itinerary's ordered sequence of tax points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoPath {
    pub geos: Vec<Geo>,
}

impl GeoPath {
    pub fn new(geos: Vec<Geo>) -> Self {
        GeoPath { geos }
    }

    /// Number of tax points in the path.
    pub fn len(&self) -> usize {
        self.geos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geos.is_empty()
    }

    /// The tax point at `index`, if in range.
    pub fn geo(&self, index: usize) -> Option<&Geo> {
        self.geos.get(index)
    }

    /// Journey origin and final destination share a nation.
    ///
    /// Stands in for the external geo-properties calculator's round-trip /
    /// open-jaw determination; hosts may substitute richer logic.
    pub fn is_round_trip_or_open_jaw(&self) -> bool {
        match (self.geos.first(), self.geos.last()) {
            (Some(first), Some(last)) => first.nation == last.nation,
            _ => false,
        }
    }
}

// =============================================================================
// Flights
// =============================================================================

/// A flight referenced by itinerary flight usages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    pub marketing_carrier: CarrierCode,
}

/// One itinerary's use of a flight; usage `i` covers geo indices `2i` and
/// `2i + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightUsage {
    pub flight_ref: usize,
}

// =============================================================================
// Unit Tests
// =============================================================================
