//! Requested geographic areas.

use crate::tile_id::TileId;
use crate::{DemError, Result, TileBounds};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A rectangular geographic box requested by the caller.
///
/// Unlike [`TileBounds`], an `Area` is always validated: `min_lon < max_lon`
/// and `min_lat < max_lat`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Area {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl Area {
    /// Create a validated area.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self> {
        let invalid = |reason: &str| DemError::InvalidArea {
            area: format!("{}:{}:{}:{}", min_lon, min_lat, max_lon, max_lat),
            reason: reason.to_string(),
        };

        if ![min_lon, min_lat, max_lon, max_lat].iter().all(|v| v.is_finite()) {
            return Err(invalid("coordinates must be finite"));
        }
        if min_lon >= max_lon {
            return Err(invalid("minimum longitude must be below maximum longitude"));
        }
        if min_lat >= max_lat {
            return Err(invalid("minimum latitude must be below maximum latitude"));
        }

        Ok(Area {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    /// Area covering the given bounds.
    pub fn from_bounds(bounds: &TileBounds) -> Result<Self> {
        Self::new(bounds.min_lon, bounds.min_lat, bounds.max_lon, bounds.max_lat)
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    /// The area as plain bounds.
    pub fn bounds(&self) -> TileBounds {
        TileBounds {
            min_lat: self.min_lat,
            max_lat: self.max_lat,
            min_lon: self.min_lon,
            max_lon: self.max_lon,
        }
    }

    /// Every 1x1 degree tile intersecting the area.
    ///
    /// Latitude is the outer loop and longitude the inner loop, both
    /// ascending. Callers rely on this order.
    pub fn tile_ids(&self) -> Vec<TileId> {
        TileId::covering(&self.bounds())
    }
}

impl FromStr for Area {
    type Err = DemError;

    /// Parse `"lonMin:latMin:lonMax:latMax"`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| DemError::InvalidArea {
            area: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(invalid("expected lonMin:latMin:lonMax:latMax"));
        }

        let mut values = [0.0f64; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            *value = part
                .parse()
                .map_err(|_| invalid(&format!("'{}' is not a number", part)))?;
        }

        Area::new(values[0], values[1], values[2], values[3])
    }
}

impl TryFrom<String> for Area {
    type Error = DemError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Area> for String {
    fn from(area: Area) -> Self {
        area.to_string()
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}
