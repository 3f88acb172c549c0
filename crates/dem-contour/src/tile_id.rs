//! 1x1 degree tile identifiers.

use crate::TileBounds;
use std::fmt;
use std::str::FromStr;

/// Identifier of a 1x1 degree cell, keyed by its south-west corner.
///
/// Formatted the SRTM way: `N43E006` covers latitude 43°N to 44°N and
/// longitude 6°E to 7°E, `S05W073` covers 5°S to 4°S and 73°W to 72°W.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    /// Latitude of the south edge.
    pub lat: i32,
    /// Longitude of the west edge.
    pub lon: i32,
}

impl TileId {
    /// Create a tile id from its south-west corner.
    pub fn new(lat: i32, lon: i32) -> Self {
        TileId { lat, lon }
    }

    /// Tile containing a coordinate.
    pub fn from_coord(lat: f64, lon: f64) -> Self {
        TileId {
            lat: lat.floor() as i32,
            lon: lon.floor() as i32,
        }
    }

    /// Every cell touching `bounds`, latitude outer and longitude inner, both
    /// ascending. A box with no height or width still touches the cells it
    /// lies in.
    pub fn covering(bounds: &TileBounds) -> Vec<TileId> {
        let sw = TileId::from_coord(bounds.min_lat, bounds.min_lon);
        let lat_end = (bounds.max_lat.ceil() as i32).max(sw.lat + 1);
        let lon_end = (bounds.max_lon.ceil() as i32).max(sw.lon + 1);
        (sw.lat..lat_end)
            .flat_map(|lat| (sw.lon..lon_end).map(move |lon| TileId::new(lat, lon)))
            .collect()
    }

    /// Find a tile id inside a file name such as `N43E006.hgt` or
    /// `SRTM1_s05w073_v3.tif`.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let bytes = filename.as_bytes();

        for start in 0..bytes.len() {
            let lat_sign = match bytes[start].to_ascii_uppercase() {
                b'N' => 1,
                b'S' => -1,
                _ => continue,
            };
            let lat_digits = count_digits(&bytes[start + 1..]);
            if lat_digits == 0 || lat_digits > 2 {
                continue;
            }
            let lon_pos = start + 1 + lat_digits;
            let lon_sign = match bytes.get(lon_pos).map(|b| b.to_ascii_uppercase()) {
                Some(b'E') => 1,
                Some(b'W') => -1,
                _ => continue,
            };
            let lon_digits = count_digits(&bytes[lon_pos + 1..]);
            if lon_digits == 0 || lon_digits > 3 {
                continue;
            }

            let lat: i32 = filename[start + 1..lon_pos].parse().ok()?;
            let lon: i32 = filename[lon_pos + 1..lon_pos + 1 + lon_digits].parse().ok()?;
            if lat > 90 || lon > 180 {
                continue;
            }
            return Some(TileId {
                lat: lat_sign * lat,
                lon: lon_sign * lon,
            });
        }

        None
    }

    /// Geographic extent of the cell.
    pub fn cell(&self) -> TileBounds {
        TileBounds {
            min_lat: self.lat as f64,
            max_lat: (self.lat + 1) as f64,
            min_lon: self.lon as f64,
            max_lon: (self.lon + 1) as f64,
        }
    }
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.lat >= 0 { 'N' } else { 'S' };
        let ew = if self.lon >= 0 { 'E' } else { 'W' };
        write!(f, "{}{:02}{}{:03}", ns, self.lat.abs(), ew, self.lon.abs())
    }
}

impl FromStr for TileId {
    type Err = crate::DemError;

    fn from_str(s: &str) -> crate::Result<Self> {
        TileId::from_filename(s).ok_or_else(|| crate::DemError::Georeference(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_id_display() {
        assert_eq!(TileId::new(43, 6).to_string(), "N43E006");
        assert_eq!(TileId::new(-5, -73).to_string(), "S05W073");
        assert_eq!(TileId::new(0, -1).to_string(), "N00W001");
    }

    #[test]
    fn test_tile_id_from_filename() {
        assert_eq!(TileId::from_filename("N43E006.hgt"), Some(TileId::new(43, 6)));
        assert_eq!(
            TileId::from_filename("hgt/VIEW1/S05W073.hgt"),
            Some(TileId::new(-5, -73))
        );
        assert_eq!(
            TileId::from_filename("srtm_n02e001_v3.tif"),
            Some(TileId::new(2, 1))
        );

        // Invalid filename
        assert!(TileId::from_filename("no-name.not_hgt").is_none());
        assert!(TileId::from_filename("invalid.tif").is_none());
    }

    #[test]
    fn test_tile_id_from_coord() {
        assert_eq!(TileId::from_coord(43.5, 6.2), TileId::new(43, 6));
        assert_eq!(TileId::from_coord(-4.5, -72.3), TileId::new(-5, -73));
        // Corner belongs to the cell to the north-east
        assert_eq!(TileId::from_coord(43.0, 6.0), TileId::new(43, 6));
    }

    #[test]
    fn test_covering() {
        let bounds = TileBounds {
            min_lat: 2.0,
            max_lat: 4.0,
            min_lon: 1.0,
            max_lon: 3.0,
        };
        let ids: Vec<String> = TileId::covering(&bounds).iter().map(|t| t.to_string()).collect();
        assert_eq!(ids, vec!["N02E001", "N02E002", "N03E001", "N03E002"]);

        // A flat east-west line inside one row of cells
        let line = TileBounds {
            min_lat: 43.5,
            max_lat: 43.5,
            min_lon: 6.2,
            max_lon: 7.4,
        };
        assert_eq!(
            TileId::covering(&line),
            vec![TileId::new(43, 6), TileId::new(43, 7)]
        );

        // A single point on integer degrees
        let point = TileBounds {
            min_lat: 44.0,
            max_lat: 44.0,
            min_lon: 6.0,
            max_lon: 6.0,
        };
        assert_eq!(TileId::covering(&point), vec![TileId::new(44, 6)]);
    }

    #[test]
    fn test_cell_bounds() {
        let cell = TileId::new(-5, -73).cell();
        assert_eq!(cell.min_lat, -5.0);
        assert_eq!(cell.max_lat, -4.0);
        assert_eq!(cell.min_lon, -73.0);
        assert_eq!(cell.max_lon, -72.0);
    }
}
