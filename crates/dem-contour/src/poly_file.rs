//! Osmosis polygon filter files (`.poly`).
//!
//! ```text
//! alps
//! 1
//!    6.0   43.0
//!    8.0   43.0
//!    8.0   45.0
//! END
//! !2
//!    6.5   43.5
//!    ...
//! END
//! END
//! ```
//!
//! The first line names the file. Each ring starts with a header line and
//! lists one `lon lat` pair per line up to `END`; a final `END` closes the
//! file. Rings whose header starts with `!` are holes. Holes are not
//! subtracted from the mask, so they are skipped.

use crate::mask::Polygon;
use crate::{DemError, Result};
use std::path::Path;
use tracing::debug;

/// Read polygons from a `.poly` file.
pub fn read_poly_file(path: impl AsRef<Path>) -> Result<Vec<Polygon>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let polygons = parse_poly(&text)?;
    debug!(path = %path.display(), polygons = polygons.len(), "Read polygon file");
    Ok(polygons)
}

/// Parse the content of a `.poly` file.
pub fn parse_poly(text: &str) -> Result<Vec<Polygon>> {
    let invalid = |line: usize, reason: &str| DemError::InvalidPolygonFile {
        line,
        reason: reason.to_string(),
    };

    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());

    if lines.next().is_none() {
        return Err(invalid(1, "empty file"));
    }

    let mut polygons = Vec::new();
    let mut last_line = 1;
    loop {
        let Some((header_line, header)) = lines.next() else {
            return Err(invalid(last_line, "missing final END"));
        };
        if header.eq_ignore_ascii_case("END") {
            break;
        }
        let hole = header.starts_with('!');

        let mut points = Vec::new();
        let mut closed = false;
        for (n, line) in lines.by_ref() {
            last_line = n;
            if line.eq_ignore_ascii_case("END") {
                closed = true;
                break;
            }
            points.push(parse_point(line).ok_or_else(|| {
                invalid(n, &format!("expected 'lon lat', got '{}'", line))
            })?);
        }
        if !closed {
            return Err(invalid(last_line, &format!("ring '{}' has no END", header)));
        }
        if points.len() < 3 {
            return Err(invalid(
                header_line,
                &format!("ring '{}' needs at least 3 points", header),
            ));
        }

        if !hole {
            polygons.push(Polygon::new(points));
        }
    }

    Ok(polygons)
}

fn parse_point(line: &str) -> Option<(f64, f64)> {
    let mut parts = line.split_whitespace();
    let lon: f64 = parts.next()?.parse().ok()?;
    let lat: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !lon.is_finite() || !lat.is_finite() {
        return None;
    }
    Some((lon, lat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TWO_RINGS: &str = "\
test
1
   6.0E+00   4.3E+01
   7.0   43.0
   7.0   44.0
   6.0   44.0
END
!1_hole
   6.4   43.4
   6.6   43.4
   6.6   43.6
END
second
   10.0   45.0
   11.0   45.0
   10.5   46.0
END
END
";

    #[test]
    fn test_parse_rings_and_skip_holes() {
        let polygons = parse_poly(TWO_RINGS).unwrap();
        assert_eq!(polygons.len(), 2);
        assert_eq!(polygons[0].points().len(), 4);
        assert_eq!(polygons[0].points()[0], (6.0, 43.0));
        assert_eq!(polygons[1].points()[2], (10.5, 46.0));
    }

    #[test]
    fn test_missing_final_end() {
        let text = "x\n1\n0 0\n1 0\n1 1\nEND\n";
        assert!(matches!(
            parse_poly(text),
            Err(DemError::InvalidPolygonFile { line: 6, .. })
        ));
    }

    #[test]
    fn test_bad_coordinate_line() {
        let text = "x\n1\n0 0\n1 zero\n1 1\nEND\nEND\n";
        assert!(matches!(
            parse_poly(text),
            Err(DemError::InvalidPolygonFile { line: 4, .. })
        ));
    }

    #[test]
    fn test_degenerate_ring() {
        let text = "x\n1\n0 0\n1 0\nEND\nEND\n";
        assert!(matches!(
            parse_poly(text),
            Err(DemError::InvalidPolygonFile { line: 2, .. })
        ));
    }

    #[test]
    fn test_empty_file() {
        assert!(matches!(
            parse_poly("\n\n"),
            Err(DemError::InvalidPolygonFile { line: 1, .. })
        ));
    }

    #[test]
    fn test_read_poly_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("area.poly");
        std::fs::write(&path, TWO_RINGS).unwrap();
        assert_eq!(read_poly_file(&path).unwrap().len(), 2);
        assert!(matches!(
            read_poly_file(dir.path().join("missing.poly")),
            Err(DemError::Io(_))
        ));
    }
}
