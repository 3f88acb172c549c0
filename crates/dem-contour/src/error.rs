//! Error types for the DEM contour crate.

use crate::tile_id::TileId;
use thiserror::Error;

/// Errors that can occur when loading, tiling or contouring DEM data.
#[derive(Debug, Error)]
pub enum DemError {
    /// I/O error reading a file. Elevation files that are missing or cannot
    /// be opened surface here rather than as [`DemError::FileFormat`].
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding error.
    #[error("TIFF decode error: {0}")]
    TiffDecode(#[from] tiff::TiffError),

    /// The file was read but its content is not an elevation grid, or its
    /// dimensions cannot be determined.
    #[error("Invalid elevation file {path}: {reason}")]
    FileFormat {
        /// Offending file.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The geographic bounds of a file could not be determined.
    #[error("Cannot georeference {0}: no bounds metadata and no tile name")]
    Georeference(String),

    /// Unsupported sample type in the TIFF file.
    #[error("Unsupported TIFF data type: {0}")]
    UnsupportedDataType(String),

    /// Malformed or degenerate geographic area.
    #[error("Invalid area {area}: {reason}")]
    InvalidArea {
        /// The area as given by the caller.
        area: String,
        /// Reason for rejection.
        reason: String,
    },

    /// Malformed source specification or unknown source name.
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// No configured source could provide the tile.
    #[error("No source provides tile {0}")]
    SourceUnavailable(TileId),

    /// Malformed polygon file.
    #[error("Invalid polygon file (line {line}): {reason}")]
    InvalidPolygonFile {
        /// 1-based line number.
        line: usize,
        /// Reason for rejection.
        reason: String,
    },

    /// An option value is out of its valid range.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// Configuration file could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl DemError {
    pub(crate) fn file_format(path: &std::path::Path, reason: impl Into<String>) -> Self {
        DemError::FileFormat {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}
