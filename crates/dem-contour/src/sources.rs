//! Elevation file sources and priority resolution.
//!
//! A [`Source`] maps a tile id and resolution to a local file, or to nothing.
//! Sources are bound to a resolution through [`SourceBinding`] and stacked in
//! a [`PriorityResolver`]; both implement [`TileResolver`], so a single source
//! and a ranked list of sources are used the same way.
//!
//! ```no_run
//! use dem_contour::{resolve_files, Area, SourcePool, SourceSpec};
//!
//! let pool = SourcePool::with_directory_sources("hgt", ["srtm", "view"]);
//! let specs: Vec<SourceSpec> = vec!["srtm1".parse()?, "view3".parse()?];
//! let resolver = pool.resolver(&specs)?;
//!
//! let area: Area = "6:43:8:45".parse()?;
//! for file in resolve_files(Some(&area), None, &resolver)? {
//!     println!("{}", file.path.display());
//! }
//! # Ok::<(), dem_contour::DemError>(())
//! ```

use crate::area::Area;
use crate::mask::{polygons_bounds, Polygon};
use crate::tile_id::TileId;
use crate::{DemError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// File extensions tried by [`DirectorySource`], in order.
const DIRECTORY_EXTENSIONS: [&str; 3] = ["hgt", "tif", "tiff"];

/// A file found for a tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFile {
    pub path: PathBuf,
    /// The file came from a fallback provider of the source.
    pub alternate_provider: bool,
}

impl ResolvedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ResolvedFile {
            path: path.into(),
            alternate_provider: false,
        }
    }
}

/// A provider of elevation files.
///
/// Returning `Ok(None)` means the source has no file for that tile. Errors
/// are reported to the caller, which treats them as absence.
pub trait Source: Send + Sync + fmt::Debug {
    /// Name used in source specs, lowercase.
    fn name(&self) -> &str;

    fn get_file(&self, tile: TileId, resolution: u8) -> Result<Option<ResolvedFile>>;
}

/// Anything that can pick a file for a tile.
pub trait TileResolver: Send + Sync {
    fn resolve(&self, tile: TileId) -> Option<ResolvedFile>;

    /// A resolver that can never return a file.
    fn is_empty(&self) -> bool {
        false
    }
}

/// A source name and resolution, written `<name><resolution>` (`srtm1`,
/// `view3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceSpec {
    name: String,
    resolution: u8,
}

impl SourceSpec {
    pub fn new(name: &str, resolution: u8) -> Result<Self> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DemError::InvalidSource(format!(
                "source name '{}' must be alphabetic",
                name
            )));
        }
        if resolution != 1 && resolution != 3 {
            return Err(DemError::InvalidSource(format!(
                "resolution of '{}' must be 1 or 3 arc-seconds, got {}",
                name, resolution
            )));
        }
        Ok(SourceSpec {
            name: name.to_ascii_lowercase(),
            resolution,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arc-seconds per sample.
    pub fn resolution(&self) -> u8 {
        self.resolution
    }
}

impl FromStr for SourceSpec {
    type Err = DemError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| DemError::InvalidSource(format!("'{}' has no resolution suffix", s)))?;
        let (name, resolution) = s.split_at(split);
        let resolution = resolution
            .parse()
            .map_err(|_| DemError::InvalidSource(format!("'{}' has an invalid resolution", s)))?;
        SourceSpec::new(name, resolution)
    }
}

impl TryFrom<String> for SourceSpec {
    type Error = DemError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SourceSpec> for String {
    fn from(spec: SourceSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.resolution)
    }
}

// ============================================================================
// Sources
// ============================================================================

/// Files stored on disk as `<root>/<NAME><res>/<TILE>.hgt` (or `.tif`, `.tiff`).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    name: String,
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(name: &str, root: impl Into<PathBuf>) -> Self {
        DirectorySource {
            name: name.to_ascii_lowercase(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding files of one resolution.
    pub fn directory(&self, resolution: u8) -> PathBuf {
        self.root
            .join(format!("{}{}", self.name.to_ascii_uppercase(), resolution))
    }
}

impl Source for DirectorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_file(&self, tile: TileId, resolution: u8) -> Result<Option<ResolvedFile>> {
        let dir = self.directory(resolution);
        for ext in DIRECTORY_EXTENSIONS {
            let path = dir.join(format!("{}.{}", tile, ext));
            match std::fs::metadata(&path) {
                Ok(meta) if meta.is_file() => return Ok(Some(ResolvedFile::new(path))),
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }
}

/// One named source backed by several providers tried in order.
///
/// Files coming from any provider but the first are flagged as
/// [`ResolvedFile::alternate_provider`].
#[derive(Debug, Clone)]
pub struct LayeredSource {
    name: String,
    providers: Vec<Arc<dyn Source>>,
}

impl LayeredSource {
    pub fn new(name: &str, providers: Vec<Arc<dyn Source>>) -> Self {
        LayeredSource {
            name: name.to_ascii_lowercase(),
            providers,
        }
    }
}

impl Source for LayeredSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_file(&self, tile: TileId, resolution: u8) -> Result<Option<ResolvedFile>> {
        for (i, provider) in self.providers.iter().enumerate() {
            match provider.get_file(tile, resolution) {
                Ok(Some(mut file)) => {
                    file.alternate_provider |= i > 0;
                    return Ok(Some(file));
                }
                Ok(None) => {}
                Err(e) => warn!(
                    source = %self.name,
                    provider = provider.name(),
                    %tile,
                    "Provider failed, trying the next one: {}",
                    e
                ),
            }
        }
        Ok(None)
    }
}

// ============================================================================
// Resolvers
// ============================================================================

/// A source used at a fixed resolution.
#[derive(Debug, Clone)]
pub struct SourceBinding {
    source: Arc<dyn Source>,
    resolution: u8,
}

impl SourceBinding {
    pub fn new(source: Arc<dyn Source>, resolution: u8) -> Self {
        SourceBinding { source, resolution }
    }
}

impl TileResolver for SourceBinding {
    fn resolve(&self, tile: TileId) -> Option<ResolvedFile> {
        match self.source.get_file(tile, self.resolution) {
            Ok(file) => file,
            Err(e) => {
                warn!(
                    source = self.source.name(),
                    resolution = self.resolution,
                    %tile,
                    "Source failed, treating tile as missing: {}",
                    e
                );
                None
            }
        }
    }
}

/// Resolvers tried in order; the first file found wins.
#[derive(Default)]
pub struct PriorityResolver {
    resolvers: Vec<Box<dyn TileResolver>>,
}

impl PriorityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolver with the lowest priority so far.
    pub fn push(&mut self, resolver: impl TileResolver + 'static) {
        self.resolvers.push(Box::new(resolver));
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }
}

impl TileResolver for PriorityResolver {
    fn resolve(&self, tile: TileId) -> Option<ResolvedFile> {
        self.resolvers.iter().find_map(|r| r.resolve(tile))
    }

    fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl fmt::Debug for PriorityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityResolver")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

/// Registry of named sources.
#[derive(Debug, Default, Clone)]
pub struct SourcePool {
    sources: BTreeMap<String, Arc<dyn Source>>,
}

impl SourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pool of [`DirectorySource`]s sharing one root.
    pub fn with_directory_sources<I, S>(root: impl AsRef<Path>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pool = Self::new();
        for name in names {
            pool.register(Arc::new(DirectorySource::new(name.as_ref(), root.as_ref())));
        }
        pool
    }

    /// Add a source, replacing any source of the same name.
    pub fn register(&mut self, source: Arc<dyn Source>) {
        self.sources.insert(source.name().to_string(), source);
    }

    pub fn get_source(&self, name: &str) -> Option<Arc<dyn Source>> {
        self.sources.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Registered names, sorted.
    pub fn available_source_names(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    /// Build a resolver trying `specs` in order.
    pub fn resolver(&self, specs: &[SourceSpec]) -> Result<PriorityResolver> {
        let mut resolver = PriorityResolver::new();
        for spec in specs {
            let source = self.get_source(spec.name()).ok_or_else(|| {
                DemError::InvalidSource(format!(
                    "unknown source '{}', available: {}",
                    spec.name(),
                    self.available_source_names().join(", ")
                ))
            })?;
            resolver.push(SourceBinding::new(source, spec.resolution()));
        }
        Ok(resolver)
    }
}

/// Find a file for every tile needed to cover an area or a set of polygons.
///
/// Tiles are enumerated latitude first, then longitude, both ascending, and
/// the result keeps that order. With polygons only, the area is their
/// bounding box and tiles whose cell does not touch any polygon's bounding
/// box are skipped. Tiles no source provides are logged and left out.
pub fn resolve_files(
    area: Option<&Area>,
    polygons: Option<&[Polygon]>,
    resolver: &dyn TileResolver,
) -> Result<Vec<ResolvedFile>> {
    if resolver.is_empty() {
        debug!("No elevation source configured");
        return Ok(Vec::new());
    }

    let bounds = match (area, polygons) {
        (Some(area), _) => area.bounds(),
        (None, Some(polygons)) => match polygons_bounds(polygons) {
            Some(bounds) => bounds,
            None => return Ok(Vec::new()),
        },
        (None, None) => return Ok(Vec::new()),
    };

    let polygon_boxes: Option<Vec<_>> =
        polygons.map(|p| p.iter().filter_map(Polygon::bounds).collect());
    let ids: Vec<TileId> = TileId::covering(&bounds)
        .into_iter()
        .filter(|id| match &polygon_boxes {
            Some(boxes) => boxes.iter().any(|b| b.intersects(&id.cell())),
            None => true,
        })
        .collect();
    debug!(
        min_lat = bounds.min_lat,
        min_lon = bounds.min_lon,
        max_lat = bounds.max_lat,
        max_lon = bounds.max_lon,
        tiles = ids.len(),
        "Resolving elevation files"
    );

    let resolved: Vec<(TileId, Option<ResolvedFile>)> = ids
        .par_iter()
        .map(|&id| (id, resolver.resolve(id)))
        .collect();

    Ok(resolved
        .into_iter()
        .filter_map(|(id, file)| {
            if file.is_none() {
                warn!("{}", DemError::SourceUnavailable(id));
            }
            file
        })
        .collect())
}
