use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Coordinate system enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordinateSystem {
    /// Radar coordinates (azimuth row `y`, range column `x`)
    Radar,
    /// Geographic coordinates (latitude, longitude)
    Geographic,
}

impl CoordinateSystem {
    /// Names of the two spatial dimensions, row axis first
    pub fn dims(&self) -> [&'static str; 2] {
        match self {
            CoordinateSystem::Radar => ["y", "x"],
            CoordinateSystem::Geographic => ["lat", "lon"],
        }
    }
}

impl std::fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinateSystem::Radar => write!(f, "radar"),
            CoordinateSystem::Geographic => write!(f, "geographic"),
        }
    }
}

/// Geocoding direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Radar grids to geographic grids (`ra2ll`)
    RadarToGeographic,
    /// Geographic grids to radar grids (`ll2ra`)
    GeographicToRadar,
}

impl Direction {
    /// Coordinate system of the grids being transformed
    pub fn source(&self) -> CoordinateSystem {
        match self {
            Direction::RadarToGeographic => CoordinateSystem::Radar,
            Direction::GeographicToRadar => CoordinateSystem::Geographic,
        }
    }

    /// Coordinate system of the produced grids (and of the table index axes)
    pub fn target(&self) -> CoordinateSystem {
        match self {
            Direction::RadarToGeographic => CoordinateSystem::Geographic,
            Direction::GeographicToRadar => CoordinateSystem::Radar,
        }
    }

    /// Table variables holding source positions for every target sample
    pub fn fields(&self) -> [&'static str; 2] {
        match self {
            Direction::RadarToGeographic => ["azi", "rng"],
            Direction::GeographicToRadar => ["lt", "ll"],
        }
    }

    /// Logical name of the decimated table in grid storage
    pub fn table_name(&self) -> &'static str {
        match self {
            Direction::RadarToGeographic => "intf_ra2ll",
            Direction::GeographicToRadar => "intf_ll2ra",
        }
    }

    /// Short tag stored in persisted tables
    pub fn tag(&self) -> &'static str {
        match self {
            Direction::RadarToGeographic => "ra2ll",
            Direction::GeographicToRadar => "ll2ra",
        }
    }

    /// Parse the persisted tag back
    pub fn from_tag(tag: &str) -> SarResult<Self> {
        match tag {
            "ra2ll" => Ok(Direction::RadarToGeographic),
            "ll2ra" => Ok(Direction::GeographicToRadar),
            other => Err(SarError::InvalidFormat(format!(
                "Unknown transform direction: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Interferogram pair (reference and repeat acquisition dates)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pair {
    pub reference: NaiveDate,
    pub repeat: NaiveDate,
}

impl Pair {
    pub fn new(reference: NaiveDate, repeat: NaiveDate) -> Self {
        Self { reference, repeat }
    }

    /// Parse "2023-01-01 2023-01-13" (any whitespace or '_' separator)
    pub fn parse(text: &str) -> SarResult<Self> {
        let parts: Vec<&str> = text
            .split(|c: char| c.is_whitespace() || c == '_')
            .filter(|s| !s.is_empty())
            .collect();
        if parts.len() != 2 {
            return Err(SarError::InvalidFormat(format!("Invalid pair: '{}'", text)));
        }

        let parse_date = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
                .map_err(|e| SarError::InvalidFormat(format!("Invalid date '{}': {}", s, e)))
        };

        Ok(Self::new(parse_date(parts[0])?, parse_date(parts[1])?))
    }

    /// File name stem, e.g. "20230101_20230113"
    pub fn stem(&self) -> String {
        format!(
            "{}_{}",
            self.reference.format("%Y%m%d"),
            self.repeat.format("%Y%m%d")
        )
    }
}

impl std::fmt::Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.reference.format("%Y-%m-%d"),
            self.repeat.format("%Y-%m-%d")
        )
    }
}

/// Geospatial transformation parameters (GDAL order)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }
}

/// Geocoding configuration shared by the table builder and the reprojector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    /// Tile width along the target column axis, also the NetCDF chunk size
    pub chunksize: usize,
    /// Deflate level for persisted variables (0 disables compression)
    pub compression_level: i32,
    /// Byte shuffle filter for persisted variables
    pub shuffle: bool,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            chunksize: 512,
            compression_level: 3,
            shuffle: true,
        }
    }
}

impl GeocodeConfig {
    pub fn with_chunksize(chunksize: usize) -> Self {
        Self {
            chunksize,
            ..Self::default()
        }
    }

    /// Per-variable chunk shape: the configured chunk size clipped to each dimension
    pub fn chunk_shape(&self, shape: &[usize]) -> Vec<usize> {
        shape
            .iter()
            .map(|&len| self.chunksize.max(1).min(len.max(1)))
            .collect()
    }
}

/// Error types for geocoding operations
#[derive(Debug, thiserror::Error)]
pub enum SarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cannot remove stale output {}: {source}", path.display())]
    StaleOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for geocoding operations
pub type SarResult<T> = Result<T, SarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_parse_and_format() {
        let pair = Pair::parse("2023-01-01 2023-01-13").unwrap();
        assert_eq!(pair.to_string(), "2023-01-01 2023-01-13");
        assert_eq!(pair.stem(), "20230101_20230113");

        let compact = Pair::parse("20230101_20230113").unwrap();
        assert_eq!(compact, pair);

        assert!(Pair::parse("2023-01-01").is_err());
        assert!(Pair::parse("2023-13-01 2023-01-13").is_err());
    }

    #[test]
    fn test_direction_axes() {
        let forward = Direction::RadarToGeographic;
        assert_eq!(forward.source().dims(), ["y", "x"]);
        assert_eq!(forward.target().dims(), ["lat", "lon"]);
        assert_eq!(forward.fields(), ["azi", "rng"]);

        let inverse = Direction::GeographicToRadar;
        assert_eq!(inverse.source().dims(), ["lat", "lon"]);
        assert_eq!(inverse.target().dims(), ["y", "x"]);
        assert_eq!(inverse.fields(), ["lt", "ll"]);
        assert_eq!(Direction::from_tag(inverse.tag()).unwrap(), inverse);
    }

    #[test]
    fn test_chunk_shape_clips_to_dimensions() {
        let config = GeocodeConfig::with_chunksize(128);
        assert_eq!(config.chunk_shape(&[1000, 64]), vec![128, 64]);
        assert_eq!(config.chunk_shape(&[0, 300]), vec![1, 128]);
    }
}
