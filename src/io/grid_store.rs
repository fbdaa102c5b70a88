//! Grid storage and the stack collaborators consumed by the geocoder.

use crate::core::grid::{Coordinate, LabeledGrid};
use crate::core::transform_table::TransformTable;
use crate::io::netcdf_table::{persist_atomically, TransformTableReader};
use crate::types::{GeocodeConfig, Pair, SarError, SarResult};
use ndarray::{Array1, Array2};
use std::path::{Path, PathBuf};

/// Ordered interferogram pairs of a stack
pub trait PairRegistry: Sync {
    fn pairs(&self) -> Vec<Pair>;

    /// Subswath code of the stack; multi-digit codes (12, 123, ...) mark merged subswaths
    fn subswath(&self) -> u32 {
        1
    }
}

/// Named grids of a stack, per pair or stack-wide
pub trait GridStore: Sync {
    fn open_grid(&self, name: &str, pair: Option<&Pair>) -> SarResult<LabeledGrid>;
    fn save_grid(&self, grid: &LabeledGrid, name: &str, pair: Option<&Pair>) -> SarResult<PathBuf>;
    /// Location of a stack-wide table file by logical name
    fn table_path(&self, name: &str) -> PathBuf;
}

/// Full-resolution correspondence tables computed upstream from the DEM
pub trait TableProvider: Sync {
    /// Geographic-indexed table holding `azi`/`rng` (and the radar `y`/`x` axes)
    fn trans_dat(&self) -> SarResult<TransformTable>;
    /// Radar-indexed table holding `lt`/`ll` and the `ele` payload
    fn trans_dat_inv(&self) -> SarResult<TransformTable>;
}

/// In-memory pair registry
#[derive(Debug, Clone, Default)]
pub struct PairList {
    pairs: Vec<Pair>,
    subswath: u32,
}

impl PairList {
    pub fn new(pairs: Vec<Pair>) -> Self {
        Self { pairs, subswath: 1 }
    }

    /// Parse "YYYY-MM-DD YYYY-MM-DD" pairs
    pub fn parse(pairs: &[&str]) -> SarResult<Self> {
        let pairs = pairs.iter().map(|p| Pair::parse(p)).collect::<SarResult<Vec<_>>>()?;
        Ok(Self::new(pairs))
    }

    pub fn with_subswath(mut self, subswath: u32) -> Self {
        self.subswath = subswath;
        self
    }
}

impl PairRegistry for PairList {
    fn pairs(&self) -> Vec<Pair> {
        self.pairs.clone()
    }

    fn subswath(&self) -> u32 {
        self.subswath
    }
}

/// Grid store keeping every grid as a NetCDF file under one directory.
///
/// Pair grids are named `{YYYYMMDD_YYYYMMDD}_{name}.nc`, stack-wide grids and
/// tables `{name}.nc`. The full-resolution tables are read from `trans.nc` and
/// `trans_inv.nc`.
#[derive(Debug, Clone)]
pub struct NetCdfGridStore {
    basedir: PathBuf,
    config: GeocodeConfig,
}

impl NetCdfGridStore {
    pub fn new<P: AsRef<Path>>(basedir: P) -> SarResult<Self> {
        let basedir = basedir.as_ref().to_path_buf();
        std::fs::create_dir_all(&basedir)?;
        Ok(Self {
            basedir,
            config: GeocodeConfig::default(),
        })
    }

    pub fn with_config(mut self, config: GeocodeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    pub fn grid_path(&self, name: &str, pair: Option<&Pair>) -> PathBuf {
        match pair {
            Some(pair) => self.basedir.join(format!("{}_{}.nc", pair.stem(), name)),
            None => self.basedir.join(format!("{}.nc", name)),
        }
    }

    fn read_table(&self, name: &str) -> SarResult<TransformTable> {
        TransformTableReader::open(self.table_path(name))?.read_all()
    }
}

impl GridStore for NetCdfGridStore {
    fn open_grid(&self, name: &str, pair: Option<&Pair>) -> SarResult<LabeledGrid> {
        read_grid(&self.grid_path(name, pair), name)
    }

    fn save_grid(&self, grid: &LabeledGrid, name: &str, pair: Option<&Pair>) -> SarResult<PathBuf> {
        let path = self.grid_path(name, pair);
        persist_atomically(&path, |temp| write_grid_file(grid, name, temp, &self.config))?;
        log::info!("Saved grid '{}' to {}", name, path.display());
        Ok(path)
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.basedir.join(format!("{}.nc", name))
    }
}

impl TableProvider for NetCdfGridStore {
    fn trans_dat(&self) -> SarResult<TransformTable> {
        self.read_table("trans")
    }

    fn trans_dat_inv(&self) -> SarResult<TransformTable> {
        self.read_table("trans_inv")
    }
}

/// Write a single 2D grid: coordinate variables, the samples as `name`, and
/// dimensionless coordinates as global attributes
fn write_grid_file(grid: &LabeledGrid, name: &str, path: &Path, config: &GeocodeConfig) -> SarResult<()> {
    let values = grid.values_2d()?;
    let [row_dim, col_dim] = grid.spatial_dims();
    let chunks = config.chunk_shape(&[values.nrows(), values.ncols()]);

    let mut file = netcdf::create(path)?;
    for (dim, len) in [(row_dim, values.nrows()), (col_dim, values.ncols())] {
        file.add_dimension(dim, len)?;
        let axis = grid.axis(dim)?;
        let mut var = file.add_variable::<f64>(dim, &[dim])?;
        var.put_values(&axis.to_vec(), ..)?;
    }

    for (key, coord) in grid.coords() {
        match coord {
            Coordinate::Scalar(v) => {
                file.add_attribute(key, *v)?;
            }
            Coordinate::Text(text) => {
                file.add_attribute(key, text.as_str())?;
            }
            Coordinate::Axis(_) if key == row_dim || key == col_dim => {}
            _ => log::debug!("Coordinate '{}' not stored with grid '{}'", key, name),
        }
    }

    let mut var = file.add_variable::<f32>(name, &[row_dim, col_dim])?;
    var.set_chunking(&chunks)?;
    if config.compression_level > 0 {
        var.set_compression(config.compression_level, config.shuffle)?;
    }
    let samples: Vec<f32> = values.iter().cloned().collect();
    var.put_values(&samples, ..)?;
    Ok(())
}

/// Read a grid written by [`write_grid_file`] (or any file with one 2D `f32` variable)
fn read_grid(path: &Path, name: &str) -> SarResult<LabeledGrid> {
    if !path.exists() {
        return Err(SarError::NotFound(format!("Grid '{}' at {}", name, path.display())));
    }
    let file = netcdf::open(path)?;

    let var = match file.variable(name) {
        Some(var) => var,
        None => file
            .variables()
            .find(|v| v.dimensions().len() == 2)
            .ok_or_else(|| SarError::InvalidFormat(format!("No 2D variable in {}", path.display())))?,
    };
    let dims: Vec<(String, usize)> = var.dimensions().iter().map(|d| (d.name(), d.len())).collect();
    if dims.len() != 2 {
        return Err(SarError::InvalidFormat(format!(
            "Grid '{}' has {} dimensions, expected 2",
            name,
            dims.len()
        )));
    }

    let axis = |dim: &str, len: usize| -> SarResult<Array1<f64>> {
        match file.variable(dim) {
            Some(v) => Ok(Array1::from(v.get_values::<f64, _>(..)?)),
            None => Ok(Array1::range(0.0, len as f64, 1.0)),
        }
    };
    let rows = axis(&dims[0].0, dims[0].1)?;
    let cols = axis(&dims[1].0, dims[1].1)?;

    let samples = var.get_values::<f32, _>(..)?;
    let values = Array2::from_shape_vec((dims[0].1, dims[1].1), samples)
        .map_err(|e| SarError::InvalidFormat(format!("Failed to reshape grid '{}': {}", name, e)))?;

    let mut grid = LabeledGrid::new_2d(name, (dims[0].0.as_str(), rows), (dims[1].0.as_str(), cols), values)?;
    for attr in file.attributes() {
        let coord = match attr.value()? {
            netcdf::AttributeValue::Double(v) => Coordinate::Scalar(v),
            netcdf::AttributeValue::Float(v) => Coordinate::Scalar(f64::from(v)),
            netcdf::AttributeValue::Str(s) => Coordinate::Text(s),
            _ => continue,
        };
        grid.set_coord(attr.name(), coord)?;
    }

    log::debug!("Opened grid '{}' {:?} from {}", name, grid.shape(), path.display());
    Ok(grid)
}
