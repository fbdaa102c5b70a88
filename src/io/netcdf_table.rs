//! NetCDF persistence for transform tables.
//!
//! Layout: the two index dimensions with coordinate variables, the two
//! transform fields and payload fields as chunked and compressed `f64`
//! variables, optional `y`/`x` radar axes, and a global `direction` attribute.

use crate::core::progress::ProgressReporter;
use crate::core::transform_table::{TableSlice, TableSource, TransformTable};
use crate::types::{Direction, GeocodeConfig, SarError, SarResult};
use ndarray::{Array1, Array2};
use std::ops::Range;
use std::path::{Path, PathBuf};

const DIRECTION_ATTR: &str = "direction";

/// Remove a previous output so it is never partially overwritten
pub fn remove_stale_output(path: &Path) -> SarResult<()> {
    if path.exists() {
        log::debug!("Removing stale output {}", path.display());
        std::fs::remove_file(path).map_err(|source| SarError::StaleOutput {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Write a file through `write` into a temporary sibling, then rename it to `path`.
///
/// Any existing file is removed first. A failed write leaves nothing behind.
pub fn persist_atomically<F>(path: &Path, write: F) -> SarResult<()>
where
    F: FnOnce(&Path) -> SarResult<()>,
{
    remove_stale_output(path)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = tempfile::Builder::new()
        .prefix(".sargeo-")
        .suffix(".nc.partial")
        .tempfile_in(dir)?
        .into_temp_path();

    write(&temp)?;

    temp.persist(path).map_err(|e| SarError::Io(e.error))?;
    Ok(())
}

/// Persist a table to `path`, replacing any previous build
pub fn write_table(
    table: &TransformTable,
    path: &Path,
    config: &GeocodeConfig,
    progress: &dyn ProgressReporter,
) -> SarResult<()> {
    persist_atomically(path, |temp| write_table_file(table, temp, config, progress))?;
    log::info!("Saved {} transform table to {}", table.direction(), path.display());
    Ok(())
}

fn write_table_file(
    table: &TransformTable,
    path: &Path,
    config: &GeocodeConfig,
    progress: &dyn ProgressReporter,
) -> SarResult<()> {
    let direction = table.direction();
    let [row_dim, col_dim] = direction.target().dims();
    let [first_name, second_name] = direction.fields();
    let (nrows, ncols) = table.dim();
    let chunks = config.chunk_shape(&[nrows, ncols]);

    let description = format!("Build {} Transform", direction);
    let total = 2 + table.payload().len();
    progress.start(&description, total);

    let mut file = netcdf::create(path)?;
    file.add_attribute(DIRECTION_ATTR, direction.tag())?;

    file.add_dimension(row_dim, nrows)?;
    file.add_dimension(col_dim, ncols)?;
    put_axis(&mut file, row_dim, table.rows())?;
    put_axis(&mut file, col_dim, table.cols())?;

    if let Some((y, x)) = table.aux_axes() {
        file.add_dimension("y", y.len())?;
        file.add_dimension("x", x.len())?;
        put_axis(&mut file, "y", y)?;
        put_axis(&mut file, "x", x)?;
    }

    for (name, values) in [(first_name, table.first()), (second_name, table.second())] {
        let mut var = file.add_variable::<f64>(name, &[row_dim, col_dim])?;
        var.set_chunking(&chunks)?;
        if config.compression_level > 0 {
            var.set_compression(config.compression_level, config.shuffle)?;
        }
        var.put_values(&contiguous(values), ..)?;
        progress.advance(1);
    }

    for (name, values) in table.payload() {
        let mut var = file.add_variable::<f64>(name, &[row_dim, col_dim])?;
        var.set_chunking(&chunks)?;
        if config.compression_level > 0 {
            var.set_compression(config.compression_level, config.shuffle)?;
        }
        var.put_values(&contiguous(&values.mapv(f64::from)), ..)?;
        progress.advance(1);
    }

    progress.finish(&description);
    Ok(())
}

fn put_axis(file: &mut netcdf::FileMut, name: &str, values: &Array1<f64>) -> SarResult<()> {
    let mut var = file.add_variable::<f64>(name, &[name])?;
    var.put_values(&values.to_vec(), ..)?;
    Ok(())
}

/// Row-major samples regardless of the array memory layout
fn contiguous<T: Clone>(values: &Array2<T>) -> Vec<T> {
    values.iter().cloned().collect()
}

fn read_axis(file: &netcdf::File, name: &str) -> SarResult<Array1<f64>> {
    let var = file
        .variable(name)
        .ok_or_else(|| SarError::InvalidFormat(format!("Missing coordinate variable '{}'", name)))?;
    Ok(Array1::from(var.get_values::<f64, _>(..)?))
}

fn read_field(file: &netcdf::File, name: &str, shape: (usize, usize), cols: Range<usize>) -> SarResult<Array2<f64>> {
    let var = file
        .variable(name)
        .ok_or_else(|| SarError::InvalidFormat(format!("Missing table variable '{}'", name)))?;
    let values = var.get_values::<f64, _>([0..shape.0, cols])?;
    Array2::from_shape_vec(shape, values)
        .map_err(|e| SarError::InvalidFormat(format!("Failed to reshape '{}': {}", name, e)))
}

/// Lazily opened transform table.
///
/// Opening reads only the axes and metadata; the transform fields are read per
/// column range when tiles ask for them.
#[derive(Debug, Clone)]
pub struct TransformTableReader {
    path: PathBuf,
    direction: Direction,
    rows: Array1<f64>,
    cols: Array1<f64>,
    aux_axes: Option<(Array1<f64>, Array1<f64>)>,
}

impl TransformTableReader {
    /// Open a table written by [`write_table`] or by the table provider
    pub fn open<P: AsRef<Path>>(path: P) -> SarResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SarError::NotFound(format!(
                "Transform table {} (build it before geocoding)",
                path.display()
            )));
        }
        log::debug!("Opening transform table {}", path.display());

        let file = netcdf::open(path)?;
        let direction = Self::detect_direction(&file)?;
        let [row_dim, col_dim] = direction.target().dims();

        let rows = read_axis(&file, row_dim)?;
        let cols = read_axis(&file, col_dim)?;
        let aux_axes = match (direction, file.variable("y"), file.variable("x")) {
            (Direction::RadarToGeographic, Some(_), Some(_)) => {
                Some((read_axis(&file, "y")?, read_axis(&file, "x")?))
            }
            _ => None,
        };

        Ok(Self {
            path: path.to_path_buf(),
            direction,
            rows,
            cols,
            aux_axes,
        })
    }

    fn detect_direction(file: &netcdf::File) -> SarResult<Direction> {
        if let Some(attr) = file.attribute(DIRECTION_ATTR) {
            if let netcdf::AttributeValue::Str(tag) = attr.value()? {
                return Direction::from_tag(&tag);
            }
        }
        for direction in [Direction::RadarToGeographic, Direction::GeographicToRadar] {
            if direction.fields().iter().all(|f| file.variable(f).is_some()) {
                return Ok(direction);
            }
        }
        Err(SarError::InvalidFormat(
            "File holds neither azi/rng nor lt/ll transform fields".to_string(),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.rows.len(), self.cols.len())
    }

    /// Load the whole table, payload fields included
    pub fn read_all(&self) -> SarResult<TransformTable> {
        let file = netcdf::open(&self.path)?;
        let [row_dim, col_dim] = self.direction.target().dims();
        let [first_name, second_name] = self.direction.fields();
        let shape = self.dim();

        let mut table = TransformTable::new(
            self.direction,
            self.rows.clone(),
            self.cols.clone(),
            read_field(&file, first_name, shape, 0..shape.1)?,
            read_field(&file, second_name, shape, 0..shape.1)?,
        )?;

        let skip = [first_name, second_name, row_dim, col_dim, "y", "x"];
        for var in file.variables() {
            let name = var.name();
            let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
            if skip.contains(&name.as_str()) || dims != [row_dim, col_dim] {
                continue;
            }
            let values = read_field(&file, &name, shape, 0..shape.1)?.mapv(|v| v as f32);
            table = table.with_payload(&name, values)?;
        }

        if let Some((y, x)) = &self.aux_axes {
            table = table.with_aux_axes(y.clone(), x.clone());
        }
        Ok(table)
    }
}

impl TableSource for TransformTableReader {
    fn direction(&self) -> Direction {
        self.direction
    }

    fn rows(&self) -> &Array1<f64> {
        &self.rows
    }

    fn cols(&self) -> &Array1<f64> {
        &self.cols
    }

    fn read_slice(&self, cols: Range<usize>) -> SarResult<TableSlice> {
        if cols.start > cols.end || cols.end > self.cols.len() {
            return Err(SarError::Processing(format!(
                "Column range {:?} outside table with {} columns",
                cols,
                self.cols.len()
            )));
        }

        let file = netcdf::open(&self.path)?;
        let [first_name, second_name] = self.direction.fields();
        let shape = (self.rows.len(), cols.len());
        Ok(TableSlice {
            first: read_field(&file, first_name, shape, cols.clone())?,
            second: read_field(&file, second_name, shape, cols)?,
        })
    }
}
