use crate::types::{CoordinateSystem, SarError, SarResult};
use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
use std::collections::BTreeMap;

/// Coordinate attached to a labeled grid
#[derive(Debug, Clone, PartialEq)]
pub enum Coordinate {
    /// Numeric dimension coordinate; the dimension has the coordinate's name
    Axis(Array1<f64>),
    /// Text labels along a (usually stack) dimension
    Labels { dim: String, values: Vec<String> },
    /// Dimensionless numeric value
    Scalar(f64),
    /// Dimensionless text value
    Text(String),
}

/// Grid samples: one 2D grid or a stack of 2D grids along a leading label dimension
#[derive(Debug, Clone, PartialEq)]
pub enum GridData {
    Single(Array2<f32>),
    Stack(Array3<f32>),
}

/// Named 2D grid or 3D stack with explicit dimension names and coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledGrid {
    name: String,
    dims: Vec<String>,
    data: GridData,
    coords: BTreeMap<String, Coordinate>,
}

impl LabeledGrid {
    /// Create a 2D grid with the two spatial axes
    pub fn new_2d(
        name: &str,
        rows: (&str, Array1<f64>),
        cols: (&str, Array1<f64>),
        data: Array2<f32>,
    ) -> SarResult<Self> {
        let (nrows, ncols) = data.dim();
        if rows.1.len() != nrows || cols.1.len() != ncols {
            return Err(SarError::InvalidFormat(format!(
                "Grid '{}' shape {}x{} does not match axes {}x{}",
                name,
                nrows,
                ncols,
                rows.1.len(),
                cols.1.len()
            )));
        }

        let mut coords = BTreeMap::new();
        coords.insert(rows.0.to_string(), Coordinate::Axis(rows.1));
        coords.insert(cols.0.to_string(), Coordinate::Axis(cols.1));

        Ok(Self {
            name: name.to_string(),
            dims: vec![rows.0.to_string(), cols.0.to_string()],
            data: GridData::Single(data),
            coords,
        })
    }

    /// Create a 3D stack; `labels` names every layer along `label_dim`
    pub fn new_stack(
        name: &str,
        labels: (&str, Vec<String>),
        rows: (&str, Array1<f64>),
        cols: (&str, Array1<f64>),
        data: Array3<f32>,
    ) -> SarResult<Self> {
        let (nlayers, nrows, ncols) = data.dim();
        if labels.1.len() != nlayers || rows.1.len() != nrows || cols.1.len() != ncols {
            return Err(SarError::InvalidFormat(format!(
                "Stack '{}' shape {}x{}x{} does not match coordinates {}x{}x{}",
                name,
                nlayers,
                nrows,
                ncols,
                labels.1.len(),
                rows.1.len(),
                cols.1.len()
            )));
        }

        let mut coords = BTreeMap::new();
        coords.insert(
            labels.0.to_string(),
            Coordinate::Labels {
                dim: labels.0.to_string(),
                values: labels.1,
            },
        );
        coords.insert(rows.0.to_string(), Coordinate::Axis(rows.1));
        coords.insert(cols.0.to_string(), Coordinate::Axis(cols.1));

        Ok(Self {
            name: name.to_string(),
            dims: vec![labels.0.to_string(), rows.0.to_string(), cols.0.to_string()],
            data: GridData::Stack(data),
            coords,
        })
    }

    /// Stack 2D grids sharing the same spatial axes along a new label dimension
    pub fn stack(grids: &[LabeledGrid], label_dim: &str, labels: Vec<String>) -> SarResult<Self> {
        let first = grids
            .first()
            .ok_or_else(|| SarError::Processing("Cannot stack an empty grid list".to_string()))?;
        if first.ndim() != 2 {
            return Err(SarError::InvalidFormat(format!(
                "Only 2D grids can be stacked, '{}' has {} dimensions",
                first.name,
                first.ndim()
            )));
        }

        let [row_dim, col_dim] = first.spatial_dims();
        let rows = first.axis(row_dim)?.clone();
        let cols = first.axis(col_dim)?.clone();

        let mut views = Vec::with_capacity(grids.len());
        for grid in grids {
            if grid.dims != first.dims || grid.axis(row_dim)? != &rows || grid.axis(col_dim)? != &cols {
                return Err(SarError::InvalidFormat(format!(
                    "Grid '{}' does not share the spatial axes of '{}'",
                    grid.name, first.name
                )));
            }
            views.extend(grid.layers());
        }

        let data = ndarray::stack(Axis(0), &views)
            .map_err(|e| SarError::Processing(format!("Failed to stack grids: {}", e)))?;

        Self::new_stack(&first.name, (label_dim, labels), (row_dim, rows), (col_dim, cols), data)
    }

    /// Assemble a grid from parts, checking every dimension coordinate against the data shape
    pub fn from_parts(
        name: &str,
        dims: Vec<String>,
        data: GridData,
        coords: BTreeMap<String, Coordinate>,
    ) -> SarResult<Self> {
        let shape = match &data {
            GridData::Single(a) => a.shape().to_vec(),
            GridData::Stack(a) => a.shape().to_vec(),
        };
        if dims.len() != shape.len() {
            return Err(SarError::InvalidFormat(format!(
                "Grid '{}' has {} dimension names for {} dimensions",
                name,
                dims.len(),
                shape.len()
            )));
        }

        let mut grid = Self {
            name: name.to_string(),
            dims,
            data,
            coords: BTreeMap::new(),
        };
        for (key, coord) in coords {
            grid.set_coord(&key, coord)?;
        }
        Ok(grid)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn data(&self) -> &GridData {
        &self.data
    }

    pub fn into_data(self) -> GridData {
        self.data
    }

    /// Shape of the samples, leading label dimension included
    pub fn shape(&self) -> Vec<usize> {
        match &self.data {
            GridData::Single(a) => a.shape().to_vec(),
            GridData::Stack(a) => a.shape().to_vec(),
        }
    }

    pub fn has_dims(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.dims.iter().any(|d| d == n))
    }

    /// True when both spatial dimensions of the coordinate system are present
    pub fn is_in(&self, system: CoordinateSystem) -> bool {
        self.has_dims(&system.dims())
    }

    /// Names of the two trailing (spatial) dimensions
    pub fn spatial_dims(&self) -> [&str; 2] {
        let n = self.dims.len();
        [self.dims[n - 2].as_str(), self.dims[n - 1].as_str()]
    }

    /// Leading label dimension of a stack
    pub fn label_dim(&self) -> Option<&str> {
        match self.data {
            GridData::Stack(_) => Some(self.dims[0].as_str()),
            GridData::Single(_) => None,
        }
    }

    pub fn coords(&self) -> &BTreeMap<String, Coordinate> {
        &self.coords
    }

    pub fn coord(&self, name: &str) -> Option<&Coordinate> {
        self.coords.get(name)
    }

    /// Numeric dimension coordinate
    pub fn axis(&self, name: &str) -> SarResult<&Array1<f64>> {
        match self.coords.get(name) {
            Some(Coordinate::Axis(values)) => Ok(values),
            _ => Err(SarError::NotFound(format!(
                "Axis '{}' on grid '{}'",
                name, self.name
            ))),
        }
    }

    /// Text labels of the leading stack dimension
    pub fn labels(&self) -> Option<&[String]> {
        let dim = self.label_dim()?;
        match self.coords.get(dim) {
            Some(Coordinate::Labels { values, .. }) => Some(values),
            _ => None,
        }
    }

    /// Attach or replace a coordinate; dimension coordinates must match their dimension length
    pub fn set_coord(&mut self, name: &str, coord: Coordinate) -> SarResult<()> {
        let dim_len = |dim: &str| {
            self.dims
                .iter()
                .position(|d| d == dim)
                .map(|i| self.shape()[i])
        };

        match &coord {
            Coordinate::Axis(values) => {
                if let Some(len) = dim_len(name) {
                    if len != values.len() {
                        return Err(SarError::InvalidFormat(format!(
                            "Coordinate '{}' has {} values for dimension of length {}",
                            name,
                            values.len(),
                            len
                        )));
                    }
                }
            }
            Coordinate::Labels { dim, values } => match dim_len(dim) {
                Some(len) if len == values.len() => {}
                _ => {
                    return Err(SarError::InvalidFormat(format!(
                        "Coordinate '{}' does not fit dimension '{}' of grid '{}'",
                        name, dim, self.name
                    )))
                }
            },
            Coordinate::Scalar(_) | Coordinate::Text(_) => {}
        }

        self.coords.insert(name.to_string(), coord);
        Ok(())
    }

    /// Every 2D layer: the grid itself, or each stack layer in label order
    pub fn layers(&self) -> Vec<ArrayView2<'_, f32>> {
        match &self.data {
            GridData::Single(a) => vec![a.view()],
            GridData::Stack(a) => a.outer_iter().collect(),
        }
    }

    /// Single 2D samples
    pub fn values_2d(&self) -> SarResult<&Array2<f32>> {
        match &self.data {
            GridData::Single(a) => Ok(a),
            GridData::Stack(_) => Err(SarError::InvalidFormat(format!(
                "Grid '{}' is a stack, expected a single 2D grid",
                self.name
            ))),
        }
    }

    /// Layer `index` of a stack (or the grid itself) as an owned 2D grid
    pub fn layer(&self, index: usize) -> SarResult<LabeledGrid> {
        let layers = self.layers();
        let view = layers.get(index).ok_or_else(|| {
            SarError::Processing(format!(
                "Layer {} out of range for grid '{}' with {} layers",
                index,
                self.name,
                layers.len()
            ))
        })?;

        let [row_dim, col_dim] = self.spatial_dims();
        LabeledGrid::new_2d(
            &self.name,
            (row_dim, self.axis(row_dim)?.clone()),
            (col_dim, self.axis(col_dim)?.clone()),
            view.to_owned(),
        )
    }
}

/// Uniform sample spacing of a monotonic axis (difference of the first two samples)
pub fn axis_spacing(values: &Array1<f64>) -> SarResult<f64> {
    if values.len() < 2 {
        return Err(SarError::InvalidFormat(format!(
            "Axis with {} samples has no spacing",
            values.len()
        )));
    }
    Ok(values[1] - values[0])
}
