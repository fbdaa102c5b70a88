use crate::core::grid::{axis_spacing, LabeledGrid};
use crate::types::{Direction, GeocodeConfig, SarError, SarResult};
use ndarray::{s, Array1, Array2};
use std::collections::BTreeMap;
use std::ops::Range;

/// Correspondence table between the samples of one coordinate system and
/// positions in the other one.
///
/// Rows and columns index the *target* system of the direction (`lat`/`lon` for
/// `ra2ll`, `y`/`x` for `ll2ra`); the two fields hold the matching *source*
/// positions (`azi`/`rng` or `lt`/`ll`).
#[derive(Debug, Clone, PartialEq)]
pub struct TransformTable {
    direction: Direction,
    rows: Array1<f64>,
    cols: Array1<f64>,
    first: Array2<f64>,
    second: Array2<f64>,
    /// Side data carried along untouched (elevation, ...)
    payload: BTreeMap<String, Array2<f32>>,
    /// Radar axes (`y`, `x`) of the grids this table serves
    aux_axes: Option<(Array1<f64>, Array1<f64>)>,
}

/// The two transform-coordinate fields for one tile
#[derive(Debug, Clone)]
pub struct TableSlice {
    pub first: Array2<f64>,
    pub second: Array2<f64>,
}

impl TableSlice {
    pub fn dim(&self) -> (usize, usize) {
        self.first.dim()
    }
}

/// Read access to a transform table for the tile engine.
///
/// Implemented by in-memory tables and by tables opened lazily from disk.
pub trait TableSource: Sync {
    fn direction(&self) -> Direction;
    fn rows(&self) -> &Array1<f64>;
    fn cols(&self) -> &Array1<f64>;
    /// Transform-coordinate fields for the full row extent and a column range
    fn read_slice(&self, cols: Range<usize>) -> SarResult<TableSlice>;
}

impl TransformTable {
    pub fn new(
        direction: Direction,
        rows: Array1<f64>,
        cols: Array1<f64>,
        first: Array2<f64>,
        second: Array2<f64>,
    ) -> SarResult<Self> {
        let shape = (rows.len(), cols.len());
        if first.dim() != shape || second.dim() != shape {
            return Err(SarError::InvalidFormat(format!(
                "{} table fields {:?}/{:?} do not match axes {:?}",
                direction,
                first.dim(),
                second.dim(),
                shape
            )));
        }

        Ok(Self {
            direction,
            rows,
            cols,
            first,
            second,
            payload: BTreeMap::new(),
            aux_axes: None,
        })
    }

    /// Attach a payload field with the table shape
    pub fn with_payload(mut self, name: &str, values: Array2<f32>) -> SarResult<Self> {
        if values.dim() != self.dim() {
            return Err(SarError::InvalidFormat(format!(
                "Payload '{}' shape {:?} does not match table {:?}",
                name,
                values.dim(),
                self.dim()
            )));
        }
        self.payload.insert(name.to_string(), values);
        Ok(self)
    }

    /// Attach the radar axes (`y`, `x`) of the served grid
    pub fn with_aux_axes(mut self, y: Array1<f64>, x: Array1<f64>) -> Self {
        self.aux_axes = Some((y, x));
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn rows(&self) -> &Array1<f64> {
        &self.rows
    }

    pub fn cols(&self) -> &Array1<f64> {
        &self.cols
    }

    pub fn first(&self) -> &Array2<f64> {
        &self.first
    }

    pub fn second(&self) -> &Array2<f64> {
        &self.second
    }

    pub fn payload(&self) -> &BTreeMap<String, Array2<f32>> {
        &self.payload
    }

    pub fn aux_axes(&self) -> Option<(&Array1<f64>, &Array1<f64>)> {
        self.aux_axes.as_ref().map(|(y, x)| (y, x))
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.rows.len(), self.cols.len())
    }

    /// Sample spacing the table was computed at, per axis.
    ///
    /// Tables covering geographic samples carry the radar axes they were
    /// computed for and those set the native resolution; without them the
    /// radar spacing is unknown.
    pub fn native_spacing(&self) -> SarResult<(f64, f64)> {
        match (&self.aux_axes, self.direction) {
            (Some((y, x)), _) => Ok((axis_spacing(y)?, axis_spacing(x)?)),
            (None, Direction::RadarToGeographic) => Err(SarError::InvalidFormat(
                "ra2ll table has no radar y/x axes to derive its resolution from".to_string(),
            )),
            (None, Direction::GeographicToRadar) => {
                Ok((axis_spacing(&self.rows)?, axis_spacing(&self.cols)?))
            }
        }
    }
}

impl TableSource for TransformTable {
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
        Ok(TableSlice {
            first: self.first.slice(s![.., cols.clone()]).to_owned(),
            second: self.second.slice(s![.., cols]).to_owned(),
        })
    }
}

/// Integer decimation factor per axis: nearest whole ratio of the spacings, at least 1
pub fn decimation_strides(reference: (f64, f64), native: (f64, f64)) -> SarResult<(usize, usize)> {
    let stride = |target: f64, native: f64| -> SarResult<usize> {
        if native == 0.0 || !native.is_finite() || !target.is_finite() {
            return Err(SarError::InvalidFormat(format!(
                "Cannot derive decimation from spacing {} over {}",
                target, native
            )));
        }
        // half-way ratios go to the even stride
        Ok(((target / native).abs().round_ties_even() as usize).max(1))
    };
    Ok((stride(reference.0, native.0)?, stride(reference.1, native.1)?))
}

/// Builds decimated transform tables matched to the resolution of a reference grid
pub struct TransformTableBuilder<'a> {
    config: &'a GeocodeConfig,
}

impl<'a> TransformTableBuilder<'a> {
    pub fn new(config: &'a GeocodeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeocodeConfig {
        self.config
    }

    /// Decimate a full-resolution table to the spacing of `reference`.
    ///
    /// Forward tables are strided from index 0; inverse tables start at half a
    /// stride so the kept samples sit at the centre of the original bins.
    pub fn decimate(&self, reference: &LabeledGrid, full: &TransformTable) -> SarResult<TransformTable> {
        let direction = full.direction();
        let [row_dim, col_dim] = reference.spatial_dims();
        let ref_y = reference.axis(row_dim)?;
        let ref_x = reference.axis(col_dim)?;

        let reference_spacing = (axis_spacing(ref_y)?, axis_spacing(ref_x)?);
        let native_spacing = full.native_spacing()?;
        let (step_y, step_x) = decimation_strides(reference_spacing, native_spacing)?;

        let (off_y, off_x) = match direction {
            Direction::RadarToGeographic => (0, 0),
            Direction::GeographicToRadar => (step_y / 2, step_x / 2),
        };
        log::debug!(
            "{} decimation: spacing {:?} over {:?} -> strides ({}, {}) offsets ({}, {})",
            direction,
            reference_spacing,
            native_spacing,
            step_y,
            step_x,
            off_y,
            off_x
        );

        let (nrows, ncols) = full.dim();
        if off_y >= nrows || off_x >= ncols {
            return Err(SarError::Processing(format!(
                "{} table {}x{} is too small for strides ({}, {})",
                direction, nrows, ncols, step_y, step_x
            )));
        }

        let (sy, sx) = (step_y as isize, step_x as isize);
        let mut table = TransformTable::new(
            direction,
            full.rows.slice(s![off_y..;sy]).to_owned(),
            full.cols.slice(s![off_x..;sx]).to_owned(),
            full.first.slice(s![off_y..;sy, off_x..;sx]).to_owned(),
            full.second.slice(s![off_y..;sy, off_x..;sx]).to_owned(),
        )?;
        for (name, values) in &full.payload {
            table = table.with_payload(name, values.slice(s![off_y..;sy, off_x..;sx]).to_owned())?;
        }
        if direction == Direction::RadarToGeographic {
            table = table.with_aux_axes(ref_y.clone(), ref_x.clone());
        }

        log::info!(
            "Decimated {} table {}x{} -> {}x{}",
            direction,
            nrows,
            ncols,
            table.rows.len(),
            table.cols.len()
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn full_table(direction: Direction, n: usize) -> TransformTable {
        let axis = Array::range(0.0, n as f64, 1.0);
        let first = Array2::from_shape_fn((n, n), |(i, _)| i as f64);
        let second = Array2::from_shape_fn((n, n), |(_, j)| j as f64);
        let ele = Array2::from_shape_fn((n, n), |(i, j)| (i * n + j) as f32);
        TransformTable::new(direction, axis.clone(), axis, first, second)
            .unwrap()
            .with_payload("ele", ele)
            .unwrap()
    }

    fn radar_axes(table: TransformTable, spacing: f64) -> TransformTable {
        let (nrows, ncols) = table.dim();
        table.with_aux_axes(
            Array::range(0.0, nrows as f64 * spacing, spacing),
            Array::range(0.0, ncols as f64 * spacing, spacing),
        )
    }

    fn reference(spacing: f64, n: usize) -> LabeledGrid {
        LabeledGrid::new_2d(
            "phasefilt",
            ("y", Array::range(0.0, n as f64 * spacing, spacing)),
            ("x", Array::range(0.0, n as f64 * spacing, spacing)),
            Array2::zeros((n, n)),
        )
        .unwrap()
    }

    #[test]
    fn test_decimation_strides_round_to_nearest() {
        assert_eq!(decimation_strides((4.0, 4.0), (1.0, 1.0)).unwrap(), (4, 4));
        assert_eq!(decimation_strides((2.6, 1.4), (1.0, 1.0)).unwrap(), (3, 1));
        assert_eq!(decimation_strides((0.2, 0.5), (1.0, 1.0)).unwrap(), (1, 1));
        assert_eq!(decimation_strides((2.5, 4.5), (1.0, 1.0)).unwrap(), (2, 4));
        assert_eq!(decimation_strides((3.5, 1.5), (1.0, 1.0)).unwrap(), (4, 2));
        assert!(decimation_strides((4.0, 4.0), (0.0, 1.0)).is_err());
    }

    #[test]
    fn test_forward_decimation_starts_at_zero() {
        let config = GeocodeConfig::default();
        let builder = TransformTableBuilder::new(&config);
        let table = builder
            .decimate(&reference(4.0, 25), &radar_axes(full_table(Direction::RadarToGeographic, 100), 1.0))
            .unwrap();

        assert_eq!(table.dim(), (25, 25));
        assert_eq!(table.rows()[0], 0.0);
        assert_eq!(axis_spacing(table.rows()).unwrap(), 4.0);
        assert_eq!(axis_spacing(table.cols()).unwrap(), 4.0);
        assert_eq!(table.first()[[1, 0]], 4.0);
        assert_eq!(table.payload()["ele"][[1, 1]], 404.0);

        let (y, x) = table.aux_axes().unwrap();
        assert_eq!(y.len(), 25);
        assert_eq!(x[1], 4.0);
    }

    #[test]
    fn test_inverse_decimation_starts_at_half_stride() {
        let config = GeocodeConfig::default();
        let builder = TransformTableBuilder::new(&config);
        let table = builder
            .decimate(&reference(4.0, 25), &full_table(Direction::GeographicToRadar, 100))
            .unwrap();

        assert_eq!(table.dim(), (25, 25));
        assert_eq!(table.rows()[0], 2.0);
        assert_eq!(table.cols()[0], 2.0);
        assert_eq!(axis_spacing(table.rows()).unwrap(), 4.0);
        assert_eq!(table.second()[[0, 1]], 6.0);
        assert!(table.aux_axes().is_none());
    }

    #[test]
    fn test_native_spacing_prefers_radar_axes() {
        let table = full_table(Direction::RadarToGeographic, 10)
            .with_aux_axes(Array::range(0.0, 20.0, 2.0), Array::range(0.0, 50.0, 5.0));
        assert_eq!(table.native_spacing().unwrap(), (2.0, 5.0));
    }

    #[test]
    fn test_forward_decimation_requires_radar_axes() {
        // lat/lon spacing in degrees says nothing about the radar resolution
        let degrees = Array::range(0.0, 0.1, 0.001);
        let n = degrees.len();
        let table = TransformTable::new(
            Direction::RadarToGeographic,
            degrees.clone(),
            degrees,
            Array2::zeros((n, n)),
            Array2::zeros((n, n)),
        )
        .unwrap();

        let config = GeocodeConfig::default();
        let err = TransformTableBuilder::new(&config)
            .decimate(&reference(4.0, 25), &table)
            .unwrap_err();
        assert!(matches!(err, SarError::InvalidFormat(_)));
        assert!(table.native_spacing().is_err());

        let table = radar_axes(table, 1.0);
        let decimated = TransformTableBuilder::new(&config).decimate(&reference(4.0, 25), &table).unwrap();
        assert_eq!(decimated.dim(), (25, 25));
    }

    #[test]
    fn test_read_slice_bounds() {
        let table = full_table(Direction::RadarToGeographic, 10);
        let slice = table.read_slice(8..10).unwrap();
        assert_eq!(slice.dim(), (10, 2));
        assert_eq!(slice.second[[3, 1]], 9.0);
        assert!(table.read_slice(8..11).is_err());
    }
}
