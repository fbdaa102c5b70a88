use crate::core::grid::{Coordinate, GridData, LabeledGrid};
use crate::core::progress::{NoProgress, ProgressReporter};
use crate::core::tile_interp::{interpolate_tile, SourceGrid};
use crate::core::transform_table::TableSource;
use crate::types::{Direction, GeocodeConfig, SarError, SarResult};
use ndarray::{s, Array2, Array3, ArrayView2, Axis};
use std::collections::BTreeMap;
use std::ops::Range;

/// Grid reprojector for one transform table (one geocoding direction)
pub struct GridReprojector<'a, T: TableSource + ?Sized> {
    table: &'a T,
    config: &'a GeocodeConfig,
}

/// Described, not yet executed, transformation of one grid or stack
pub struct ReprojectionPlan<'a, T: TableSource + ?Sized> {
    table: &'a T,
    input: &'a LabeledGrid,
    tiles: Vec<Range<usize>>,
    passthrough: bool,
}

/// Split `len` columns into consecutive tiles of `width`; the last one may be narrower
pub fn column_tiles(len: usize, width: usize) -> SarResult<Vec<Range<usize>>> {
    if width == 0 {
        return Err(SarError::Processing("Tile width must be positive".to_string()));
    }
    Ok((0..len).step_by(width).map(|start| start..(start + width).min(len)).collect())
}

/// True when `grid` has the source dimensions of `direction`; logs a notice otherwise
pub fn accepts(direction: Direction, grid: &LabeledGrid) -> bool {
    let source = direction.source();
    if grid.is_in(source) {
        return true;
    }
    log::warn!(
        "NOTE: grid '{}' {:?} is not in {} coordinates, skipping {} geocoding",
        grid.name(),
        grid.dims(),
        source,
        direction
    );
    false
}

impl<'a, T: TableSource + ?Sized> GridReprojector<'a, T> {
    pub fn new(table: &'a T, config: &'a GeocodeConfig) -> Self {
        Self { table, config }
    }

    pub fn direction(&self) -> Direction {
        self.table.direction()
    }

    /// Describe the transformation of `grid` without running it.
    ///
    /// Grids lacking the source coordinate dimensions of this direction are
    /// planned as a pass-through.
    pub fn plan<'g>(&self, grid: &'g LabeledGrid) -> SarResult<ReprojectionPlan<'g, T>>
    where
        'a: 'g,
    {
        let direction = self.direction();
        let source = direction.source();

        if !accepts(direction, grid) {
            return Ok(ReprojectionPlan {
                table: self.table,
                input: grid,
                tiles: Vec::new(),
                passthrough: true,
            });
        }

        if !(2..=3).contains(&grid.ndim()) || grid.spatial_dims() != source.dims() {
            return Err(SarError::InvalidFormat(format!(
                "Grid '{}' dimensions {:?} must end with {:?}",
                grid.name(),
                grid.dims(),
                source.dims()
            )));
        }

        let tiles = column_tiles(self.table.cols().len(), self.config.chunksize)?;
        log::debug!(
            "{} plan for '{}': {} layers, {} tiles of width {}",
            direction,
            grid.name(),
            grid.layers().len(),
            tiles.len(),
            self.config.chunksize
        );

        Ok(ReprojectionPlan {
            table: self.table,
            input: grid,
            tiles,
            passthrough: false,
        })
    }

    /// Plan and execute in one step
    pub fn reproject(&self, grid: &LabeledGrid) -> SarResult<LabeledGrid> {
        self.plan(grid)?.execute()
    }
}

impl<'a, T: TableSource + ?Sized> ReprojectionPlan<'a, T> {
    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    /// Target column ranges, one task per range and layer
    pub fn tiles(&self) -> &[Range<usize>] {
        &self.tiles
    }

    pub fn execute(self) -> SarResult<LabeledGrid> {
        self.execute_with_progress(&NoProgress)
    }

    /// Run every tile and assemble the output grid.
    ///
    /// Each tile reads its table slice once and resamples all layers from it.
    /// The first failing tile aborts the whole transformation.
    pub fn execute_with_progress(self, progress: &dyn ProgressReporter) -> SarResult<LabeledGrid> {
        if self.passthrough {
            return Ok(self.input.clone());
        }

        let direction = self.table.direction();
        let [src_row_dim, src_col_dim] = direction.source().dims();
        let src_rows = self.input.axis(src_row_dim)?;
        let src_cols = self.input.axis(src_col_dim)?;
        let layers = self.input.layers();

        let nrows = self.table.rows().len();
        let ncols = self.table.cols().len();
        let description = format!("{} geocoding '{}'", direction, self.input.name());
        progress.start(&description, self.tiles.len());

        let run_tile = |cols: &Range<usize>| -> SarResult<(usize, Vec<Array2<f32>>)> {
            let slice = self.table.read_slice(cols.clone())?;
            if slice.dim() != (nrows, cols.len()) {
                return Err(SarError::Processing(format!(
                    "Table slice {:?} has shape {:?}, expected {:?}",
                    cols,
                    slice.dim(),
                    (nrows, cols.len())
                )));
            }

            let blocks = layers
                .iter()
                .map(|values: &ArrayView2<'_, f32>| {
                    let source = SourceGrid::new(src_rows.view(), src_cols.view(), *values);
                    interpolate_tile(&slice, &source)
                })
                .collect();
            progress.advance(1);
            Ok((cols.start, blocks))
        };

        #[cfg(feature = "parallel")]
        let blocks: Vec<(usize, Vec<Array2<f32>>)> = {
            use rayon::prelude::*;
            self.tiles.par_iter().map(run_tile).collect::<SarResult<_>>()?
        };
        #[cfg(not(feature = "parallel"))]
        let blocks: Vec<(usize, Vec<Array2<f32>>)> =
            self.tiles.iter().map(run_tile).collect::<SarResult<_>>()?;

        // blocks carry their column offset, completion order does not matter
        let mut out = Array3::<f32>::from_elem((layers.len(), nrows, ncols), f32::NAN);
        for (start, tile_blocks) in blocks {
            for (k, block) in tile_blocks.iter().enumerate() {
                let width = block.ncols();
                out.slice_mut(s![k, .., start..start + width]).assign(block);
            }
        }
        progress.finish(&description);

        let valid = out.iter().filter(|v| !v.is_nan()).count();
        log::info!(
            "{} geocoded '{}': {} layers of {}x{}, {:.1}% valid",
            direction,
            self.input.name(),
            layers.len(),
            nrows,
            ncols,
            valid as f64 / out.len().max(1) as f64 * 100.0
        );

        self.assemble(out)
    }

    /// Wrap the samples with the target axes and every non-spatial input coordinate
    fn assemble(&self, out: Array3<f32>) -> SarResult<LabeledGrid> {
        let direction = self.table.direction();
        let source_dims = direction.source().dims();
        let [row_dim, col_dim] = direction.target().dims();

        let mut coords = BTreeMap::new();
        coords.insert(row_dim.to_string(), Coordinate::Axis(self.table.rows().clone()));
        coords.insert(col_dim.to_string(), Coordinate::Axis(self.table.cols().clone()));

        for (name, coord) in self.input.coords() {
            if source_dims.contains(&name.as_str()) {
                continue;
            }
            if coords.contains_key(name) {
                log::debug!("Input coordinate '{}' shadowed by the target axis", name);
                continue;
            }
            coords.insert(name.clone(), coord.clone());
        }

        let (dims, data) = match self.input.label_dim() {
            None => (
                vec![row_dim.to_string(), col_dim.to_string()],
                GridData::Single(out.index_axis_move(Axis(0), 0)),
            ),
            Some(label_dim) => (
                vec![label_dim.to_string(), row_dim.to_string(), col_dim.to_string()],
                GridData::Stack(out),
            ),
        };

        LabeledGrid::from_parts(self.input.name(), dims, data, coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transform_table::TransformTable;
    use crate::types::CoordinateSystem;
    use ndarray::{Array, Array1};

    /// Forward table on a lat/lon grid sampling the radar grid at (2*i + 0.3, 3*j - 0.2)
    fn forward_table(nlat: usize, nlon: usize) -> TransformTable {
        TransformTable::new(
            Direction::RadarToGeographic,
            Array::range(0.0, nlat as f64, 1.0) * 0.01 + 40.0,
            Array::range(0.0, nlon as f64, 1.0) * 0.01 + 10.0,
            Array2::from_shape_fn((nlat, nlon), |(i, _)| 2.0 * i as f64 + 0.3),
            Array2::from_shape_fn((nlat, nlon), |(_, j)| 3.0 * j as f64 - 0.2),
        )
        .unwrap()
    }

    fn radar_grid(nrows: usize, ncols: usize, seed: f32) -> LabeledGrid {
        LabeledGrid::new_2d(
            "phase",
            ("y", Array::range(0.0, nrows as f64, 1.0)),
            ("x", Array::range(0.0, ncols as f64, 1.0)),
            Array2::from_shape_fn((nrows, ncols), |(i, j)| seed + (i * ncols + j) as f32),
        )
        .unwrap()
    }

    #[test]
    fn test_column_tiles_cover_axis() {
        assert_eq!(column_tiles(10, 4).unwrap(), vec![0..4, 4..8, 8..10]);
        assert_eq!(column_tiles(8, 4).unwrap(), vec![0..4, 4..8]);
        assert_eq!(column_tiles(3, 512).unwrap(), vec![0..3]);
        assert!(column_tiles(0, 4).unwrap().is_empty());
        assert!(column_tiles(10, 0).is_err());
    }

    #[test]
    fn test_output_shape_for_uneven_tiles() {
        let table = forward_table(20, 33);
        let grid = radar_grid(40, 100, 0.0);
        for chunksize in [1, 7, 11, 33, 64] {
            let config = GeocodeConfig::with_chunksize(chunksize);
            let out = GridReprojector::new(&table, &config).reproject(&grid).unwrap();
            assert_eq!(out.shape(), vec![20, 33]);
            assert_eq!(out.dims(), &["lat", "lon"]);
            assert!(out.is_in(CoordinateSystem::Geographic));
        }
    }

    #[test]
    fn test_forward_values_follow_table() {
        let table = forward_table(5, 6);
        let grid = radar_grid(12, 20, 0.0);
        let config = GeocodeConfig::with_chunksize(4);
        let out = GridReprojector::new(&table, &config).reproject(&grid).unwrap();
        let values = out.values_2d().unwrap();

        // (2i + 0.3, 3j - 0.2) rounds to (2i, 3j); column 0 falls below x = 0
        for ((i, j), v) in values.indexed_iter() {
            if j == 0 {
                assert!(v.is_nan());
            } else {
                assert_eq!(*v, (2 * i * 20 + 3 * j) as f32);
            }
        }
    }

    #[test]
    fn test_chunk_size_independence() {
        let table = forward_table(30, 200);
        let grid = radar_grid(64, 640, 1.5);
        let config = GeocodeConfig::with_chunksize(512);
        let reference = GridReprojector::new(&table, &config).reproject(&grid).unwrap();

        for chunksize in [64, 128] {
            let config = GeocodeConfig::with_chunksize(chunksize);
            let out = GridReprojector::new(&table, &config).reproject(&grid).unwrap();
            let a = out.values_2d().unwrap();
            let b = reference.values_2d().unwrap();
            assert!(a.iter().zip(b.iter()).all(|(x, y)| x == y || (x.is_nan() && y.is_nan())));
        }
    }

    #[test]
    fn test_stack_keeps_labels_and_metadata() {
        let table = forward_table(6, 6);
        let grids = vec![radar_grid(12, 20, 0.0), radar_grid(12, 20, 1000.0)];
        let labels = vec!["2023-01-13 2023-01-25".to_string(), "2023-01-01 2023-01-13".to_string()];
        let mut stack = LabeledGrid::stack(&grids, "pair", labels.clone()).unwrap();
        let ref_dates = Coordinate::Labels {
            dim: "pair".to_string(),
            values: vec!["2023-01-13".to_string(), "2023-01-01".to_string()],
        };
        stack.set_coord("ref", ref_dates.clone()).unwrap();
        stack.set_coord("wavelength", Coordinate::Scalar(0.0555)).unwrap();

        let config = GeocodeConfig::with_chunksize(4);
        let out = GridReprojector::new(&table, &config).reproject(&stack).unwrap();

        assert_eq!(out.dims(), &["pair", "lat", "lon"]);
        assert_eq!(out.shape(), vec![2, 6, 6]);
        assert_eq!(out.labels().unwrap(), labels.as_slice());
        assert_eq!(out.coord("ref"), Some(&ref_dates));
        assert_eq!(out.coord("wavelength"), Some(&Coordinate::Scalar(0.0555)));
        assert!(out.coord("y").is_none());
        assert!(out.coord("x").is_none());

        let layers = out.layers();
        assert_eq!(layers[1][[2, 3]], layers[0][[2, 3]] + 1000.0);
    }

    #[test]
    fn test_inverse_on_radar_grid_is_noop() {
        let table = TransformTable::new(
            Direction::GeographicToRadar,
            Array::range(0.0, 4.0, 1.0),
            Array::range(0.0, 4.0, 1.0),
            Array2::zeros((4, 4)),
            Array2::zeros((4, 4)),
        )
        .unwrap();
        let grid = radar_grid(4, 4, 0.0);
        let config = GeocodeConfig::default();
        let reprojector = GridReprojector::new(&table, &config);

        let plan = reprojector.plan(&grid).unwrap();
        assert!(plan.is_passthrough());
        assert_eq!(plan.execute().unwrap(), grid);
    }

    #[test]
    fn test_transposed_dims_are_rejected() {
        let table = forward_table(4, 4);
        let grid = LabeledGrid::new_2d(
            "phase",
            ("x", Array1::range(0.0, 4.0, 1.0)),
            ("y", Array1::range(0.0, 4.0, 1.0)),
            Array2::zeros((4, 4)),
        )
        .unwrap();
        let config = GeocodeConfig::default();
        assert!(GridReprojector::new(&table, &config).plan(&grid).is_err());
    }

    #[test]
    fn test_cropped_grid_leaves_nan_tiles() {
        // the radar grid only covers the first range columns of the table
        let table = forward_table(4, 40);
        let grid = radar_grid(10, 30, 0.0);
        let config = GeocodeConfig::with_chunksize(8);
        let out = GridReprojector::new(&table, &config).reproject(&grid).unwrap();
        let values = out.values_2d().unwrap();

        assert_eq!(values.dim(), (4, 40));
        assert!(values.column(5).iter().all(|v| !v.is_nan()));
        assert!(values.slice(s![.., 16..]).iter().all(|v| v.is_nan()));
    }
}
