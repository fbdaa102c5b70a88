//! Nearest-neighbour resampling of one target tile from a regular source grid.

use crate::core::transform_table::TableSlice;
use ndarray::{Array2, ArrayView1, ArrayView2};
use std::ops::Range;

/// Regular source grid: two monotonically increasing axes and the samples on them
#[derive(Debug, Clone, Copy)]
pub struct SourceGrid<'a> {
    pub rows: ArrayView1<'a, f64>,
    pub cols: ArrayView1<'a, f64>,
    pub values: ArrayView2<'a, f32>,
}

impl<'a> SourceGrid<'a> {
    pub fn new(rows: ArrayView1<'a, f64>, cols: ArrayView1<'a, f64>, values: ArrayView2<'a, f32>) -> Self {
        Self { rows, cols, values }
    }
}

/// Resample one tile: every table cell holds the source position to sample.
///
/// The source grid is first restricted to the query bounding box grown by one
/// sample spacing. Tiles without any source sample in that box come back as
/// NaN, as do query points outside the restricted grid. Coordinates are
/// handled in f64, the result is f32.
pub fn interpolate_tile(slice: &TableSlice, source: &SourceGrid<'_>) -> Array2<f32> {
    let shape = slice.dim();

    let (Some(row_span), Some(col_span)) = (nan_extent(slice.first.iter()), nan_extent(slice.second.iter())) else {
        log::debug!("Tile {:?} has no valid transform positions", shape);
        return Array2::from_elem(shape, f32::NAN);
    };

    let row_sel = support_range(source.rows, row_span);
    let col_sel = support_range(source.cols, col_span);

    // cropped grids can leave a tile without any source coverage
    if row_sel.is_empty() || col_sel.is_empty() {
        log::warn!(
            "Tile {:?} outside source coverage (rows {:?}, cols {:?}), filled with NaN",
            shape,
            row_span,
            col_span
        );
        return Array2::from_elem(shape, f32::NAN);
    }

    let rows = source.rows.slice(ndarray::s![row_sel.clone()]);
    let cols = source.cols.slice(ndarray::s![col_sel.clone()]);
    let values = source.values.slice(ndarray::s![row_sel, col_sel]);

    let mut out = Array2::from_elem(shape, f32::NAN);
    ndarray::Zip::from(&mut out)
        .and(&slice.first)
        .and(&slice.second)
        .for_each(|o, &p0, &p1| {
            if let (Some(i), Some(j)) = (nearest_index(rows, p0), nearest_index(cols, p1)) {
                *o = values[[i, j]];
            }
        });
    out
}

/// (min, max) ignoring NaN; None when there is no finite value
fn nan_extent<'a>(values: impl Iterator<Item = &'a f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| !v.is_nan())
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Index range of axis samples strictly inside `[min - d, max + d]`, d being the axis spacing
fn support_range(axis: ArrayView1<'_, f64>, (min, max): (f64, f64)) -> Range<usize> {
    let n = axis.len();
    let spacing = if n > 1 { (axis[1] - axis[0]).abs() } else { 0.0 };
    let lo = min - spacing;
    let hi = max + spacing;

    let values = axis.as_slice();
    match values {
        Some(values) => {
            let start = values.partition_point(|&v| v <= lo);
            let end = values.partition_point(|&v| v < hi);
            start..end.max(start)
        }
        None => {
            let start = axis.iter().take_while(|&&v| v <= lo).count();
            let end = axis.iter().take_while(|&&v| v < hi).count();
            start..end.max(start)
        }
    }
}

/// Nearest sample index on an increasing axis; None outside the axis or for NaN.
/// Halfway points resolve to the lower sample.
fn nearest_index(axis: ArrayView1<'_, f64>, p: f64) -> Option<usize> {
    let n = axis.len();
    if n == 0 || p.is_nan() || p < axis[0] || p > axis[n - 1] {
        return None;
    }
    if n == 1 {
        return Some(0);
    }

    // last sample <= p, kept below the final interval
    let mut lo = 0;
    let mut hi = n - 1;
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if axis[mid] <= p {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let frac = (p - axis[lo]) / (axis[lo + 1] - axis[lo]);
    Some(if frac <= 0.5 { lo } else { lo + 1 })
}
