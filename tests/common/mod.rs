#![allow(dead_code)]

use ndarray::{Array, Array1, Array2};
use sargeo::io::{write_table, GridStore, NetCdfGridStore, PairList};
use sargeo::{Direction, GeocodeConfig, LabeledGrid, LogProgress, Pair, TransformTable};
use tempfile::TempDir;

pub const PAIRS: [&str; 2] = ["2023-01-01 2023-01-13", "2023-01-13 2023-01-25"];

/// Stack directory with full-resolution tables and a `phasefilt` grid per pair
pub struct StackFixture {
    pub dir: TempDir,
    pub store: NetCdfGridStore,
    pub registry: PairList,
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 0, 1, ..., n-1
pub fn unit_axis(n: usize) -> Array1<f64> {
    Array::range(0.0, n as f64, 1.0)
}

/// 0, 4, ..., 4(n-1)
pub fn coarse_axis(n: usize) -> Array1<f64> {
    Array::range(0.0, 4.0 * n as f64, 4.0)
}

/// 100x100 lat/lon table on 1-unit spacing pointing at slightly irregular radar positions
pub fn full_forward_table() -> TransformTable {
    let azi = Array2::from_shape_fn((100, 100), |(i, j)| i as f64 + 0.35 * (j % 3) as f64);
    let rng = Array2::from_shape_fn((100, 100), |(i, j)| j as f64 - 0.45 * (i % 2) as f64);
    TransformTable::new(Direction::RadarToGeographic, unit_axis(100), unit_axis(100), azi, rng)
        .expect("Failed to create forward table")
        .with_aux_axes(unit_axis(100), unit_axis(100))
}

/// 100x100 radar table on 1-unit spacing with elevation
pub fn full_inverse_table() -> TransformTable {
    let lt = Array2::from_shape_fn((100, 100), |(i, j)| i as f64 + 0.2 * (j % 2) as f64);
    let ll = Array2::from_shape_fn((100, 100), |(i, j)| j as f64 + 0.3 * (i % 3) as f64);
    let ele = Array2::from_shape_fn((100, 100), |(i, j)| 100.0 + (i + j) as f32);
    TransformTable::new(Direction::GeographicToRadar, unit_axis(100), unit_axis(100), lt, ll)
        .expect("Failed to create inverse table")
        .with_payload("ele", ele)
        .expect("Failed to attach elevation")
}

/// Checkerboard with distinct magnitudes on the 4-unit radar grid
pub fn checkerboard(name: &str, n: usize, seed: f32) -> LabeledGrid {
    let values = Array2::from_shape_fn((n, n), |(i, j)| {
        let sign = if (i / 2 + j / 2) % 2 == 0 { 1.0 } else { -1.0 };
        sign * (seed + (i * n + j) as f32)
    });
    LabeledGrid::new_2d(name, ("y", coarse_axis(n)), ("x", coarse_axis(n)), values)
        .expect("Failed to create checkerboard grid")
}

pub fn stack_fixture(subswath: u32) -> StackFixture {
    init_logging();
    let dir = TempDir::new().expect("Failed to create temp directory");
    let store = NetCdfGridStore::new(dir.path())
        .expect("Failed to create grid store")
        .with_config(GeocodeConfig::with_chunksize(16));
    let registry = PairList::parse(&PAIRS)
        .expect("Failed to parse pairs")
        .with_subswath(subswath);

    let config = GeocodeConfig::default();
    let progress = LogProgress::new();
    write_table(&full_forward_table(), &store.table_path("trans"), &config, &progress)
        .expect("Failed to write trans");
    write_table(&full_inverse_table(), &store.table_path("trans_inv"), &config, &progress)
        .expect("Failed to write trans_inv");

    for (k, text) in PAIRS.iter().enumerate() {
        let pair = Pair::parse(text).expect("Failed to parse pair");
        for name in ["phasefilt", "unwrap"] {
            let grid = checkerboard(name, 25, 1000.0 * k as f32);
            store
                .save_grid(&grid, name, Some(&pair))
                .expect("Failed to save grid");
        }
    }

    StackFixture { dir, store, registry }
}

/// Untiled nearest neighbour over the whole axis; ties go to the lower sample
pub fn brute_nearest(axis: &Array1<f64>, p: f64) -> Option<usize> {
    let n = axis.len();
    if p.is_nan() || p < axis[0] || p > axis[n - 1] {
        return None;
    }
    let mut best = 0;
    for (k, v) in axis.iter().enumerate() {
        if (v - p).abs() < (axis[best] - p).abs() {
            best = k;
        }
    }
    Some(best)
}

pub fn same_samples(a: &Array2<f32>, b: &Array2<f32>) -> bool {
    a.dim() == b.dim() && a.iter().zip(b.iter()).all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
}
