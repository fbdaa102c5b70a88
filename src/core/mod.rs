//! Core geocoding modules

pub mod grid;
pub mod progress;
pub mod transform_table;
pub mod tile_interp;
pub mod reproject;
pub mod topo;
pub mod geocode;

// Re-export main types
pub use grid::{Coordinate, GridData, LabeledGrid};
pub use progress::{LogProgress, NoProgress, ProgressReporter};
pub use transform_table::{TableSlice, TableSource, TransformTable, TransformTableBuilder};
pub use tile_interp::{interpolate_tile, SourceGrid};
pub use reproject::{GridReprojector, ReprojectionPlan};
pub use topo::radar_topography;
pub use geocode::{BuildOutput, Geocoder};
