//! Persistence and collaborator interfaces

pub mod netcdf_table;
pub mod grid_store;
pub mod geotiff;

pub use netcdf_table::{write_table, TransformTableReader};
pub use grid_store::{GridStore, NetCdfGridStore, PairList, PairRegistry, TableProvider};
pub use geotiff::save_geotiff;
