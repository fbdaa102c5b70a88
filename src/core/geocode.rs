//! Stack-level geocoding: building the decimated transform tables for a stack
//! and moving its grids between radar and geographic coordinates.

use crate::core::grid::{Coordinate, LabeledGrid};
use crate::core::progress::{NoProgress, ProgressReporter};
use crate::core::reproject::{accepts, GridReprojector};
use crate::core::topo::{flip_rows, radar_topography, STORED_TOPO_DIMS};
use crate::core::transform_table::{TableSource, TransformTable, TransformTableBuilder};
use crate::io::grid_store::{GridStore, PairRegistry, TableProvider};
use crate::io::netcdf_table::{write_table, TransformTableReader};
use crate::types::{Direction, GeocodeConfig, Pair, SarError, SarResult};
use std::path::{Path, PathBuf};

/// Grid used to define the resolution of the decimated tables
const REFERENCE_GRID: &str = "phasefilt";
const TOPO_GRID: &str = "topo";
/// Label dimension of opened stacks
pub const PAIR_DIM: &str = "pair";

/// Result of a build step: kept in memory (interactive) or written to disk
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutput<T> {
    InMemory(T),
    Persisted(PathBuf),
}

impl<T> BuildOutput<T> {
    pub fn into_memory(self) -> Option<T> {
        match self {
            BuildOutput::InMemory(value) => Some(value),
            BuildOutput::Persisted(_) => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            BuildOutput::InMemory(_) => None,
            BuildOutput::Persisted(path) => Some(path),
        }
    }
}

/// Geocoding front end for one interferogram stack
pub struct Geocoder<'a> {
    store: &'a dyn GridStore,
    tables: &'a dyn TableProvider,
    registry: &'a dyn PairRegistry,
    config: GeocodeConfig,
    progress: &'a dyn ProgressReporter,
}

impl<'a> Geocoder<'a> {
    pub fn new(store: &'a dyn GridStore, tables: &'a dyn TableProvider, registry: &'a dyn PairRegistry) -> Self {
        Self {
            store,
            tables,
            registry,
            config: GeocodeConfig::default(),
            progress: &NoProgress,
        }
    }

    pub fn with_config(mut self, config: GeocodeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &GeocodeConfig {
        &self.config
    }

    /// The given pairs in order, or every registered pair for `None`
    pub fn pairs(&self, pairs: Option<&[Pair]>) -> SarResult<Vec<Pair>> {
        let pairs = match pairs {
            Some(pairs) => pairs.to_vec(),
            None => self.registry.pairs(),
        };
        if pairs.is_empty() {
            return Err(SarError::Processing("No interferogram pairs selected".to_string()));
        }
        Ok(pairs)
    }

    /// Open a named grid for every pair as a stack along `pair`.
    ///
    /// The stack carries `ref` and `rep` date coordinates. With `geocode` the
    /// stack is moved to geographic coordinates.
    pub fn open_grids(&self, pairs: Option<&[Pair]>, name: &str, geocode: bool) -> SarResult<LabeledGrid> {
        let pairs = self.pairs(pairs)?;
        let grids = pairs
            .iter()
            .map(|pair| self.store.open_grid(name, Some(pair)))
            .collect::<SarResult<Vec<_>>>()?;

        let labels = pairs.iter().map(|p| p.to_string()).collect();
        let mut stack = LabeledGrid::stack(&grids, PAIR_DIM, labels)?;
        let dates = |date: fn(&Pair) -> String| Coordinate::Labels {
            dim: PAIR_DIM.to_string(),
            values: pairs.iter().map(date).collect(),
        };
        stack.set_coord("ref", dates(|p| p.reference.format("%Y-%m-%d").to_string()))?;
        stack.set_coord("rep", dates(|p| p.repeat.format("%Y-%m-%d").to_string()))?;

        if geocode {
            self.intf_ra2ll(&stack)
        } else {
            Ok(stack)
        }
    }

    /// Build every table the stack needs for geocoding.
    ///
    /// Merged subswath stacks get their radar topography first; single
    /// subswath stacks already have it from interferogram processing.
    pub fn geocode_parallel(&self, pairs: Option<&[Pair]>) -> SarResult<()> {
        if self.registry.subswath() >= 10 {
            self.topo(false)?;
        }
        self.intf_ll2ra_matrix(pairs, false)?;
        self.intf_ra2ll_matrix(pairs, false)?;
        Ok(())
    }

    /// Decimated radar to geographic table matched to the stack resolution
    pub fn intf_ra2ll_matrix(&self, pairs: Option<&[Pair]>, interactive: bool) -> SarResult<BuildOutput<TransformTable>> {
        self.build_table(Direction::RadarToGeographic, pairs, interactive)
    }

    /// Decimated geographic to radar table matched to the stack resolution
    pub fn intf_ll2ra_matrix(&self, pairs: Option<&[Pair]>, interactive: bool) -> SarResult<BuildOutput<TransformTable>> {
        self.build_table(Direction::GeographicToRadar, pairs, interactive)
    }

    fn build_table(
        &self,
        direction: Direction,
        pairs: Option<&[Pair]>,
        interactive: bool,
    ) -> SarResult<BuildOutput<TransformTable>> {
        let pairs = self.pairs(pairs)?;
        let reference = self.store.open_grid(REFERENCE_GRID, Some(&pairs[0]))?;

        let full = match direction {
            Direction::RadarToGeographic => self.tables.trans_dat()?,
            Direction::GeographicToRadar => self.tables.trans_dat_inv()?,
        };
        if full.direction() != direction {
            return Err(SarError::InvalidFormat(format!(
                "Table provider returned a {} table for {}",
                full.direction(),
                direction
            )));
        }

        let table = TransformTableBuilder::new(&self.config).decimate(&reference, &full)?;
        if interactive {
            return Ok(BuildOutput::InMemory(table));
        }

        let path = self.store.table_path(direction.table_name());
        write_table(&table, &path, &self.config, self.progress)?;
        Ok(BuildOutput::Persisted(path))
    }

    pub fn get_intf_ra2ll(&self) -> SarResult<TransformTableReader> {
        self.open_table(Direction::RadarToGeographic)
    }

    pub fn get_intf_ll2ra(&self) -> SarResult<TransformTableReader> {
        self.open_table(Direction::GeographicToRadar)
    }

    fn open_table(&self, direction: Direction) -> SarResult<TransformTableReader> {
        let reader = TransformTableReader::open(self.store.table_path(direction.table_name()))?;
        if reader.direction() != direction {
            return Err(SarError::InvalidFormat(format!(
                "{} holds a {} table, expected {}",
                reader.path().display(),
                reader.direction(),
                direction
            )));
        }
        Ok(reader)
    }

    /// Geocode a radar grid or stack; other grids are returned unchanged
    pub fn intf_ra2ll(&self, grid: &LabeledGrid) -> SarResult<LabeledGrid> {
        self.transform(Direction::RadarToGeographic, grid)
    }

    /// Inverse geocode a geographic grid or stack; other grids are returned unchanged
    pub fn intf_ll2ra(&self, grid: &LabeledGrid) -> SarResult<LabeledGrid> {
        self.transform(Direction::GeographicToRadar, grid)
    }

    fn transform(&self, direction: Direction, grid: &LabeledGrid) -> SarResult<LabeledGrid> {
        // checked before the table is opened so grids already in place never need one
        if !accepts(direction, grid) {
            return Ok(grid.clone());
        }
        let table = self.open_table(direction)?;
        GridReprojector::new(&table, &self.config)
            .plan(grid)?
            .execute_with_progress(self.progress)
    }

    /// Radar topography from the inverse table.
    ///
    /// Interactive mode returns the grid as computed; otherwise it is stored
    /// flipped vertically under the `a`/`r` dimensions.
    pub fn topo(&self, interactive: bool) -> SarResult<BuildOutput<LabeledGrid>> {
        let topo = radar_topography(&self.tables.trans_dat_inv()?)?;
        if interactive {
            return Ok(BuildOutput::InMemory(topo));
        }
        let stored = flip_rows(&topo, STORED_TOPO_DIMS)?;
        let path = self.store.save_grid(&stored, TOPO_GRID, None)?;
        Ok(BuildOutput::Persisted(path))
    }

    /// Stored radar topography, flipped back to `y`/`x` orientation
    pub fn get_topo(&self) -> SarResult<LabeledGrid> {
        let stored = self.store.open_grid(TOPO_GRID, None)?;
        flip_rows(&stored, Direction::GeographicToRadar.target().dims())
    }
}
