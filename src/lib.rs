//! sargeo: radar ↔ geographic geocoding for InSAR grid stacks
//!
//! Builds decimated transform tables between radar (`y`, `x`) and geographic
//! (`lat`, `lon`) sample grids and resamples single grids or pair stacks
//! between the two systems tile by tile.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{CoordinateSystem, Direction, GeocodeConfig, Pair, SarError, SarResult};

pub use crate::core::{
    BuildOutput, Coordinate, Geocoder, GridReprojector, LabeledGrid, LogProgress, TransformTable,
    TransformTableBuilder,
};
pub use io::{NetCdfGridStore, PairList, TransformTableReader};

#[cfg(feature = "python")]
mod python {
    use crate::core::{GridReprojector, LabeledGrid, TableSource};
    use crate::io::TransformTableReader;
    use crate::types::{Direction, GeocodeConfig, SarError};
    use numpy::{IntoPyArray, PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
    use pyo3::prelude::*;

    type PyGrid<'py> = (&'py PyArray2<f32>, &'py PyArray1<f64>, &'py PyArray1<f64>);

    fn to_py_err(err: SarError) -> PyErr {
        match err {
            SarError::NotFound(_) => {
                PyErr::new::<pyo3::exceptions::PyFileNotFoundError, _>(format!("{}", err))
            }
            SarError::InvalidFormat(_) => PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", err)),
            _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", err)),
        }
    }

    /// Python wrapper for a persisted transform table
    #[pyclass(name = "TransformTable")]
    struct PyTransformTable {
        inner: TransformTableReader,
        config: GeocodeConfig,
    }

    impl PyTransformTable {
        fn open(path: &str, chunksize: usize) -> PyResult<Self> {
            let inner = TransformTableReader::open(path).map_err(to_py_err)?;
            Ok(PyTransformTable {
                inner,
                config: GeocodeConfig::with_chunksize(chunksize),
            })
        }

        fn transform_array<'py>(
            &self,
            py: Python<'py>,
            data: PyReadonlyArray2<'py, f32>,
            rows: PyReadonlyArray1<'py, f64>,
            cols: PyReadonlyArray1<'py, f64>,
        ) -> PyResult<PyGrid<'py>> {
            let [row_dim, col_dim] = self.inner.direction().source().dims();
            let grid = LabeledGrid::new_2d(
                "grid",
                (row_dim, rows.as_array().to_owned()),
                (col_dim, cols.as_array().to_owned()),
                data.as_array().to_owned(),
            )
            .map_err(to_py_err)?;

            let out = GridReprojector::new(&self.inner, &self.config)
                .reproject(&grid)
                .map_err(to_py_err)?;
            let values = out.values_2d().map_err(to_py_err)?.clone();

            Ok((
                values.into_pyarray(py),
                self.inner.rows().clone().into_pyarray(py),
                self.inner.cols().clone().into_pyarray(py),
            ))
        }
    }

    #[pymethods]
    impl PyTransformTable {
        #[new]
        #[pyo3(signature = (path, chunksize = 512))]
        fn new(path: String, chunksize: usize) -> PyResult<Self> {
            Self::open(&path, chunksize)
        }

        #[getter]
        fn direction(&self) -> String {
            self.inner.direction().tag().to_string()
        }

        #[getter]
        fn shape(&self) -> (usize, usize) {
            self.inner.dim()
        }

        /// Resample `data` on (`rows`, `cols`); returns values with the target axes
        fn transform<'py>(
            &self,
            py: Python<'py>,
            data: PyReadonlyArray2<'py, f32>,
            rows: PyReadonlyArray1<'py, f64>,
            cols: PyReadonlyArray1<'py, f64>,
        ) -> PyResult<PyGrid<'py>> {
            self.transform_array(py, data, rows, cols)
        }

        fn __repr__(&self) -> String {
            format!(
                "TransformTable(direction='{}', shape={:?}, path='{}')",
                self.inner.direction(),
                self.inner.dim(),
                self.inner.path().display()
            )
        }
    }

    fn transform_with(
        direction: Direction,
        py: Python<'_>,
        path: &str,
        data: PyReadonlyArray2<'_, f32>,
        rows: PyReadonlyArray1<'_, f64>,
        cols: PyReadonlyArray1<'_, f64>,
        chunksize: usize,
    ) -> PyResult<Py<PyAny>> {
        let table = PyTransformTable::open(path, chunksize)?;
        if table.inner.direction() != direction {
            return Err(PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
                "{} holds a {} table, expected {}",
                path,
                table.inner.direction(),
                direction
            )));
        }
        let result = table.transform_array(py, data, rows, cols)?;
        Ok(result.into_py(py))
    }

    /// Geocode a radar grid (`y`, `x`) to geographic coordinates
    #[pyfunction]
    #[pyo3(signature = (path, data, y, x, chunksize = 512))]
    fn ra2ll(
        py: Python<'_>,
        path: &str,
        data: PyReadonlyArray2<'_, f32>,
        y: PyReadonlyArray1<'_, f64>,
        x: PyReadonlyArray1<'_, f64>,
        chunksize: usize,
    ) -> PyResult<Py<PyAny>> {
        transform_with(Direction::RadarToGeographic, py, path, data, y, x, chunksize)
    }

    /// Inverse geocode a geographic grid (`lat`, `lon`) to radar coordinates
    #[pyfunction]
    #[pyo3(signature = (path, data, lat, lon, chunksize = 512))]
    fn ll2ra(
        py: Python<'_>,
        path: &str,
        data: PyReadonlyArray2<'_, f32>,
        lat: PyReadonlyArray1<'_, f64>,
        lon: PyReadonlyArray1<'_, f64>,
        chunksize: usize,
    ) -> PyResult<Py<PyAny>> {
        transform_with(Direction::GeographicToRadar, py, path, data, lat, lon, chunksize)
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_class::<PyTransformTable>()?;
        m.add_function(wrap_pyfunction!(ra2ll, m)?)?;
        m.add_function(wrap_pyfunction!(ll2ra, m)?)?;
        Ok(())
    }
}
