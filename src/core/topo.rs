use crate::core::grid::{Coordinate, LabeledGrid};
use crate::core::transform_table::TransformTable;
use crate::types::{Direction, SarError, SarResult};
use ndarray::s;

/// Dimension names of the stored topography grid
pub const STORED_TOPO_DIMS: [&str; 2] = ["a", "r"];

/// Radar-coordinates topography from the full-resolution inverse table.
///
/// The elevation payload loses its first row and column so the grid size is
/// a whole multiple of the interferogram size. The NaN-ignoring mean is
/// attached as the `average` coordinate.
pub fn radar_topography(trans_inv: &TransformTable) -> SarResult<LabeledGrid> {
    if trans_inv.direction() != Direction::GeographicToRadar {
        return Err(SarError::InvalidFormat(format!(
            "Radar topography needs the ll2ra table, got {}",
            trans_inv.direction()
        )));
    }
    let ele = trans_inv
        .payload()
        .get("ele")
        .ok_or_else(|| SarError::NotFound("Elevation 'ele' in the ll2ra table".to_string()))?;

    let (nrows, ncols) = ele.dim();
    if nrows < 2 || ncols < 2 {
        return Err(SarError::Processing(format!(
            "Elevation grid {}x{} too small for radar topography",
            nrows, ncols
        )));
    }

    let [row_dim, col_dim] = Direction::GeographicToRadar.target().dims();
    let mut topo = LabeledGrid::new_2d(
        "topo",
        (row_dim, trans_inv.rows().slice(s![1..]).to_owned()),
        (col_dim, trans_inv.cols().slice(s![1..]).to_owned()),
        ele.slice(s![1.., 1..]).to_owned(),
    )?;

    let (sum, count) = topo
        .values_2d()?
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0f64, 0usize), |(sum, count), &v| (sum + f64::from(v), count + 1));
    let average = if count > 0 { sum / count as f64 } else { f64::NAN };
    topo.set_coord("average", Coordinate::Scalar(average))?;

    log::info!(
        "Radar topography {}x{}, average elevation {:.1} m",
        nrows - 1,
        ncols - 1,
        average
    );
    Ok(topo)
}

/// Flip the rows of a 2D grid and rename its spatial dimensions.
///
/// Axis values stay in place, only the samples are reversed; dimensionless
/// coordinates are kept.
pub fn flip_rows(grid: &LabeledGrid, dims: [&str; 2]) -> SarResult<LabeledGrid> {
    let [row_dim, col_dim] = grid.spatial_dims();
    let values = grid.values_2d()?.slice(s![..;-1, ..]).to_owned();
    let mut flipped = LabeledGrid::new_2d(
        grid.name(),
        (dims[0], grid.axis(row_dim)?.clone()),
        (dims[1], grid.axis(col_dim)?.clone()),
        values,
    )?;

    for (name, coord) in grid.coords() {
        if matches!(coord, Coordinate::Scalar(_) | Coordinate::Text(_)) {
            flipped.set_coord(name, coord.clone())?;
        }
    }
    Ok(flipped)
}
