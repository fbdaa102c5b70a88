use crate::core::grid::{axis_spacing, LabeledGrid};
use crate::types::{CoordinateSystem, GeoTransform, SarError, SarResult};
use gdal::raster::{Buffer, RasterCreationOption};
use gdal::spatial_ref::SpatialRef;
use gdal::DriverManager;
use ndarray::{s, Array2};
use std::path::Path;

const WGS84_EPSG: u32 = 4326;

/// Pixel-edge geotransform of a north-up raster covering the grid's lat/lon axes
pub fn geographic_transform(grid: &LabeledGrid) -> SarResult<GeoTransform> {
    let lat = grid.axis("lat")?;
    let lon = grid.axis("lon")?;
    let dlat = axis_spacing(lat)?.abs();
    let dlon = axis_spacing(lon)?;

    let north = lat[0].max(lat[lat.len() - 1]);
    Ok(GeoTransform {
        top_left_x: lon[0] - dlon / 2.0,
        pixel_width: dlon,
        rotation_x: 0.0,
        top_left_y: north + dlat / 2.0,
        rotation_y: 0.0,
        pixel_height: -dlat,
    })
}

/// Samples ordered north to south
fn north_up(grid: &LabeledGrid) -> SarResult<Array2<f32>> {
    let values = grid.values_2d()?;
    let lat = grid.axis("lat")?;
    if axis_spacing(lat)? > 0.0 {
        Ok(values.slice(s![..;-1, ..]).to_owned())
    } else {
        Ok(values.clone())
    }
}

/// Save a geocoded 2D grid as a single-band EPSG:4326 GeoTIFF with NaN no-data
pub fn save_geotiff<P: AsRef<Path>>(grid: &LabeledGrid, output_path: P, compression: Option<&str>) -> SarResult<()> {
    if grid.ndim() != 2 || !grid.is_in(CoordinateSystem::Geographic) {
        return Err(SarError::InvalidFormat(format!(
            "GeoTIFF export needs a 2D lat/lon grid, '{}' has dimensions {:?}",
            grid.name(),
            grid.dims()
        )));
    }
    log::info!("Saving '{}' as GeoTIFF: {}", grid.name(), output_path.as_ref().display());

    let transform = geographic_transform(grid)?;
    let image = north_up(grid)?;
    let (height, width) = image.dim();

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let options: Vec<RasterCreationOption> = compression
        .map(|value| RasterCreationOption { key: "COMPRESS", value })
        .into_iter()
        .collect();
    let mut dataset = driver.create_with_band_type_with_options::<f32, _>(
        output_path.as_ref(),
        width as isize,
        height as isize,
        1,
        &options,
    )?;

    dataset.set_geo_transform(&transform.to_gdal())?;
    dataset.set_spatial_ref(&SpatialRef::from_epsg(WGS84_EPSG)?)?;

    let mut band = dataset.rasterband(1)?;
    let buffer = Buffer::new((width, height), image.iter().cloned().collect());
    band.write((0, 0), (width, height), &buffer)?;
    band.set_no_data_value(Some(f64::NAN))?;

    log::info!("✅ GeoTIFF saved successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array;
    use tempfile::TempDir;

    fn geographic_grid() -> LabeledGrid {
        LabeledGrid::new_2d(
            "unwrap",
            ("lat", Array::range(0.0, 3.0, 1.0) * 0.5 + 35.0),
            ("lon", Array::range(0.0, 4.0, 1.0) * 0.25 + 120.0),
            Array2::from_shape_fn((3, 4), |(i, j)| (i * 4 + j) as f32),
        )
        .unwrap()
    }

    #[test]
    fn test_geographic_transform_uses_pixel_edges() {
        let transform = geographic_transform(&geographic_grid()).unwrap();
        assert_relative_eq!(transform.top_left_x, 119.875);
        assert_relative_eq!(transform.pixel_width, 0.25);
        assert_relative_eq!(transform.top_left_y, 36.25);
        assert_relative_eq!(transform.pixel_height, -0.5);
    }

    #[test]
    fn test_north_up_flips_ascending_latitudes() {
        let image = north_up(&geographic_grid()).unwrap();
        assert_eq!(image[[0, 0]], 8.0);
        assert_eq!(image[[2, 3]], 3.0);
    }

    #[test]
    fn test_save_geotiff() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("unwrap.tif");
        save_geotiff(&geographic_grid(), &path, Some("DEFLATE")).unwrap();

        let dataset = gdal::Dataset::open(&path).unwrap();
        assert_eq!(dataset.raster_size(), (4, 3));
        assert_relative_eq!(dataset.geo_transform().unwrap()[3], 36.25);
    }

    #[test]
    fn test_radar_grid_is_rejected() {
        let grid = LabeledGrid::new_2d(
            "unwrap",
            ("y", Array::range(0.0, 2.0, 1.0)),
            ("x", Array::range(0.0, 2.0, 1.0)),
            Array2::zeros((2, 2)),
        )
        .unwrap();
        let dir = TempDir::new().unwrap();
        assert!(save_geotiff(&grid, dir.path().join("x.tif"), None).is_err());
    }
}
