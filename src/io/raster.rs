use crate::types::{
    FusionError, FusionResult, GeoTransform, MultiBandRaster, RasterBand, RasterCube,
    RasterProfile,
};
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use std::path::Path;

/// GDAL-backed raster reader
pub struct RasterReader;

impl RasterReader {
    fn profile(dataset: &Dataset) -> RasterProfile {
        let (width, height) = dataset.raster_size();
        RasterProfile {
            width,
            height,
            geo_transform: dataset.geo_transform().ok().map(GeoTransform::from_gdal),
            projection: dataset.projection(),
        }
    }

    fn read_band_data(dataset: &Dataset, index: usize) -> FusionResult<RasterBand> {
        let (width, height) = dataset.raster_size();
        let rasterband = dataset.rasterband(index as isize)?;
        let band_data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

        Array2::from_shape_vec((height, width), band_data.data).map_err(|e| {
            FusionError::InvalidFormat(format!("Failed to reshape band {}: {}", index, e))
        })
    }

    /// Read every band as f32 in (bands, height, width) order
    pub fn read_multiband<P: AsRef<Path>>(path: P) -> FusionResult<(MultiBandRaster, RasterProfile)> {
        log::info!("Reading raster from: {}", path.as_ref().display());

        let dataset = Dataset::open(path.as_ref())?;
        let profile = Self::profile(&dataset);
        let band_count = dataset.raster_count() as usize;

        log::debug!(
            "Raster size: {}x{}, {} band(s)",
            profile.width,
            profile.height,
            band_count
        );

        let mut cube = RasterCube::zeros((band_count, profile.height, profile.width));
        for (i, mut slot) in cube.outer_iter_mut().enumerate() {
            slot.assign(&Self::read_band_data(&dataset, i + 1)?);
        }

        Ok((MultiBandRaster::new(cube)?, profile))
    }

    /// Read a single band (1-based index)
    pub fn read_band<P: AsRef<Path>>(path: P, index: usize) -> FusionResult<(RasterBand, RasterProfile)> {
        log::info!("Reading band {} from: {}", index, path.as_ref().display());

        let dataset = Dataset::open(path.as_ref())?;
        let band_count = dataset.raster_count() as usize;
        if index == 0 || index > band_count {
            return Err(FusionError::InvalidParameter(format!(
                "band {} requested but {} has {} band(s)",
                index,
                path.as_ref().display(),
                band_count
            )));
        }

        let profile = Self::profile(&dataset);
        let band = Self::read_band_data(&dataset, index)?;
        Ok((band, profile))
    }
}

/// GeoTIFF writer
pub struct RasterWriter;

impl RasterWriter {
    /// Write a single-band f32 GeoTIFF on the grid described by `profile`
    pub fn write_band<P: AsRef<Path>>(
        path: P,
        band: &RasterBand,
        profile: &RasterProfile,
    ) -> FusionResult<()> {
        let (height, width) = band.dim();
        if (height, width) != (profile.height, profile.width) {
            return Err(FusionError::shape_mismatch(
                "output band",
                &[height, width],
                "raster profile",
                &[profile.height, profile.width],
            ));
        }

        log::info!("Writing {}x{} GeoTIFF: {}", width, height, path.as_ref().display());

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset = driver.create_with_band_type::<f32, _>(
            path.as_ref(),
            width as isize,
            height as isize,
            1,
        )?;

        if let Some(transform) = &profile.geo_transform {
            dataset.set_geo_transform(&transform.to_gdal())?;
        }
        if !profile.projection.is_empty() {
            dataset.set_projection(&profile.projection)?;
        }

        let mut rasterband = dataset.rasterband(1)?;
        let flat_data: Vec<f32> = band.iter().cloned().collect();
        let buffer = gdal::raster::Buffer::new((width, height), flat_data);
        rasterband.write((0, 0), (width, height), &buffer)?;

        Ok(())
    }
}
