use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Real-valued raster sample
pub type RasterReal = f32;

/// 2D single-band raster grid (height x width)
pub type RasterBand = Array2<RasterReal>;

/// 3D multi-band raster data (band x height x width)
pub type RasterCube = Array3<RasterReal>;

/// Geospatial transformation parameters (GDAL ordering)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }
}

/// Spatial profile of a raster file, kept so outputs can be written
/// on the same grid as the input they were derived from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterProfile {
    pub width: usize,
    pub height: usize,
    pub geo_transform: Option<GeoTransform>,
    /// Projection as WKT (empty when the source had none)
    pub projection: String,
}

/// An ordered stack of same-shaped bands in (bands, height, width) order.
///
/// All bands share one grid shape by construction; the raster is
/// read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiBandRaster {
    data: RasterCube,
}

impl MultiBandRaster {
    /// Wrap a (bands, height, width) cube
    pub fn new(data: RasterCube) -> FusionResult<Self> {
        let (bands, height, width) = data.dim();
        if bands == 0 {
            return Err(FusionError::InvalidParameter(
                "raster must contain at least one band".to_string(),
            ));
        }
        if height == 0 || width == 0 {
            return Err(FusionError::InvalidParameter(format!(
                "raster grid must be non-empty, got {}x{}",
                height, width
            )));
        }
        Ok(Self { data })
    }

    /// Stack individual bands, checking that every band has the same shape
    pub fn from_bands(bands: Vec<RasterBand>) -> FusionResult<Self> {
        let first = bands.first().ok_or_else(|| {
            FusionError::InvalidParameter("raster must contain at least one band".to_string())
        })?;
        let (height, width) = first.dim();

        for (index, band) in bands.iter().enumerate().skip(1) {
            if band.dim() != (height, width) {
                return Err(FusionError::shape_mismatch(
                    "band 0",
                    &[height, width],
                    format!("band {}", index),
                    band.shape(),
                ));
            }
        }

        let mut data = RasterCube::zeros((bands.len(), height, width));
        for (mut slot, band) in data.outer_iter_mut().zip(bands.iter()) {
            slot.assign(band);
        }
        Self::new(data)
    }

    /// Single-band raster from one grid
    pub fn from_band(band: RasterBand) -> FusionResult<Self> {
        Self::from_bands(vec![band])
    }

    pub fn band_count(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Grid shape (height, width) shared by all bands
    pub fn grid_shape(&self) -> (usize, usize) {
        let (_, height, width) = self.data.dim();
        (height, width)
    }

    /// Full (bands, height, width) shape
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn band(&self, index: usize) -> ArrayView2<'_, RasterReal> {
        self.data.index_axis(Axis(0), index)
    }

    pub fn bands(&self) -> impl Iterator<Item = ArrayView2<'_, RasterReal>> {
        self.data.outer_iter()
    }

    pub fn data(&self) -> &RasterCube {
        &self.data
    }

    pub fn into_data(self) -> RasterCube {
        self.data
    }

    /// Per-band (min, max) over finite samples
    ///
    /// A band without finite samples reports (NaN, NaN).
    pub fn band_ranges(&self) -> Vec<(RasterReal, RasterReal)> {
        self.bands().map(|band| finite_range(&band)).collect()
    }

    /// Replicate a single-band raster to `band_count` bands.
    ///
    /// A raster that already has `band_count` bands is returned as-is;
    /// any other band count cannot be aligned and is rejected.
    pub fn broadcast_to(&self, band_count: usize) -> FusionResult<Self> {
        let current = self.band_count();
        if current == band_count {
            return Ok(self.clone());
        }
        if current != 1 {
            let (height, width) = self.grid_shape();
            return Err(FusionError::shape_mismatch(
                "raster",
                &[current, height, width],
                "broadcast target",
                &[band_count, height, width],
            ));
        }

        log::debug!("Broadcasting single-band raster to {} bands", band_count);
        let (height, width) = self.grid_shape();
        let data = self
            .data
            .broadcast((band_count, height, width))
            .ok_or_else(|| {
                FusionError::InvalidParameter(format!(
                    "cannot broadcast raster to {} bands",
                    band_count
                ))
            })?
            .to_owned();
        Self::new(data)
    }

    /// Per-pixel arithmetic mean across bands
    pub fn band_mean(&self) -> RasterBand {
        let (_, height, width) = self.data.dim();
        let mut sum = Array2::<f64>::zeros((height, width));
        for band in self.bands() {
            sum.zip_mut_with(&band, |acc, &value| *acc += value as f64);
        }
        let count = self.band_count() as f64;
        sum.mapv(|value| (value / count) as RasterReal)
    }
}

/// (min, max) over the finite samples of a grid
pub(crate) fn finite_range(grid: &ArrayView2<'_, RasterReal>) -> (RasterReal, RasterReal) {
    let (min, max) = grid
        .iter()
        .filter(|value| value.is_finite())
        .fold((RasterReal::INFINITY, RasterReal::NEG_INFINITY), |(lo, hi), &value| {
            (lo.min(value), hi.max(value))
        });
    if min > max {
        (RasterReal::NAN, RasterReal::NAN)
    } else {
        (min, max)
    }
}

/// Error types for quality assessment and fusion
#[derive(Debug, thiserror::Error)]
pub enum FusionError {
    #[error("Shape mismatch: {left} has shape {left_shape:?} but {right} has shape {right_shape:?}")]
    ShapeMismatch {
        left: String,
        left_shape: Vec<usize>,
        right: String,
        right_shape: Vec<usize>,
    },

    #[error("Degenerate range: {reference} band {band} has zero dynamic range and differs from the compared grid")]
    DegenerateRange { reference: String, band: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

impl FusionError {
    pub fn shape_mismatch(
        left: impl Into<String>,
        left_shape: &[usize],
        right: impl Into<String>,
        right_shape: &[usize],
    ) -> Self {
        FusionError::ShapeMismatch {
            left: left.into(),
            left_shape: left_shape.to_vec(),
            right: right.into(),
            right_shape: right_shape.to_vec(),
        }
    }
}

/// Result type for fusion operations
pub type FusionResult<T> = Result<T, FusionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    #[test]
    fn test_rejects_empty_raster() {
        let empty = Array3::<f32>::zeros((0, 4, 4));
        assert!(matches!(
            MultiBandRaster::new(empty),
            Err(FusionError::InvalidParameter(_))
        ));
        assert!(MultiBandRaster::from_bands(Vec::new()).is_err());
    }

    #[test]
    fn test_from_bands_shape_check() {
        let a = Array2::<f32>::zeros((3, 3));
        let b = Array2::<f32>::zeros((3, 4));
        match MultiBandRaster::from_bands(vec![a, b]) {
            Err(FusionError::ShapeMismatch { right_shape, .. }) => {
                assert_eq!(right_shape, vec![3, 4]);
            }
            other => panic!("expected shape mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_broadcast_single_band() {
        let raster = MultiBandRaster::from_band(array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let broadcast = raster.broadcast_to(3).unwrap();
        assert_eq!(broadcast.dim(), (3, 2, 2));
        for band in broadcast.bands() {
            assert_eq!(band, raster.band(0));
        }

        let two = MultiBandRaster::from_bands(vec![
            array![[1.0f32]],
            array![[2.0f32]],
        ])
        .unwrap();
        assert!(two.broadcast_to(3).is_err());
        assert_eq!(two.broadcast_to(2).unwrap(), two);
    }

    #[test]
    fn test_band_mean_and_ranges() {
        let raster = MultiBandRaster::from_bands(vec![
            array![[0.0, 2.0], [4.0, 6.0]],
            array![[2.0, 2.0], [f32::NAN, 10.0]],
        ])
        .unwrap();
        let mean = raster.band_mean();
        assert_eq!(mean[[0, 0]], 1.0);
        assert_eq!(mean[[1, 1]], 8.0);
        assert!(mean[[1, 0]].is_nan());

        let ranges = raster.band_ranges();
        assert_eq!(ranges[0], (0.0, 6.0));
        assert_eq!(ranges[1], (2.0, 10.0));
    }

    #[test]
    fn test_geotransform_roundtrip() {
        let gt = [500000.0, 4.0, 0.0, 3400000.0, 0.0, -4.0];
        assert_eq!(GeoTransform::from_gdal(gt).to_gdal(), gt);
    }
}
