use crate::types::{finite_range, FusionResult, MultiBandRaster, RasterBand, RasterReal};
use ndarray::{ArrayView2, Axis, Zip};

/// Default guard added to the band range so constant bands map to zero
pub const DEFAULT_EPSILON: RasterReal = 1e-8;

/// Per-band min-max rescaling to [0, 1]
///
/// Each band is rescaled with its own finite minimum and maximum:
/// `(x - min) / (max - min + epsilon)`. A constant band becomes all zeros.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    epsilon: RasterReal,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_epsilon(epsilon: RasterReal) -> Self {
        Self { epsilon }
    }

    pub fn epsilon(&self) -> RasterReal {
        self.epsilon
    }

    /// Rescale a single band
    pub fn normalize_band(&self, band: &ArrayView2<'_, RasterReal>) -> RasterBand {
        let (min, max) = finite_range(band);
        if !min.is_finite() {
            // no finite samples; nothing to rescale against
            return band.to_owned();
        }

        let min = min as f64;
        let denom = (max as f64 - min) + self.epsilon as f64;
        band.mapv(|value| ((value as f64 - min) / denom) as RasterReal)
    }

    /// Rescale every band of a raster independently
    pub fn normalize(&self, raster: &MultiBandRaster) -> FusionResult<MultiBandRaster> {
        log::debug!(
            "Normalizing {} bands of {:?} (epsilon = {:e})",
            raster.band_count(),
            raster.grid_shape(),
            self.epsilon
        );

        let mut data = raster.data().clone();
        let bands = Zip::from(data.axis_iter_mut(Axis(0))).and(raster.data().axis_iter(Axis(0)));

        #[cfg(feature = "parallel")]
        bands.par_for_each(|mut target, source| target.assign(&self.normalize_band(&source)));

        #[cfg(not(feature = "parallel"))]
        bands.for_each(|mut target, source| target.assign(&self.normalize_band(&source)));

        MultiBandRaster::new(data)
    }
}
