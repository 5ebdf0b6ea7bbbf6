//! Spectral and spatial distortion estimators
//!
//! Both estimators reduce a pair of rasters to one scalar: the band-averaged
//! squared NRMSE between each fused band and its reference grid. The spectral
//! estimator compares band-for-band against the multispectral source; the
//! spatial estimator compares every fused band against the per-pixel mean of
//! the SAR bands.

use crate::types::{finite_range, FusionError, FusionResult, MultiBandRaster, RasterReal};
use ndarray::{ArrayView2, Zip};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Denominator used to normalize the RMSE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NrmseNormalization {
    /// Dynamic range (max - min) of the reference grid
    #[default]
    MinMax,
    /// Root of the mean squared reference value
    Euclidean,
    /// Root of the mean squared test value.
    ///
    /// Same scaling as scikit-image `normalized_root_mse(fused, reference)`,
    /// which takes its first argument as the true image.
    TestEuclidean,
    /// Mean reference value
    Mean,
}

/// Mean of `f(x)` over the finite samples of `grid`; NaN if there are none
fn finite_mean<F>(grid: &ArrayView2<'_, RasterReal>, f: F) -> f64
where
    F: Fn(f64) -> f64,
{
    let (sum, count) = grid
        .iter()
        .filter(|value| value.is_finite())
        .fold((0.0f64, 0usize), |(sum, count), &value| (sum + f(value as f64), count + 1));
    sum / count as f64
}

/// Normalized root-mean-square error of `test` against `reference`.
///
/// Every denominator is computed over finite samples only, so a NaN sample
/// never affects the scale; it still reaches the RMSE and yields a NaN result.
/// When the denominator is zero (or there are no finite samples) the result
/// is 0.0 for identical grids and `DegenerateRange` otherwise.
pub fn nrmse(
    test: &ArrayView2<'_, RasterReal>,
    reference: &ArrayView2<'_, RasterReal>,
    normalization: NrmseNormalization,
) -> FusionResult<f64> {
    if test.dim() != reference.dim() {
        return Err(FusionError::shape_mismatch(
            "test grid",
            test.shape(),
            "reference grid",
            reference.shape(),
        ));
    }
    if reference.is_empty() {
        return Err(FusionError::InvalidParameter(
            "cannot compute NRMSE of an empty grid".to_string(),
        ));
    }

    let count = reference.len() as f64;
    let mut squared_error = 0.0f64;
    Zip::from(test).and(reference).for_each(|&t, &r| {
        let diff = t as f64 - r as f64;
        squared_error += diff * diff;
    });
    let rmse = (squared_error / count).sqrt();

    let denom = match normalization {
        NrmseNormalization::MinMax => {
            let (min, max) = finite_range(reference);
            max as f64 - min as f64
        }
        NrmseNormalization::Euclidean => finite_mean(reference, |r| r * r).sqrt(),
        NrmseNormalization::TestEuclidean => finite_mean(test, |t| t * t).sqrt(),
        NrmseNormalization::Mean => finite_mean(reference, |r| r),
    };

    if denom == 0.0 || !denom.is_finite() {
        if rmse == 0.0 {
            return Ok(0.0);
        }
        return Err(FusionError::DegenerateRange {
            reference: "reference grid".to_string(),
            band: 0,
        });
    }

    Ok(rmse / denom)
}

/// Squared NRMSE with degenerate-range failures attributed to a named band
fn squared_band_nrmse(
    test: &ArrayView2<'_, RasterReal>,
    reference: &ArrayView2<'_, RasterReal>,
    normalization: NrmseNormalization,
    reference_name: &str,
    band: usize,
) -> FusionResult<f64> {
    match nrmse(test, reference, normalization) {
        Ok(value) => Ok(value * value),
        Err(FusionError::DegenerateRange { .. }) => Err(FusionError::DegenerateRange {
            reference: reference_name.to_string(),
            band,
        }),
        Err(other) => Err(other),
    }
}

/// Mean of per-band values, evaluated across bands in parallel when enabled.
///
/// Values are summed in band order so both paths produce the same result.
fn band_average<F>(band_count: usize, per_band: F) -> FusionResult<f64>
where
    F: Fn(usize) -> FusionResult<f64> + Sync + Send,
{
    #[cfg(feature = "parallel")]
    let values: Vec<FusionResult<f64>> = (0..band_count).into_par_iter().map(&per_band).collect();

    #[cfg(not(feature = "parallel"))]
    let values: Vec<FusionResult<f64>> = (0..band_count).map(&per_band).collect();

    let values = values.into_iter().collect::<FusionResult<Vec<f64>>>()?;
    Ok(values.iter().sum::<f64>() / band_count as f64)
}

/// D_lambda: spectral distortion of the fused raster against the multispectral source
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralDistortionEstimator {
    normalization: NrmseNormalization,
}

impl SpectralDistortionEstimator {
    pub fn new(normalization: NrmseNormalization) -> Self {
        Self { normalization }
    }

    /// Band-averaged squared NRMSE between `fused[b]` and `ms[b]`
    pub fn estimate(&self, fused: &MultiBandRaster, ms: &MultiBandRaster) -> FusionResult<f64> {
        let (fused_bands, height, width) = fused.dim();
        if fused.dim() != ms.dim() {
            let (ms_bands, ms_height, ms_width) = ms.dim();
            return Err(FusionError::shape_mismatch(
                "fused",
                &[fused_bands, height, width],
                "ms",
                &[ms_bands, ms_height, ms_width],
            ));
        }

        let d_lambda = band_average(fused_bands, |b| {
            let value =
                squared_band_nrmse(&fused.band(b), &ms.band(b), self.normalization, "ms", b)?;
            log::debug!("D_lambda band {}: {:.6}", b, value);
            Ok(value)
        })?;

        log::debug!("Spectral distortion over {} bands: {:.6}", fused_bands, d_lambda);
        Ok(d_lambda)
    }
}

/// DS: spatial distortion of the fused raster against a SAR-derived reference
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialDistortionEstimator {
    normalization: NrmseNormalization,
}

impl SpatialDistortionEstimator {
    pub fn new(normalization: NrmseNormalization) -> Self {
        Self { normalization }
    }

    /// Collapse `sar` to its per-pixel band mean, then average the squared
    /// NRMSE of every fused band against that surface
    pub fn estimate(&self, fused: &MultiBandRaster, sar: &MultiBandRaster) -> FusionResult<f64> {
        if fused.grid_shape() != sar.grid_shape() {
            let (fh, fw) = fused.grid_shape();
            let (sh, sw) = sar.grid_shape();
            return Err(FusionError::shape_mismatch("fused", &[fh, fw], "sar", &[sh, sw]));
        }

        let sar_mean = sar.band_mean();
        self.estimate_against(fused, &sar_mean.view())
    }

    /// Average squared NRMSE of every fused band against one reference grid
    pub fn estimate_against(
        &self,
        fused: &MultiBandRaster,
        reference: &ArrayView2<'_, RasterReal>,
    ) -> FusionResult<f64> {
        let (fh, fw) = fused.grid_shape();
        if (fh, fw) != reference.dim() {
            return Err(FusionError::shape_mismatch(
                "fused",
                &[fh, fw],
                "sar_mean",
                reference.shape(),
            ));
        }

        let ds = band_average(fused.band_count(), |b| {
            let value =
                squared_band_nrmse(&fused.band(b), reference, self.normalization, "sar_mean", b)?;
            log::debug!("DS band {}: {:.6}", b, value);
            Ok(value)
        })?;

        log::debug!("Spatial distortion over {} bands: {:.6}", fused.band_count(), ds);
        Ok(ds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn test_nrmse_minmax() {
        let reference = array![[0.0f32, 10.0], [0.0, 10.0]];
        let test = array![[1.0f32, 11.0], [1.0, 11.0]];
        let value = nrmse(&test.view(), &reference.view(), NrmseNormalization::MinMax).unwrap();
        // rmse 1, range 10
        assert_abs_diff_eq!(value, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_nrmse_euclidean_and_mean() {
        let reference = array![[2.0f32, 2.0], [2.0, 2.0]];
        let test = array![[3.0f32, 3.0], [3.0, 3.0]];
        let euclidean =
            nrmse(&test.view(), &reference.view(), NrmseNormalization::Euclidean).unwrap();
        let mean = nrmse(&test.view(), &reference.view(), NrmseNormalization::Mean).unwrap();
        assert_abs_diff_eq!(euclidean, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(mean, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_nrmse_test_euclidean_scales_by_test_grid() {
        let reference = array![[2.0f32, 2.0], [2.0, 2.0]];
        let test = array![[4.0f32, 4.0], [4.0, 4.0]];
        let value =
            nrmse(&test.view(), &reference.view(), NrmseNormalization::TestEuclidean).unwrap();
        // rmse 2, sqrt(mean(test^2)) 4
        assert_abs_diff_eq!(value, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_spectral_distortion_matches_skimage_scaling() {
        let ms = MultiBandRaster::from_band(Array2::from_shape_fn((4, 4), |(i, j)| {
            (i * 4 + j) as f32
        }))
        .unwrap();
        let fused = MultiBandRaster::new(ms.data().mapv(|v| 2.0 * v + 5.0)).unwrap();

        // skimage: (normalized_root_mse(fused, ms)) ** 2
        let d_lambda = SpectralDistortionEstimator::new(NrmseNormalization::TestEuclidean)
            .estimate(&fused, &ms)
            .unwrap();
        assert_abs_diff_eq!(d_lambda, 0.3659793814, epsilon = 1e-8);

        let d_lambda = SpectralDistortionEstimator::new(NrmseNormalization::Euclidean)
            .estimate(&fused, &ms)
            .unwrap();
        assert_abs_diff_eq!(d_lambda, 2.2903225806, epsilon = 1e-8);
    }

    #[test]
    fn test_nan_sample_propagates_in_every_mode() {
        let reference = array![[0.0f32, f32::NAN], [10.0, 10.0]];
        let test = array![[1.0f32, 1.0], [1.0, 1.0]];
        for normalization in [
            NrmseNormalization::MinMax,
            NrmseNormalization::Euclidean,
            NrmseNormalization::TestEuclidean,
            NrmseNormalization::Mean,
        ] {
            let value = nrmse(&test.view(), &reference.view(), normalization).unwrap();
            assert!(value.is_nan(), "{:?} gave {}", normalization, value);
        }
    }

    #[test]
    fn test_nrmse_degenerate_reference() {
        let flat = Array2::<f32>::from_elem((4, 4), 3.0);
        assert_eq!(
            nrmse(&flat.view(), &flat.view(), NrmseNormalization::MinMax).unwrap(),
            0.0
        );

        let other = Array2::<f32>::from_elem((4, 4), 4.0);
        assert!(matches!(
            nrmse(&other.view(), &flat.view(), NrmseNormalization::MinMax),
            Err(FusionError::DegenerateRange { .. })
        ));
    }

    #[test]
    fn test_nrmse_shape_mismatch() {
        let a = Array2::<f32>::zeros((4, 4));
        let b = Array2::<f32>::zeros((4, 5));
        assert!(matches!(
            nrmse(&a.view(), &b.view(), NrmseNormalization::MinMax),
            Err(FusionError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_spectral_distortion_averages_bands() {
        let ms = MultiBandRaster::from_bands(vec![
            array![[0.0f32, 10.0], [0.0, 10.0]],
            array![[0.0f32, 4.0], [0.0, 4.0]],
        ])
        .unwrap();
        let fused = MultiBandRaster::from_bands(vec![
            array![[1.0f32, 11.0], [1.0, 11.0]],
            array![[0.0f32, 4.0], [0.0, 4.0]],
        ])
        .unwrap();

        let d_lambda = SpectralDistortionEstimator::default()
            .estimate(&fused, &ms)
            .unwrap();
        // (0.1^2 + 0) / 2
        assert_abs_diff_eq!(d_lambda, 0.005, epsilon = 1e-9);
    }

    #[test]
    fn test_spectral_degenerate_band_is_named() {
        let ms = MultiBandRaster::from_bands(vec![
            array![[0.0f32, 1.0]],
            array![[5.0f32, 5.0]],
        ])
        .unwrap();
        let fused = MultiBandRaster::from_bands(vec![
            array![[0.0f32, 1.0]],
            array![[5.0f32, 6.0]],
        ])
        .unwrap();

        match SpectralDistortionEstimator::default().estimate(&fused, &ms) {
            Err(FusionError::DegenerateRange { reference, band }) => {
                assert_eq!(reference, "ms");
                assert_eq!(band, 1);
            }
            other => panic!("expected degenerate range, got {:?}", other),
        }
    }

    #[test]
    fn test_spatial_distortion_uses_band_mean() {
        let sar = MultiBandRaster::from_bands(vec![
            array![[0.0f32, 8.0], [0.0, 8.0]],
            array![[0.0f32, 12.0], [0.0, 12.0]],
        ])
        .unwrap();
        // sar_mean = [[0, 10], [0, 10]]
        let fused = MultiBandRaster::from_band(array![[1.0f32, 11.0], [1.0, 11.0]]).unwrap();

        let ds = SpatialDistortionEstimator::default()
            .estimate(&fused, &sar)
            .unwrap();
        assert_abs_diff_eq!(ds, 0.01, epsilon = 1e-9);
    }

    #[test]
    fn test_spatial_rejects_grid_mismatch() {
        let sar = MultiBandRaster::from_band(Array2::zeros((3, 3))).unwrap();
        let fused = MultiBandRaster::from_band(Array2::zeros((3, 4))).unwrap();
        assert!(matches!(
            SpatialDistortionEstimator::default().estimate(&fused, &sar),
            Err(FusionError::ShapeMismatch { .. })
        ));
    }
}
