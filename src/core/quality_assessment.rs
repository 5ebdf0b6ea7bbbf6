/*!
 * No-reference fusion quality assessment (QNR)
 *
 * QNR = (1 - D_lambda) * (1 - DS), where D_lambda measures the spectral
 * distortion of a fused raster against its multispectral source and DS the
 * spatial distortion against the co-registered SAR raster.
 *
 * Values are not clamped. A distortion above 1 (and therefore a negative QNR)
 * indicates misaligned or mis-scaled inputs rather than a computation error.
 */

use crate::core::distortion::{
    NrmseNormalization, SpatialDistortionEstimator, SpectralDistortionEstimator,
};
use crate::core::normalize::{Normalizer, DEFAULT_EPSILON};
use crate::types::{FusionError, FusionResult, MultiBandRaster, RasterReal};
use serde::{Deserialize, Serialize};
use std::fmt;

/// QNR score and its two distortion components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QnrResult {
    pub qnr: f64,
    pub d_lambda: f64,
    pub ds: f64,
}

impl QnrResult {
    /// (qnr, d_lambda, ds)
    pub fn as_tuple(&self) -> (f64, f64, f64) {
        (self.qnr, self.d_lambda, self.ds)
    }

    /// Both distortions fall inside the nominal [0, 1] interval
    pub fn is_plausible(&self) -> bool {
        (0.0..=1.0).contains(&self.d_lambda) && (0.0..=1.0).contains(&self.ds)
    }
}

impl fmt::Display for QnrResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "QNR: {:.4}", self.qnr)?;
        writeln!(f, "D_lambda (Spectral distortion): {:.4}", self.d_lambda)?;
        write!(f, "DS (Spatial distortion): {:.4}", self.ds)
    }
}

/// Combines the two distortion scalars into the QNR triple
pub struct QnrAggregator;

impl QnrAggregator {
    pub fn aggregate(d_lambda: f64, ds: f64) -> QnrResult {
        let qnr = (1.0 - d_lambda) * (1.0 - ds);
        let result = QnrResult { qnr, d_lambda, ds };

        if !result.is_plausible() || qnr < 0.0 {
            log::warn!(
                "Implausible QNR components (QNR={:.4}, D_lambda={:.4}, DS={:.4}); \
                 inputs are likely misaligned or mis-scaled",
                qnr,
                d_lambda,
                ds
            );
        }

        result
    }
}

/// Quality pipeline parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityParams {
    /// Min-max rescale every band of all three rasters before comparison
    pub normalize: bool,
    /// Denominator used for NRMSE
    pub normalization: NrmseNormalization,
    /// Guard used by the min-max rescale
    pub epsilon: RasterReal,
}

impl Default for QualityParams {
    fn default() -> Self {
        Self {
            normalize: false,
            normalization: NrmseNormalization::MinMax,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

/// Quality-assessment pipeline: validate, broadcast, normalize, estimate, aggregate
#[derive(Debug, Clone, Default)]
pub struct QualityAssessor {
    params: QualityParams,
}

impl QualityAssessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: QualityParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &QualityParams {
        &self.params
    }

    /// Evaluate a fused raster against its multispectral and SAR sources.
    ///
    /// `sar` may have a single band, which is replicated to the fused band count.
    pub fn assess(
        &self,
        fused: &MultiBandRaster,
        ms: &MultiBandRaster,
        sar: &MultiBandRaster,
    ) -> FusionResult<QnrResult> {
        log::info!(
            "Assessing fusion quality: fused {:?}, ms {:?}, sar {:?}",
            fused.dim(),
            ms.dim(),
            sar.dim()
        );

        Self::validate_inputs(fused, ms, sar)?;
        let sar = sar.broadcast_to(fused.band_count())?;

        let spectral = SpectralDistortionEstimator::new(self.params.normalization);
        let spatial = SpatialDistortionEstimator::new(self.params.normalization);

        let (d_lambda, ds) = if self.params.normalize {
            let normalizer = Normalizer::with_epsilon(self.params.epsilon);
            let fused = normalizer.normalize(fused)?;
            let ms = normalizer.normalize(ms)?;
            let sar = normalizer.normalize(&sar)?;
            (spectral.estimate(&fused, &ms)?, spatial.estimate(&fused, &sar)?)
        } else {
            (spectral.estimate(fused, ms)?, spatial.estimate(fused, &sar)?)
        };

        let result = QnrAggregator::aggregate(d_lambda, ds);
        log::info!(
            "QNR = {:.4} (D_lambda = {:.4}, DS = {:.4})",
            result.qnr,
            result.d_lambda,
            result.ds
        );
        Ok(result)
    }

    /// Reject band-count or grid disagreements before any computation
    fn validate_inputs(
        fused: &MultiBandRaster,
        ms: &MultiBandRaster,
        sar: &MultiBandRaster,
    ) -> FusionResult<()> {
        let (fused_bands, height, width) = fused.dim();
        let (ms_bands, ms_height, ms_width) = ms.dim();
        if fused.dim() != ms.dim() {
            return Err(FusionError::shape_mismatch(
                "fused",
                &[fused_bands, height, width],
                "ms",
                &[ms_bands, ms_height, ms_width],
            ));
        }

        let (sar_bands, sar_height, sar_width) = sar.dim();
        if (sar_height, sar_width) != (height, width)
            || (sar_bands != 1 && sar_bands != fused_bands)
        {
            return Err(FusionError::shape_mismatch(
                "fused",
                &[fused_bands, height, width],
                "sar",
                &[sar_bands, sar_height, sar_width],
            ));
        }

        Ok(())
    }
}

/// QNR with default parameters (no normalization, min-max NRMSE)
pub fn qnr(
    fused: &MultiBandRaster,
    ms: &MultiBandRaster,
    sar: &MultiBandRaster,
) -> FusionResult<QnrResult> {
    QualityAssessor::new().assess(fused, ms, sar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    fn ramp(bands: usize, height: usize, width: usize, scale: f32) -> MultiBandRaster {
        let data = Array3::from_shape_fn((bands, height, width), |(b, i, j)| {
            scale * ((b + 1) as f32 + (i * width + j) as f32 * 0.5)
        });
        MultiBandRaster::new(data).unwrap()
    }

    #[test]
    fn test_aggregate() {
        let result = QnrAggregator::aggregate(0.1, 0.2);
        assert_abs_diff_eq!(result.qnr, 0.72, epsilon = 1e-12);
        assert!(result.is_plausible());
    }

    #[test]
    fn test_aggregate_not_clamped() {
        let result = QnrAggregator::aggregate(1.5, 0.2);
        assert!(result.qnr < 0.0);
        assert!(!result.is_plausible());
    }

    #[test]
    fn test_display_four_decimals() {
        let result = QnrResult { qnr: 0.123456, d_lambda: 0.5, ds: 0.25 };
        let text = result.to_string();
        assert!(text.contains("QNR: 0.1235"));
        assert!(text.contains("D_lambda (Spectral distortion): 0.5000"));
        assert!(text.contains("DS (Spatial distortion): 0.2500"));
    }

    #[test]
    fn test_sar_band_count_must_align() {
        let fused = ramp(3, 4, 4, 1.0);
        let sar = ramp(2, 4, 4, 1.0);
        assert!(matches!(
            qnr(&fused, &fused, &sar),
            Err(FusionError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_normalized_pipeline_runs() {
        let fused = ramp(2, 5, 5, 1.0);
        let ms = ramp(2, 5, 5, 3.0);
        let sar = ramp(1, 5, 5, 2.0);
        let assessor = QualityAssessor::with_params(QualityParams {
            normalize: true,
            ..Default::default()
        });
        let result = assessor.assess(&fused, &ms, &sar).unwrap();
        assert_abs_diff_eq!(result.d_lambda, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.qnr, 1.0 - result.ds, epsilon = 1e-9);
    }
}
