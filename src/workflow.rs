//! File-based workflows: config → raster reader → core → report / GeoTIFF

use crate::config::{QnrConfig, WaveletFusionConfig};
use crate::core::quality_assessment::{QnrResult, QualityAssessor};
use crate::core::wavelet_fusion::{MeanMaxFusion, WaveletFusionProcessor};
use crate::io::{RasterReader, RasterWriter};
use crate::types::{FusionResult, RasterBand};

/// Load the fused, multispectral and SAR rasters and compute QNR
pub fn run_quality_assessment(config: &QnrConfig) -> FusionResult<QnrResult> {
    let (fused, _) = RasterReader::read_multiband(&config.fused_path)?;
    let (ms, _) = RasterReader::read_multiband(&config.ms_path)?;
    let (sar, _) = RasterReader::read_multiband(&config.sar_path)?;

    let result = QualityAssessor::with_params(config.quality_params()).assess(&fused, &ms, &sar)?;
    log::info!("Quality report:\n{}", result);
    Ok(result)
}

/// Fuse the configured PC1 and resampled SAR bands and write the result
/// with the PC1 georeferencing
pub fn run_wavelet_fusion(config: &WaveletFusionConfig) -> FusionResult<RasterBand> {
    config.validate()?;

    let (pc1, profile) = RasterReader::read_band(&config.pc1_path, config.pc1_band)?;
    let (sar, _) = RasterReader::read_band(&config.sar_path, config.sar_band)?;

    let processor = WaveletFusionProcessor::new(config.decomposer()?, Box::new(MeanMaxFusion));
    let fused = processor.fuse(&pc1.view(), &sar.view())?;

    RasterWriter::write_band(&config.output_path, &fused, &profile)?;
    Ok(fused)
}
