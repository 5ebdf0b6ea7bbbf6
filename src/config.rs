//! Run configuration for the quality and fusion workflows
//!
//! Paths and parameters are passed in explicitly; nothing in the crate reads
//! module-level paths or the environment.

use crate::core::distortion::NrmseNormalization;
use crate::core::quality_assessment::QualityParams;
use crate::core::wavelet::{Wavelet, WaveletDecomposer};
use crate::types::{FusionError, FusionResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Inputs and options for a QNR evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QnrConfig {
    pub fused_path: PathBuf,
    pub ms_path: PathBuf,
    pub sar_path: PathBuf,
    /// Min-max rescale every band before comparison
    pub normalize: bool,
    pub normalization: NrmseNormalization,
}

impl Default for QnrConfig {
    fn default() -> Self {
        Self {
            fused_path: PathBuf::from("Fused.tif"),
            ms_path: PathBuf::from("MS.tif"),
            sar_path: PathBuf::from("SAR.tif"),
            normalize: false,
            normalization: NrmseNormalization::MinMax,
        }
    }
}

impl QnrConfig {
    pub fn from_json_str(json: &str) -> FusionResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> FusionResult<Self> {
        log::debug!("Loading QNR config from {}", path.as_ref().display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn quality_params(&self) -> QualityParams {
        QualityParams {
            normalize: self.normalize,
            normalization: self.normalization,
            ..QualityParams::default()
        }
    }
}

/// Inputs and options for wavelet fusion of a PC1 raster with a SAR raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveletFusionConfig {
    pub pc1_path: PathBuf,
    /// SAR raster already resampled onto the PC1 grid
    pub sar_path: PathBuf,
    pub output_path: PathBuf,
    pub wavelet: String,
    pub level: usize,
    /// 1-based band index read from `pc1_path`
    pub pc1_band: usize,
    /// 1-based band index read from `sar_path`
    pub sar_band: usize,
}

impl Default for WaveletFusionConfig {
    fn default() -> Self {
        Self {
            pc1_path: PathBuf::from("PC1.tif"),
            sar_path: PathBuf::from("SAR_resampled.tif"),
            output_path: PathBuf::from("new_PC1.tif"),
            wavelet: Wavelet::Db2.name().to_string(),
            level: 1,
            pc1_band: 1,
            sar_band: 1,
        }
    }
}

impl WaveletFusionConfig {
    pub fn from_json_str(json: &str) -> FusionResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> FusionResult<Self> {
        log::debug!("Loading fusion config from {}", path.as_ref().display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> FusionResult<()> {
        self.decomposer()?;
        if self.pc1_band == 0 || self.sar_band == 0 {
            return Err(FusionError::InvalidParameter(format!(
                "band indexes are 1-based (pc1_band = {}, sar_band = {})",
                self.pc1_band, self.sar_band
            )));
        }
        Ok(())
    }

    pub fn decomposer(&self) -> FusionResult<WaveletDecomposer> {
        WaveletDecomposer::from_name(&self.wavelet, self.level)
    }
}
