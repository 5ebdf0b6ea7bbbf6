//! Core quality-assessment and fusion modules

pub mod normalize;
pub mod distortion;
pub mod quality_assessment;
pub mod wavelet;
pub mod wavelet_fusion;

// Re-export main types
pub use normalize::Normalizer;
pub use distortion::{nrmse, NrmseNormalization, SpectralDistortionEstimator, SpatialDistortionEstimator};
pub use quality_assessment::{qnr, QnrAggregator, QnrResult, QualityAssessor, QualityParams};
pub use wavelet::{
    Wavelet, WaveletCoefficientBundle, WaveletDecomposer, WaveletDecomposition,
    WaveletReconstructor, MAX_DECOMPOSITION_LEVEL,
};
pub use wavelet_fusion::{
    fuse, CoefficientFusionPolicy, MeanMaxFusion, WaveletFusionProcessor, WeightedAverageFusion,
};
