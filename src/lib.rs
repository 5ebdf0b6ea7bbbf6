//! sarfuse: SAR/optical image fusion and no-reference fusion quality
//!
//! Two independent pipelines over in-memory rasters:
//! - QNR quality assessment of a fused raster against its multispectral and
//!   SAR sources (spectral distortion D_lambda, spatial distortion DS)
//! - wavelet-domain fusion of a principal-component band with a co-registered
//!   SAR band (decompose, merge subbands, reconstruct)

pub mod types;
pub mod config;
pub mod core;
#[cfg(feature = "gdal")]
pub mod io;
#[cfg(feature = "gdal")]
pub mod workflow;

// Re-export main types and functions for easier access
pub use types::{
    FusionError, FusionResult, GeoTransform, MultiBandRaster, RasterBand, RasterCube,
    RasterProfile,
};
pub use config::{QnrConfig, WaveletFusionConfig};
pub use crate::core::{
    fuse, qnr, CoefficientFusionPolicy, MeanMaxFusion, Normalizer, NrmseNormalization,
    QnrResult, QualityAssessor, QualityParams, Wavelet, WaveletDecomposer,
    WaveletFusionProcessor, WaveletReconstructor,
};

#[cfg(feature = "gdal")]
pub use io::{RasterReader, RasterWriter};

/// Python module definition
#[cfg(feature = "python")]
mod python {
    use crate::core::{QualityAssessor, QualityParams, Wavelet};
    use crate::types::{FusionError, MultiBandRaster};
    use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2, PyReadonlyArray3};
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;

    fn to_py_err(err: FusionError) -> PyErr {
        match err {
            FusionError::ShapeMismatch { .. }
            | FusionError::DegenerateRange { .. }
            | FusionError::InvalidParameter(_) => PyValueError::new_err(err.to_string()),
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }

    /// QNR of float32 (bands, height, width) arrays, returned as (qnr, d_lambda, ds)
    #[pyfunction]
    #[pyo3(signature = (fused, ms, sar, normalize = false))]
    fn qnr<'py>(
        fused: PyReadonlyArray3<'py, f32>,
        ms: PyReadonlyArray3<'py, f32>,
        sar: PyReadonlyArray3<'py, f32>,
        normalize: bool,
    ) -> PyResult<(f64, f64, f64)> {
        let fused = MultiBandRaster::new(fused.as_array().to_owned()).map_err(to_py_err)?;
        let ms = MultiBandRaster::new(ms.as_array().to_owned()).map_err(to_py_err)?;
        let sar = MultiBandRaster::new(sar.as_array().to_owned()).map_err(to_py_err)?;

        let assessor = QualityAssessor::with_params(QualityParams {
            normalize,
            ..QualityParams::default()
        });
        assessor
            .assess(&fused, &ms, &sar)
            .map(|result| result.as_tuple())
            .map_err(to_py_err)
    }

    /// Wavelet fusion of two float32 (height, width) arrays
    #[pyfunction]
    #[pyo3(signature = (pc1, sar, wavelet = "db2", level = 1))]
    fn fuse<'py>(
        py: Python<'py>,
        pc1: PyReadonlyArray2<'py, f32>,
        sar: PyReadonlyArray2<'py, f32>,
        wavelet: &str,
        level: usize,
    ) -> PyResult<&'py PyArray2<f32>> {
        let fused = crate::core::fuse(&pc1.as_array(), &sar.as_array(), wavelet, level)
            .map_err(to_py_err)?;
        Ok(fused.into_pyarray(py))
    }

    /// Names accepted by `fuse`
    #[pyfunction]
    fn wavelets() -> Vec<&'static str> {
        Wavelet::ALL.iter().map(|w| w.name()).collect()
    }

    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(qnr, m)?)?;
        m.add_function(wrap_pyfunction!(fuse, m)?)?;
        m.add_function(wrap_pyfunction!(wavelets, m)?)?;
        Ok(())
    }
}
