use crate::core::wavelet::{
    Wavelet, WaveletCoefficientBundle, WaveletDecomposer, WaveletDecomposition,
    WaveletReconstructor,
};
use crate::types::{FusionError, FusionResult, RasterBand, RasterReal};
use ndarray::{ArrayView2, Zip};

/// Per-subband merge rule for two coefficient bundles of identical shape
pub trait CoefficientFusionPolicy: Send + Sync {
    fn fuse(
        &self,
        a: &WaveletCoefficientBundle,
        b: &WaveletCoefficientBundle,
    ) -> FusionResult<WaveletCoefficientBundle>;
}

fn zip_map<F>(a: &RasterBand, b: &RasterBand, f: F) -> RasterBand
where
    F: Fn(RasterReal, RasterReal) -> RasterReal,
{
    Zip::from(a).and(b).map_collect(|&x, &y| f(x, y))
}

/// Mean of the approximations, elementwise maximum of the details
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanMaxFusion;

impl CoefficientFusionPolicy for MeanMaxFusion {
    fn fuse(
        &self,
        a: &WaveletCoefficientBundle,
        b: &WaveletCoefficientBundle,
    ) -> FusionResult<WaveletCoefficientBundle> {
        a.ensure_compatible(b)?;

        WaveletCoefficientBundle::new(
            zip_map(a.ll(), b.ll(), |x, y| (x + y) / 2.0),
            zip_map(a.lh(), b.lh(), RasterReal::max),
            zip_map(a.hl(), b.hl(), RasterReal::max),
            zip_map(a.hh(), b.hh(), RasterReal::max),
            a.source_shape(),
        )
    }
}

/// Weighted mean of every subband; `weight_a` applies to the first bundle
#[derive(Debug, Clone, Copy)]
pub struct WeightedAverageFusion {
    weight_a: RasterReal,
}

impl WeightedAverageFusion {
    pub fn new(weight_a: RasterReal) -> FusionResult<Self> {
        if !(0.0..=1.0).contains(&weight_a) {
            return Err(FusionError::InvalidParameter(format!(
                "fusion weight must lie in [0, 1], got {}",
                weight_a
            )));
        }
        Ok(Self { weight_a })
    }
}

impl CoefficientFusionPolicy for WeightedAverageFusion {
    fn fuse(
        &self,
        a: &WaveletCoefficientBundle,
        b: &WaveletCoefficientBundle,
    ) -> FusionResult<WaveletCoefficientBundle> {
        a.ensure_compatible(b)?;

        let wa = self.weight_a;
        let wb = 1.0 - wa;
        let blend = |x: RasterReal, y: RasterReal| wa * x + wb * y;
        WaveletCoefficientBundle::new(
            zip_map(a.ll(), b.ll(), blend),
            zip_map(a.lh(), b.lh(), blend),
            zip_map(a.hl(), b.hl(), blend),
            zip_map(a.hh(), b.hh(), blend),
            a.source_shape(),
        )
    }
}

/// Decompose → fuse → reconstruct for two co-registered single-band grids
pub struct WaveletFusionProcessor {
    decomposer: WaveletDecomposer,
    policy: Box<dyn CoefficientFusionPolicy>,
}

impl WaveletFusionProcessor {
    pub fn new(decomposer: WaveletDecomposer, policy: Box<dyn CoefficientFusionPolicy>) -> Self {
        Self { decomposer, policy }
    }

    /// Default mean/max rules with the given wavelet and depth
    pub fn with_default_policy(wavelet: Wavelet, level: usize) -> FusionResult<Self> {
        Ok(Self::new(
            WaveletDecomposer::new(wavelet, level)?,
            Box::new(MeanMaxFusion),
        ))
    }

    pub fn decomposer(&self) -> &WaveletDecomposer {
        &self.decomposer
    }

    /// Fuse two decompositions level by level
    pub fn fuse_decompositions(
        &self,
        a: &WaveletDecomposition,
        b: &WaveletDecomposition,
    ) -> FusionResult<WaveletDecomposition> {
        if a.wavelet() != b.wavelet() {
            return Err(FusionError::InvalidParameter(format!(
                "cannot fuse {} coefficients with {} coefficients",
                a.wavelet(),
                b.wavelet()
            )));
        }
        if a.level_count() != b.level_count() {
            return Err(FusionError::shape_mismatch(
                "first decomposition levels",
                &[a.level_count()],
                "second decomposition levels",
                &[b.level_count()],
            ));
        }

        let levels = a
            .levels()
            .iter()
            .zip(b.levels())
            .map(|(la, lb)| self.policy.fuse(la, lb))
            .collect::<FusionResult<Vec<_>>>()?;

        WaveletDecomposition::new(a.wavelet(), levels)
    }

    /// Fuse `pc1` with `sar`; the result has the shape of `pc1`
    pub fn fuse(
        &self,
        pc1: &ArrayView2<'_, RasterReal>,
        sar: &ArrayView2<'_, RasterReal>,
    ) -> FusionResult<RasterBand> {
        if pc1.dim() != sar.dim() {
            return Err(FusionError::shape_mismatch(
                "pc1",
                pc1.shape(),
                "sar",
                sar.shape(),
            ));
        }

        let (rows, cols) = pc1.dim();
        log::info!(
            "Wavelet fusion of {}x{} grids ({}, level {})",
            rows,
            cols,
            self.decomposer.wavelet(),
            self.decomposer.level()
        );

        let pc1_coeffs = self.decomposer.decompose(pc1)?;
        let sar_coeffs = self.decomposer.decompose(sar)?;
        let fused_coeffs = self.fuse_decompositions(&pc1_coeffs, &sar_coeffs)?;
        let fused = WaveletReconstructor::reconstruct(&fused_coeffs)?;

        log::info!("Wavelet fusion complete: {:?}", fused.dim());
        Ok(fused)
    }
}

/// Fuse two pre-aligned single-band grids with the default mean/max rules
pub fn fuse(
    pc1: &ArrayView2<'_, RasterReal>,
    sar: &ArrayView2<'_, RasterReal>,
    wavelet_name: &str,
    level: usize,
) -> FusionResult<RasterBand> {
    let wavelet = Wavelet::from_name(wavelet_name)?;
    WaveletFusionProcessor::with_default_policy(wavelet, level)?.fuse(pc1, sar)
}
