/*!
 * Separable 2D discrete wavelet transform
 *
 * Orthogonal Daubechies/Symlet filter banks with half-sample symmetric
 * boundary extension. For a signal of length N and a filter of length F the
 * forward transform yields floor((N + F - 1) / 2) coefficients per subband and
 * the inverse yields 2n - F + 2 samples, so reconstruction can exceed the
 * decomposed shape and is cropped back to it (top-left aligned).
 *
 * Multi-level decomposition recursively transforms the approximation (LL)
 * subband of the previous level.
 */

use crate::types::{FusionError, FusionResult, RasterBand, RasterReal};
use ndarray::{s, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const HAAR: [f64; 2] = [std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2];

const DB2: [f64; 4] = [
    0.48296291314469025,
    0.836516303737469,
    0.22414386804185735,
    -0.12940952255092145,
];

const DB3: [f64; 6] = [
    0.3326705529509569,
    0.8068915093133388,
    0.4598775021193313,
    -0.13501102001039084,
    -0.08544127388224149,
    0.035226291882100656,
];

const DB4: [f64; 8] = [
    0.23037781330885523,
    0.7148465705525415,
    0.6308807679295904,
    -0.02798376941698385,
    -0.18703481171888114,
    0.030841381835986965,
    0.032883011666982945,
    -0.010597401784997278,
];

const SYM4: [f64; 8] = [
    0.0322231006040427,
    -0.012603967262037833,
    -0.09921954357684722,
    0.29785779560527736,
    0.8037387518059161,
    0.49761866763201545,
    -0.02963552764599851,
    -0.07576571478927333,
];

/// Supported wavelet families (fixed table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Wavelet {
    Haar,
    Db1,
    Db2,
    Db3,
    Db4,
    Sym2,
    Sym3,
    Sym4,
}

impl Default for Wavelet {
    fn default() -> Self {
        Wavelet::Db2
    }
}

impl Wavelet {
    pub const ALL: [Wavelet; 8] = [
        Wavelet::Haar,
        Wavelet::Db1,
        Wavelet::Db2,
        Wavelet::Db3,
        Wavelet::Db4,
        Wavelet::Sym2,
        Wavelet::Sym3,
        Wavelet::Sym4,
    ];

    /// Look up a wavelet by its conventional short name ("haar", "db2", "sym4", ...)
    pub fn from_name(name: &str) -> FusionResult<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|w| w.name() == normalized)
            .ok_or_else(|| {
                FusionError::InvalidParameter(format!(
                    "Unknown wavelet '{}' (supported: haar, db1-db4, sym2-sym4)",
                    name
                ))
            })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Wavelet::Haar => "haar",
            Wavelet::Db1 => "db1",
            Wavelet::Db2 => "db2",
            Wavelet::Db3 => "db3",
            Wavelet::Db4 => "db4",
            Wavelet::Sym2 => "sym2",
            Wavelet::Sym3 => "sym3",
            Wavelet::Sym4 => "sym4",
        }
    }

    /// Reconstruction low-pass (scaling) filter
    pub fn scaling_filter(&self) -> &'static [f64] {
        match self {
            Wavelet::Haar | Wavelet::Db1 => &HAAR,
            // symlets of order 2 and 3 coincide with the Daubechies filters
            Wavelet::Db2 | Wavelet::Sym2 => &DB2,
            Wavelet::Db3 | Wavelet::Sym3 => &DB3,
            Wavelet::Db4 => &DB4,
            Wavelet::Sym4 => &SYM4,
        }
    }

    pub fn filter_length(&self) -> usize {
        self.scaling_filter().len()
    }

    pub fn filter_bank(&self) -> FilterBank {
        FilterBank::from_scaling_filter(self.scaling_filter())
    }

    /// Deepest useful decomposition level for a signal of `length` samples
    pub fn max_level(&self, length: usize) -> usize {
        let filter_length = self.filter_length();
        if filter_length < 2 || length < filter_length - 1 {
            return 0;
        }
        let ratio = length as f64 / (filter_length - 1) as f64;
        ratio.log2().floor() as usize
    }

    /// Number of coefficients per subband for `length` input samples
    pub fn coefficient_length(&self, length: usize) -> usize {
        (length + self.filter_length() - 1) / 2
    }
}

impl fmt::Display for Wavelet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Wavelet {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl TryFrom<String> for Wavelet {
    type Error = FusionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_name(&value)
    }
}

impl From<Wavelet> for String {
    fn from(value: Wavelet) -> Self {
        value.name().to_string()
    }
}

/// Analysis and synthesis filters of an orthogonal wavelet
#[derive(Debug, Clone, PartialEq)]
pub struct FilterBank {
    pub dec_lo: Vec<f64>,
    pub dec_hi: Vec<f64>,
    pub rec_lo: Vec<f64>,
    pub rec_hi: Vec<f64>,
}

impl FilterBank {
    /// Derive the quadrature mirror filters from the scaling filter
    pub fn from_scaling_filter(scaling: &[f64]) -> Self {
        let rec_lo = scaling.to_vec();
        let dec_lo: Vec<f64> = rec_lo.iter().rev().copied().collect();
        let dec_hi: Vec<f64> = rec_lo
            .iter()
            .enumerate()
            .map(|(k, &h)| if k % 2 == 0 { -h } else { h })
            .collect();
        let rec_hi: Vec<f64> = dec_hi.iter().rev().copied().collect();
        Self {
            dec_lo,
            dec_hi,
            rec_lo,
            rec_hi,
        }
    }

    pub fn len(&self) -> usize {
        self.rec_lo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rec_lo.is_empty()
    }
}

/// Mirror an out-of-range index back into [0, n) (half-sample symmetric, period 2n)
fn symmetric_index(index: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = index.rem_euclid(period) as usize;
    if m < n {
        m
    } else {
        2 * n - 1 - m
    }
}

/// Single-level 1D forward transform, returning (approximation, detail)
pub fn dwt_1d(signal: &[f64], bank: &FilterBank) -> (Vec<f64>, Vec<f64>) {
    let n = signal.len();
    let f = bank.len();
    if n == 0 {
        return (Vec::new(), Vec::new());
    }
    let out_len = (n + f - 1) / 2;

    let mut approx = Vec::with_capacity(out_len);
    let mut detail = Vec::with_capacity(out_len);
    for o in 0..out_len {
        let i = (2 * o + 1) as isize;
        let mut lo = 0.0;
        let mut hi = 0.0;
        for j in 0..f {
            let x = signal[symmetric_index(i - j as isize, n)];
            lo += bank.dec_lo[j] * x;
            hi += bank.dec_hi[j] * x;
        }
        approx.push(lo);
        detail.push(hi);
    }
    (approx, detail)
}

/// Single-level 1D inverse transform of 2n - F + 2 samples
pub fn idwt_1d(approx: &[f64], detail: &[f64], bank: &FilterBank) -> FusionResult<Vec<f64>> {
    if approx.len() != detail.len() {
        return Err(FusionError::shape_mismatch(
            "approximation coefficients",
            &[approx.len()],
            "detail coefficients",
            &[detail.len()],
        ));
    }

    let n = approx.len();
    let half = bank.len() / 2;
    if n < half {
        return Err(FusionError::InvalidParameter(format!(
            "{} coefficients are too few for a filter of length {}",
            n,
            bank.len()
        )));
    }

    let mut output = vec![0.0; 2 * (n + 1 - half)];
    for i in (half - 1)..n {
        let o = 2 * (i + 1 - half);
        let mut even = 0.0;
        let mut odd = 0.0;
        for j in 0..half {
            even += bank.rec_lo[2 * j] * approx[i - j] + bank.rec_hi[2 * j] * detail[i - j];
            odd += bank.rec_lo[2 * j + 1] * approx[i - j] + bank.rec_hi[2 * j + 1] * detail[i - j];
        }
        output[o] = even;
        output[o + 1] = odd;
    }
    Ok(output)
}

/// Forward transform of every lane along `axis`
fn analyze_axis(data: &Array2<f64>, axis: Axis, bank: &FilterBank) -> (Array2<f64>, Array2<f64>) {
    let n = data.len_of(axis);
    let out_len = (n + bank.len() - 1) / 2;
    let mut shape = data.raw_dim();
    shape[axis.index()] = out_len;

    let mut approx = Array2::<f64>::zeros(shape);
    let mut detail = Array2::<f64>::zeros(shape);
    for ((lane, mut lo_lane), mut hi_lane) in data
        .lanes(axis)
        .into_iter()
        .zip(approx.lanes_mut(axis))
        .zip(detail.lanes_mut(axis))
    {
        let signal = lane.to_vec();
        let (lo, hi) = dwt_1d(&signal, bank);
        for (dst, src) in lo_lane.iter_mut().zip(lo) {
            *dst = src;
        }
        for (dst, src) in hi_lane.iter_mut().zip(hi) {
            *dst = src;
        }
    }
    (approx, detail)
}

/// Inverse transform of every lane pair along `axis`
fn synthesize_axis(
    approx: &Array2<f64>,
    detail: &Array2<f64>,
    axis: Axis,
    bank: &FilterBank,
) -> FusionResult<Array2<f64>> {
    let n = approx.len_of(axis);
    let half = bank.len() / 2;
    if n < half {
        return Err(FusionError::InvalidParameter(format!(
            "subband of length {} is too short for wavelet filter length {}",
            n,
            bank.len()
        )));
    }
    let mut shape = approx.raw_dim();
    shape[axis.index()] = 2 * (n + 1 - half);

    let mut output = Array2::<f64>::zeros(shape);
    for ((lo_lane, hi_lane), mut out_lane) in approx
        .lanes(axis)
        .into_iter()
        .zip(detail.lanes(axis))
        .zip(output.lanes_mut(axis))
    {
        let samples = idwt_1d(&lo_lane.to_vec(), &hi_lane.to_vec(), bank)?;
        for (dst, src) in out_lane.iter_mut().zip(samples) {
            *dst = src;
        }
    }
    Ok(output)
}

/// One decomposition level of a single-band grid.
///
/// `lh` is high-pass along axis 0 and low-pass along axis 1 (horizontal
/// detail), `hl` the transpose case (vertical detail) and `hh` the diagonal
/// detail. All four subbands share one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveletCoefficientBundle {
    ll: RasterBand,
    lh: RasterBand,
    hl: RasterBand,
    hh: RasterBand,
    source_shape: (usize, usize),
}

impl WaveletCoefficientBundle {
    pub fn new(
        ll: RasterBand,
        lh: RasterBand,
        hl: RasterBand,
        hh: RasterBand,
        source_shape: (usize, usize),
    ) -> FusionResult<Self> {
        for (name, band) in [("LH", &lh), ("HL", &hl), ("HH", &hh)] {
            if band.dim() != ll.dim() {
                return Err(FusionError::shape_mismatch("LL", ll.shape(), name, band.shape()));
            }
        }
        Ok(Self {
            ll,
            lh,
            hl,
            hh,
            source_shape,
        })
    }

    pub fn ll(&self) -> &RasterBand {
        &self.ll
    }

    pub fn lh(&self) -> &RasterBand {
        &self.lh
    }

    pub fn hl(&self) -> &RasterBand {
        &self.hl
    }

    pub fn hh(&self) -> &RasterBand {
        &self.hh
    }

    /// Shape shared by the four subbands
    pub fn subband_shape(&self) -> (usize, usize) {
        self.ll.dim()
    }

    /// Shape of the grid this bundle was decomposed from
    pub fn source_shape(&self) -> (usize, usize) {
        self.source_shape
    }

    /// (LL, LH, HL, HH)
    pub fn into_parts(self) -> (RasterBand, RasterBand, RasterBand, RasterBand) {
        (self.ll, self.lh, self.hl, self.hh)
    }

    /// Fail unless both bundles have identical subband and source shapes
    pub fn ensure_compatible(&self, other: &Self) -> FusionResult<()> {
        if self.subband_shape() != other.subband_shape() {
            return Err(FusionError::shape_mismatch(
                "first coefficient bundle",
                self.ll.shape(),
                "second coefficient bundle",
                other.ll.shape(),
            ));
        }
        if self.source_shape != other.source_shape {
            return Err(FusionError::shape_mismatch(
                "first bundle source grid",
                &[self.source_shape.0, self.source_shape.1],
                "second bundle source grid",
                &[other.source_shape.0, other.source_shape.1],
            ));
        }
        Ok(())
    }
}

/// Single-level 2D forward transform
pub fn dwt2(grid: &ArrayView2<'_, RasterReal>, wavelet: Wavelet) -> FusionResult<WaveletCoefficientBundle> {
    let (rows, cols) = grid.dim();
    if rows == 0 || cols == 0 {
        return Err(FusionError::InvalidParameter(format!(
            "cannot decompose an empty {}x{} grid",
            rows, cols
        )));
    }

    let bank = wavelet.filter_bank();
    let data = grid.mapv(|v| v as f64);

    let (lo_rows, hi_rows) = analyze_axis(&data, Axis(0), &bank);
    let (ll, hl) = analyze_axis(&lo_rows, Axis(1), &bank);
    let (lh, hh) = analyze_axis(&hi_rows, Axis(1), &bank);

    let to_band = |a: Array2<f64>| a.mapv(|v| v as RasterReal);
    WaveletCoefficientBundle::new(to_band(ll), to_band(lh), to_band(hl), to_band(hh), (rows, cols))
}

/// Single-level 2D inverse transform, uncropped
pub fn idwt2(bundle: &WaveletCoefficientBundle, wavelet: Wavelet) -> FusionResult<Array2<f64>> {
    let bank = wavelet.filter_bank();
    let to_f64 = |a: &RasterBand| a.mapv(|v| v as f64);

    let lo_rows = synthesize_axis(&to_f64(&bundle.ll), &to_f64(&bundle.hl), Axis(1), &bank)?;
    let hi_rows = synthesize_axis(&to_f64(&bundle.lh), &to_f64(&bundle.hh), Axis(1), &bank)?;
    synthesize_axis(&lo_rows, &hi_rows, Axis(0), &bank)
}

/// Top-left crop to `shape`
fn crop_to(grid: Array2<f64>, shape: (usize, usize)) -> FusionResult<RasterBand> {
    let (rows, cols) = grid.dim();
    if rows < shape.0 || cols < shape.1 {
        return Err(FusionError::shape_mismatch(
            "reconstructed grid",
            &[rows, cols],
            "source grid",
            &[shape.0, shape.1],
        ));
    }
    Ok(grid.slice(s![..shape.0, ..shape.1]).mapv(|v| v as RasterReal))
}

/// A full multi-level decomposition; `levels[0]` is the finest level
#[derive(Debug, Clone, PartialEq)]
pub struct WaveletDecomposition {
    wavelet: Wavelet,
    levels: Vec<WaveletCoefficientBundle>,
}

impl WaveletDecomposition {
    /// Each level must have been decomposed from the previous level's LL
    pub fn new(wavelet: Wavelet, levels: Vec<WaveletCoefficientBundle>) -> FusionResult<Self> {
        if levels.is_empty() {
            return Err(FusionError::InvalidParameter(
                "decomposition must contain at least one level".to_string(),
            ));
        }
        for pair in levels.windows(2) {
            let (parent, child) = (&pair[0], &pair[1]);
            if parent.subband_shape() != child.source_shape() {
                let (pr, pc) = parent.subband_shape();
                let (cr, cc) = child.source_shape();
                return Err(FusionError::shape_mismatch(
                    "parent LL",
                    &[pr, pc],
                    "child source grid",
                    &[cr, cc],
                ));
            }
        }
        Ok(Self { wavelet, levels })
    }

    pub fn wavelet(&self) -> Wavelet {
        self.wavelet
    }

    pub fn levels(&self) -> &[WaveletCoefficientBundle] {
        &self.levels
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Shape of the original grid
    pub fn source_shape(&self) -> (usize, usize) {
        self.levels[0].source_shape()
    }

    /// Coarsest approximation subband
    pub fn approximation(&self) -> &RasterBand {
        self.levels[self.levels.len() - 1].ll()
    }

    pub fn into_levels(self) -> Vec<WaveletCoefficientBundle> {
        self.levels
    }
}

/// Forward transform with a fixed wavelet and depth
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveletDecomposer {
    wavelet: Wavelet,
    level: usize,
}

impl Default for WaveletDecomposer {
    fn default() -> Self {
        Self {
            wavelet: Wavelet::Db2,
            level: 1,
        }
    }
}

/// Deepest accepted decomposition level; no addressable grid halves further
pub const MAX_DECOMPOSITION_LEVEL: usize = usize::BITS as usize;

impl WaveletDecomposer {
    pub fn new(wavelet: Wavelet, level: usize) -> FusionResult<Self> {
        if level == 0 {
            return Err(FusionError::InvalidParameter(
                "decomposition level must be at least 1".to_string(),
            ));
        }
        if level > MAX_DECOMPOSITION_LEVEL {
            return Err(FusionError::InvalidParameter(format!(
                "decomposition level {} exceeds the maximum of {}",
                level, MAX_DECOMPOSITION_LEVEL
            )));
        }
        Ok(Self { wavelet, level })
    }

    pub fn from_name(wavelet: &str, level: usize) -> FusionResult<Self> {
        Self::new(Wavelet::from_name(wavelet)?, level)
    }

    pub fn wavelet(&self) -> Wavelet {
        self.wavelet
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn decompose(&self, grid: &ArrayView2<'_, RasterReal>) -> FusionResult<WaveletDecomposition> {
        let (rows, cols) = grid.dim();
        log::debug!(
            "Decomposing {}x{} grid with {} to level {}",
            rows,
            cols,
            self.wavelet,
            self.level
        );

        let max_level = self.wavelet.max_level(rows.min(cols));
        if self.level > max_level {
            log::warn!(
                "Level {} exceeds the useful maximum of {} for a {}x{} grid with {}; \
                 coarse levels will be dominated by boundary effects",
                self.level,
                max_level,
                rows,
                cols,
                self.wavelet
            );
        }

        let mut levels = Vec::new();
        let mut bundle = dwt2(grid, self.wavelet)?;
        for _ in 1..self.level {
            let next = dwt2(&bundle.ll().view(), self.wavelet)?;
            levels.push(bundle);
            bundle = next;
        }
        levels.push(bundle);

        WaveletDecomposition::new(self.wavelet, levels)
    }
}

/// Inverse transform with mandatory crop to the decomposed shape
pub struct WaveletReconstructor;

impl WaveletReconstructor {
    /// Invert one level and crop to the bundle's source shape
    pub fn reconstruct_bundle(
        wavelet: Wavelet,
        bundle: &WaveletCoefficientBundle,
    ) -> FusionResult<RasterBand> {
        crop_to(idwt2(bundle, wavelet)?, bundle.source_shape())
    }

    /// Invert every level from the coarsest up, cropping after each one
    pub fn reconstruct(decomposition: &WaveletDecomposition) -> FusionResult<RasterBand> {
        let wavelet = decomposition.wavelet();
        let levels = decomposition.levels();

        let mut approximation = decomposition.approximation().clone();
        for bundle in levels.iter().rev() {
            let current = WaveletCoefficientBundle::new(
                approximation,
                bundle.lh().clone(),
                bundle.hl().clone(),
                bundle.hh().clone(),
                bundle.source_shape(),
            )?;
            approximation = Self::reconstruct_bundle(wavelet, &current)?;
        }

        let (rows, cols) = approximation.dim();
        log::debug!(
            "Reconstructed {}x{} grid from {} level(s) of {}",
            rows,
            cols,
            levels.len(),
            wavelet
        );
        Ok(approximation)
    }
}
