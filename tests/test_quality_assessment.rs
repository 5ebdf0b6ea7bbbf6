use approx::assert_abs_diff_eq;
use ndarray::{Array2, Array3, Axis};
use sarfuse::core::{SpatialDistortionEstimator, SpectralDistortionEstimator};
use sarfuse::{qnr, FusionError, MultiBandRaster, NrmseNormalization, QualityAssessor, QualityParams};

fn textured(bands: usize, height: usize, width: usize, seed: usize) -> MultiBandRaster {
    let data = Array3::from_shape_fn((bands, height, width), |(b, i, j)| {
        let k = (i * 31 + j * 17 + b * 7 + seed * 13) % 23;
        k as f32 + 0.25 * b as f32
    });
    MultiBandRaster::new(data).unwrap()
}

fn permute_bands(raster: &MultiBandRaster, order: &[usize]) -> MultiBandRaster {
    let bands = order.iter().map(|&b| raster.band(b).to_owned()).collect();
    MultiBandRaster::from_bands(bands).unwrap()
}

#[test]
fn test_identity_gives_perfect_score() {
    let band = Array2::from_shape_fn((16, 16), |(i, j)| ((i * 3 + j) % 10) as f32);
    let x = MultiBandRaster::from_bands(vec![band.clone(), band.clone(), band]).unwrap();

    let result = qnr(&x, &x, &x).unwrap();
    assert_abs_diff_eq!(result.d_lambda, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(result.ds, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(result.qnr, 1.0, epsilon = 1e-12);

    let single = MultiBandRaster::from_band(x.band(0).to_owned()).unwrap();
    let result = qnr(&single, &single, &single).unwrap();
    assert_eq!(result.as_tuple(), (1.0, 0.0, 0.0));
}

#[test]
fn test_band_alignment_matters() {
    let fused = textured(3, 12, 12, 1);
    let ms = textured(3, 12, 12, 2);
    let estimator = SpectralDistortionEstimator::default();
    let baseline = estimator.estimate(&fused, &ms).unwrap();

    let order = [2, 0, 1];
    let both = estimator
        .estimate(&permute_bands(&fused, &order), &permute_bands(&ms, &order))
        .unwrap();
    assert_abs_diff_eq!(both, baseline, epsilon = 1e-12);

    let fused_only = estimator
        .estimate(&permute_bands(&fused, &order), &ms)
        .unwrap();
    assert!((fused_only - baseline).abs() > 1e-6);
}

#[test]
fn test_single_band_sar_broadcast() {
    let fused = textured(4, 10, 10, 3);
    let ms = textured(4, 10, 10, 4);
    let sar_single = textured(1, 10, 10, 5);

    let stacked = sar_single
        .data()
        .broadcast((4, 10, 10))
        .unwrap()
        .to_owned();
    let sar_stacked = MultiBandRaster::new(stacked).unwrap();

    let from_single = qnr(&fused, &ms, &sar_single).unwrap();
    let from_stacked = qnr(&fused, &ms, &sar_stacked).unwrap();
    assert_eq!(from_single.ds, from_stacked.ds);
    assert_eq!(from_single.qnr, from_stacked.qnr);

    let ds_direct = SpatialDistortionEstimator::default()
        .estimate(&fused, &sar_stacked)
        .unwrap();
    assert_eq!(ds_direct, from_single.ds);
}

#[test]
fn test_normalization_removes_scale_sensitivity() {
    let ms = textured(3, 14, 14, 6);
    let noise = textured(3, 14, 14, 7).into_data().mapv(|v| v * 0.05);
    let fused = MultiBandRaster::new(ms.data() + &noise).unwrap();
    let sar = textured(1, 14, 14, 8);
    let scaled_ms = MultiBandRaster::new(ms.data().mapv(|v| v * 10.0)).unwrap();

    let raw = QualityAssessor::new();
    let before = raw.assess(&fused, &ms, &sar).unwrap();
    let after = raw.assess(&fused, &scaled_ms, &sar).unwrap();
    // fused no longer matches the rescaled reference
    assert!(after.d_lambda > before.d_lambda);
    assert_eq!(after.ds, before.ds);

    let normalized = QualityAssessor::with_params(QualityParams {
        normalize: true,
        ..QualityParams::default()
    });
    let before = normalized.assess(&fused, &ms, &sar).unwrap();
    let after = normalized.assess(&fused, &scaled_ms, &sar).unwrap();
    assert_abs_diff_eq!(after.d_lambda, before.d_lambda, epsilon = 1e-6);
    assert_abs_diff_eq!(after.qnr, before.qnr, epsilon = 1e-6);
}

#[test]
fn test_shape_mismatch_is_rejected() {
    let _ = env_logger::builder().is_test(true).try_init();

    let fused = MultiBandRaster::new(Array3::zeros((3, 100, 100))).unwrap();
    let ms = MultiBandRaster::new(Array3::zeros((3, 90, 90))).unwrap();
    let sar = MultiBandRaster::new(Array3::zeros((1, 100, 100))).unwrap();

    match qnr(&fused, &ms, &sar) {
        Err(FusionError::ShapeMismatch {
            left,
            left_shape,
            right,
            right_shape,
        }) => {
            assert_eq!(left, "fused");
            assert_eq!(left_shape, vec![3, 100, 100]);
            assert_eq!(right, "ms");
            assert_eq!(right_shape, vec![3, 90, 90]);
        }
        other => panic!("expected ShapeMismatch, got {:?}", other),
    }
}

#[test]
fn test_misaligned_inputs_give_negative_qnr() {
    let ms = textured(2, 8, 8, 9);
    let shifted = ms.data().mapv(|v| v * 3.0 + 40.0);
    let fused = MultiBandRaster::new(shifted).unwrap();

    let result = qnr(&fused, &ms, &ms).unwrap();
    assert!(result.d_lambda > 1.0);
    assert!(result.ds > 1.0);
    assert!(!result.is_plausible());
    // both factors negative: product stays positive but far from 1
    assert!(result.qnr > 0.0);

    let partial = qnr(&fused, &ms, &fused).unwrap();
    assert!(partial.qnr < 0.0);
}

#[test]
fn test_degenerate_reference_band() {
    let mut data = textured(2, 6, 6, 10).into_data();
    data.index_axis_mut(Axis(0), 1).fill(5.0);
    let ms = MultiBandRaster::new(data.clone()).unwrap();

    // identical grids: flat band contributes zero distortion
    assert_eq!(qnr(&ms, &ms, &ms.broadcast_to(2).unwrap()).unwrap().d_lambda, 0.0);

    data.index_axis_mut(Axis(0), 1).fill(6.0);
    let fused = MultiBandRaster::new(data).unwrap();
    assert!(matches!(
        qnr(&fused, &ms, &fused),
        Err(FusionError::DegenerateRange { band: 1, .. })
    ));
}

#[test]
fn test_alternative_normalizations() {
    let fused = textured(2, 9, 9, 11);
    let ms = textured(2, 9, 9, 12);
    let sar = textured(1, 9, 9, 13);

    for normalization in [NrmseNormalization::Euclidean, NrmseNormalization::Mean] {
        let assessor = QualityAssessor::with_params(QualityParams {
            normalization,
            ..QualityParams::default()
        });
        let result = assessor.assess(&fused, &ms, &sar).unwrap();
        assert!(result.d_lambda > 0.0);
        assert_abs_diff_eq!(
            result.qnr,
            (1.0 - result.d_lambda) * (1.0 - result.ds),
            epsilon = 1e-12
        );
    }
}

#[test]
fn test_report_format() {
    let x = textured(1, 4, 4, 0);
    let report = qnr(&x, &x, &x).unwrap().to_string();
    assert_eq!(
        report,
        "QNR: 1.0000\nD_lambda (Spectral distortion): 0.0000\nDS (Spatial distortion): 0.0000"
    );
}
