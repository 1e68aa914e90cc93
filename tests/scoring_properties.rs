use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use specdetect::progress::NullProgress;
use specdetect::score::{score, PassOutcome, ScoreContext};
use specdetect::stats::{extract_subset, SceneStatistics, StatisticsProvider};
use specdetect::{
    AbortFlag, Algorithm, Cube, CubeAccessor, ResampledSignature, Roi, ScoreRaster, StatisticsKind,
};

fn random_cube(rows: usize, columns: usize, bands: usize, seed: u64) -> Cube<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..rows * columns * bands)
        .map(|_| rng.random_range(0.05f32..1.0))
        .collect();
    Cube::new(data, rows, columns, bands).unwrap()
}

fn run(
    cube: &Cube<f32>,
    roi: Option<&Roi>,
    algorithm: Algorithm,
    signature: &ResampledSignature,
    threads: usize,
) -> ScoreRaster {
    let abort = AbortFlag::new();
    let ctx = ScoreContext {
        cube,
        roi,
        abort: &abort,
        progress: &NullProgress,
        threads,
        message: "Scoring",
    };
    let stats = algorithm
        .statistics_kind()
        .map(|kind| SceneStatistics.statistics(cube, None, kind).unwrap());
    let subset = stats
        .as_ref()
        .map(|stats| extract_subset(stats, signature.bands()).unwrap());
    match score(&ctx, algorithm, signature, subset.as_ref()).unwrap() {
        PassOutcome::Completed(raster) => raster,
        PassOutcome::Aborted => panic!("pass aborted without abort request"),
    }
}

fn pixel_signature(cube: &Cube<f32>, row: usize, column: usize) -> ResampledSignature {
    let bands = cube.descriptor().bands;
    let amplitudes = cube
        .pixel(row, column)
        .unwrap()
        .iter()
        .map(|&v| f64::from(v))
        .collect();
    ResampledSignature::new(amplitudes, (0..bands).collect(), bands).unwrap()
}

#[test]
fn unselected_pixels_hold_sentinel_for_every_algorithm() {
    let cube = random_cube(6, 5, 4, 7);
    let mut mask = vec![false; 30];
    for (i, selected) in mask.iter_mut().enumerate() {
        *selected = i % 3 == 0;
    }
    let roi = Roi::from_mask(6, 5, &mask).unwrap();
    let signature = pixel_signature(&cube, 0, 0);

    for algorithm in [Algorithm::Ace, Algorithm::Cem, Algorithm::Sam] {
        let raster = run(&cube, Some(&roi), algorithm, &signature, 3);
        let (row0, col0) = raster.offset();
        for row in 0..raster.rows() {
            for column in 0..raster.columns() {
                let cube_index = (row0 + row) * 5 + col0 + column;
                if !mask[cube_index] {
                    assert_eq!(
                        raster.get(row, column),
                        Some(algorithm.sentinel()),
                        "{} at ({row}, {column})",
                        algorithm.as_str()
                    );
                }
            }
        }
    }
}

#[test]
fn results_are_bit_identical_across_thread_counts() {
    let cube = random_cube(17, 9, 6, 11);
    let signature = ResampledSignature::new(vec![0.3, 0.9, 0.1, 0.5], vec![0, 2, 3, 5], 6).unwrap();
    let available = std::thread::available_parallelism().map_or(4, |n| n.get());

    for algorithm in [Algorithm::Ace, Algorithm::Cem, Algorithm::Sam] {
        let single = run(&cube, None, algorithm, &signature, 1);
        for threads in [2, available, 17] {
            let multi = run(&cube, None, algorithm, &signature, threads);
            let same = single
                .as_slice()
                .iter()
                .zip(multi.as_slice())
                .all(|(a, b)| a.to_bits() == b.to_bits());
            assert!(same, "{} differs with {threads} threads", algorithm.as_str());
        }
        let again = run(&cube, None, algorithm, &signature, 1);
        assert_eq!(single, again);
    }
}

#[test]
fn sam_is_zero_on_the_signature_pixel() {
    let cube = random_cube(4, 4, 5, 3);
    let signature = pixel_signature(&cube, 2, 1);
    let raster = run(&cube, None, Algorithm::Sam, &signature, 2);
    assert!(raster.get(2, 1).unwrap().abs() < 1e-3);
}

#[test]
fn cem_has_unit_response_on_the_signature_pixel() {
    let cube = random_cube(8, 8, 5, 5);
    let signature = pixel_signature(&cube, 3, 6);
    let raster = run(&cube, None, Algorithm::Cem, &signature, 2);
    assert!((raster.get(3, 6).unwrap() - 1.0).abs() < 1e-4);
}

#[test]
fn ace_is_one_on_the_signature_pixel_and_bounded() {
    let cube = random_cube(8, 8, 5, 9);
    let signature = pixel_signature(&cube, 5, 2);
    let raster = run(&cube, None, Algorithm::Ace, &signature, 2);
    assert!((raster.get(5, 2).unwrap() - 1.0).abs() < 1e-4);
    for &value in raster.as_slice() {
        assert!((-1.0 - 1e-4..=1.0 + 1e-4).contains(&value));
    }
}

#[test]
fn partial_band_subset_is_used_for_scoring() {
    let cube = random_cube(6, 6, 5, 21);
    let stats = SceneStatistics
        .statistics(&cube, None, StatisticsKind::SecondMoment)
        .unwrap();
    let subset = extract_subset(&stats, &[1, 3]).unwrap();
    assert_eq!(subset.dim(), 2);
    assert!(!subset.is_full());

    let pixel = cube.pixel(4, 4).unwrap();
    let signature = ResampledSignature::new(
        vec![f64::from(pixel[1]), f64::from(pixel[3])],
        vec![1, 3],
        5,
    )
    .unwrap();
    let raster = run(&cube, None, Algorithm::Cem, &signature, 4);
    assert!((raster.get(4, 4).unwrap() - 1.0).abs() < 1e-4);
}
