#![cfg(feature = "rayon")]

use specdetect::{
    Algorithm, Cube, DetectConfig, DetectionResults, Detector, OutputMode, Roi, RunOutcome,
    TargetSignature,
};

fn make_cube(rows: usize, columns: usize, bands: usize) -> Cube<u16> {
    let mut data = Vec::with_capacity(rows * columns * bands);
    for y in 0..rows {
        for x in 0..columns {
            for b in 0..bands {
                let value = ((x * 11) ^ (y * 3) ^ (b * 7) ^ (x * y)) & 0x3FF;
                data.push(value as u16 + 1);
            }
        }
    }
    Cube::new(data, rows, columns, bands).unwrap()
}

fn pixel(cube: &Cube<u16>, row: usize, column: usize) -> Vec<f64> {
    cube.pixel(row, column)
        .unwrap()
        .iter()
        .map(|&v| f64::from(v))
        .collect()
}

fn run(cube: &Cube<u16>, config: DetectConfig, roi: Option<Roi>, targets: &[TargetSignature]) -> DetectionResults {
    let mut detector = Detector::new(cube).with_config(config);
    if let Some(roi) = roi {
        detector = detector.with_roi(roi);
    }
    match detector.run(targets).unwrap() {
        RunOutcome::Completed(results) => results,
        RunOutcome::Aborted => panic!("unexpected abort"),
    }
}

#[test]
fn parallel_matches_sequential_independent() {
    let cube = make_cube(40, 23, 7);
    let targets = [
        TargetSignature::in_scene("a", pixel(&cube, 3, 4)),
        TargetSignature::in_scene("b", pixel(&cube, 30, 17)),
    ];
    let roi = Roi::rect(2, 1, 35, 20).unwrap();

    for algorithm in [Algorithm::Ace, Algorithm::Cem, Algorithm::Sam] {
        let seq = run(
            &cube,
            DetectConfig::new(algorithm).with_threads(1),
            Some(roi.clone()),
            &targets,
        );
        let par = run(
            &cube,
            DetectConfig::new(algorithm).with_threads(6),
            Some(roi.clone()),
            &targets,
        );
        assert_eq!(seq, par, "{}", algorithm.as_str());
    }
}

#[test]
fn parallel_matches_sequential_winner_take_all() {
    let cube = make_cube(32, 32, 5);
    let targets = [
        TargetSignature::in_scene("a", pixel(&cube, 0, 0)),
        TargetSignature::in_scene("b", pixel(&cube, 10, 20)),
        TargetSignature::in_scene("c", pixel(&cube, 31, 5)),
    ];
    for algorithm in [Algorithm::Ace, Algorithm::Sam] {
        let base = DetectConfig::new(algorithm).with_mode(OutputMode::WinnerTakeAll);
        let seq = run(&cube, base.clone().with_threads(1), None, &targets);
        let par = run(&cube, base.with_threads(0), None, &targets);
        assert_eq!(seq, par, "{}", algorithm.as_str());
        assert!(seq.merged().unwrap().labels().iter().any(|&l| l != 0));
    }
}
