use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Barrier, Mutex};
use std::thread;

use specdetect::{
    AbortFlag, Algorithm, BandGrid, Cube, DetectConfig, DetectionResults, Detector, OutputMode,
    ProgressSink, RunState, Severity, SpectralError, TargetSignature, UnitKind, Units,
};

#[derive(Default)]
struct Recorder {
    messages: Mutex<Vec<(String, Severity)>>,
}

impl Recorder {
    fn with_severity(&self, severity: Severity) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| *s == severity)
            .map(|(m, _)| m.clone())
            .collect()
    }
}

impl ProgressSink for Recorder {
    fn report(&self, message: &str, _percent: u8, severity: Severity) {
        self.messages
            .lock()
            .unwrap()
            .push((message.to_owned(), severity));
    }
}

/// Raises the abort flag on the first progress report from a scoring pass.
struct AbortOnFirstRow {
    flag: AbortFlag,
}

impl ProgressSink for AbortOnFirstRow {
    fn report(&self, message: &str, _percent: u8, _severity: Severity) {
        if message.starts_with("Processing Signature") {
            self.flag.abort();
        }
    }
}

/// Parks the first scoring worker until another thread raises the abort flag.
struct AbortHandshake {
    flag: AbortFlag,
    ready: Barrier,
    armed: AtomicBool,
    recorder: Recorder,
}

impl ProgressSink for AbortHandshake {
    fn report(&self, message: &str, percent: u8, severity: Severity) {
        self.recorder.report(message, percent, severity);
        if message.starts_with("Processing Signature") && !self.armed.swap(true, Ordering::SeqCst)
        {
            self.ready.wait();
            while !self.flag.is_set() {
                thread::yield_now();
            }
        }
    }
}

fn varied_cube(rows: usize, columns: usize, bands: usize) -> Cube<f32> {
    let data = (0..rows * columns * bands)
        .map(|i| ((i * 7) % 11) as f32 + 1.0)
        .collect();
    Cube::new(data, rows, columns, bands).unwrap()
}

fn scaled_scene() -> (Cube<f32>, Vec<f64>) {
    let signature = vec![0.2, 0.4, 0.6, 0.8];
    let mut data = Vec::new();
    for scale in [1.0f32, 2.0, 0.5, 3.0] {
        data.extend(signature.iter().map(|&v| v as f32 * scale));
    }
    (Cube::new(data, 2, 2, 4).unwrap(), signature)
}

#[test]
fn single_band_cube_fails_before_scoring() {
    let cube = Cube::new(vec![0.5f32; 9], 3, 3, 1).unwrap();
    let recorder = Recorder::default();
    let detector = Detector::new(&cube)
        .with_config(DetectConfig::new(Algorithm::Ace))
        .with_progress(&recorder);
    let err = detector
        .run(&[TargetSignature::in_scene("p", vec![0.5])])
        .unwrap_err();
    assert_eq!(err, SpectralError::SingleBand);
    assert_eq!(detector.state(), RunState::Failed);
    assert!(recorder
        .messages
        .lock()
        .unwrap()
        .iter()
        .all(|(m, _)| !m.starts_with("Processing")));
    assert_eq!(recorder.with_severity(Severity::Error).len(), 1);
}

#[test]
fn complex_cube_is_rejected() {
    struct ComplexCube(specdetect::CubeDescriptor);

    impl specdetect::CubeAccessor for ComplexCube {
        fn descriptor(&self) -> &specdetect::CubeDescriptor {
            &self.0
        }

        fn read_row(
            &self,
            _row: usize,
            _columns: std::ops::Range<usize>,
            _out: &mut [f64],
        ) -> specdetect::SpectralResult<()> {
            unreachable!("validation runs before any read")
        }
    }

    let cube = ComplexCube(specdetect::CubeDescriptor {
        rows: 2,
        columns: 2,
        bands: 3,
        encoding: specdetect::Encoding::ComplexI16,
        band_grid: None,
        units: None,
    });
    let err = Detector::new(&cube)
        .run(&[TargetSignature::in_scene("p", vec![1.0; 3])])
        .unwrap_err();
    assert_eq!(err, SpectralError::ComplexData);
}

#[test]
fn partial_coverage_warns_and_proceeds() {
    let grid = BandGrid::new(vec![0.40, 0.41, 0.42, 0.90], Vec::new()).unwrap();
    let (cube, _) = scaled_scene();
    let cube = cube.with_band_grid(grid).unwrap();
    let signature = TargetSignature::new("lib", vec![0.40, 0.41, 0.42], vec![0.2, 0.4, 0.6]);
    let recorder = Recorder::default();

    let outcome = Detector::new(&cube)
        .with_config(DetectConfig::new(Algorithm::Sam))
        .with_progress(&recorder)
        .run(&[signature])
        .unwrap();

    assert_eq!(
        recorder.with_severity(Severity::Warning),
        vec!["The spectrum only provides spectral coverage for 3 of 4 bands.".to_owned()]
    );
    let results = outcome.results().unwrap();
    assert_eq!(results.targets().len(), 1);
    // Pixels are scaled copies of the signature on the covered bands.
    assert!(results.targets()[0].raster.as_slice().iter().all(|v| v.abs() < 1e-3));
}

#[test]
fn abort_during_pass_discards_results() {
    let (cube, signature) = scaled_scene();
    let flag = AbortFlag::new();
    let sink = AbortOnFirstRow { flag: flag.clone() };
    let detector = Detector::new(&cube)
        .with_config(DetectConfig::new(Algorithm::Sam).with_threads(2))
        .with_progress(&sink)
        .with_abort(flag.clone());

    let outcome = detector
        .run(&[
            TargetSignature::in_scene("a", signature.clone()),
            TargetSignature::in_scene("b", signature),
        ])
        .unwrap();
    assert!(outcome.is_aborted());
    assert!(outcome.results().is_none());
    assert_eq!(detector.state(), RunState::Aborted);
    assert!(flag.is_set());
}

#[test]
fn abort_from_another_thread_stops_a_parallel_pass() {
    let cube = varied_cube(32, 8, 3);
    let flag = AbortFlag::new();
    let sink = AbortHandshake {
        flag: flag.clone(),
        ready: Barrier::new(2),
        armed: AtomicBool::new(false),
        recorder: Recorder::default(),
    };
    let detector = Detector::new(&cube)
        .with_config(DetectConfig::new(Algorithm::Sam).with_threads(4))
        .with_progress(&sink)
        .with_abort(flag);
    let remote = detector.abort_flag().clone();
    let ready = &sink.ready;

    let outcome = thread::scope(|scope| {
        scope.spawn(move || {
            ready.wait();
            remote.abort();
        });
        detector.run(&[
            TargetSignature::in_scene("a", vec![1.0, 2.0, 3.0]),
            TargetSignature::in_scene("b", vec![3.0, 2.0, 1.0]),
        ])
    })
    .unwrap();

    assert!(outcome.is_aborted());
    assert!(outcome.results().is_none());
    assert_eq!(detector.state(), RunState::Aborted);
    assert_eq!(
        sink.recorder.with_severity(Severity::Abort),
        vec!["User aborted the operation.".to_owned()]
    );
    let messages = sink.recorder.messages.lock().unwrap();
    assert!(messages.iter().all(|(m, _)| m != "Detection complete"));
    assert!(messages
        .iter()
        .all(|(m, _)| !m.starts_with("Processing Signature 2")));
}

#[test]
fn cem_warns_on_non_reflectance_cube() {
    let cube = varied_cube(3, 3, 3).with_units(Units::standard(UnitKind::Radiance));
    let recorder = Recorder::default();
    let outcome = Detector::new(&cube)
        .with_config(DetectConfig::new(Algorithm::Cem))
        .with_progress(&recorder)
        .run(&[TargetSignature::in_scene("t", vec![1.0, 8.0, 4.0])])
        .unwrap();
    assert!(!outcome.is_aborted());
    assert_eq!(
        recorder.with_severity(Severity::Warning),
        vec!["The cube does not contain reflectance data.".to_owned()]
    );

    let reflectance = varied_cube(3, 3, 3).with_units(Units::standard(UnitKind::Reflectance));
    let recorder = Recorder::default();
    Detector::new(&reflectance)
        .with_config(DetectConfig::new(Algorithm::Cem))
        .with_progress(&recorder)
        .run(&[TargetSignature::in_scene("t", vec![1.0, 8.0, 4.0])])
        .unwrap();
    assert!(recorder.with_severity(Severity::Warning).is_empty());
}

#[test]
fn winner_take_all_picks_most_extreme_target() {
    // 1 row x 2 columns x 3 bands; SAM ranks targets by angle.
    let cube = Cube::new(vec![1.0f32, 0.0, 0.0, 0.0, 1.0, 0.0], 1, 2, 3).unwrap();
    let targets = [
        TargetSignature::in_scene("near-x", vec![1.0, 0.1, 0.0]),
        TargetSignature::in_scene("far", vec![0.0, 0.0, 1.0]),
        TargetSignature::in_scene("exact-x", vec![2.0, 0.0, 0.0]),
    ];
    let config = DetectConfig::new(Algorithm::Sam)
        .with_threshold(10.0)
        .with_mode(OutputMode::WinnerTakeAll);
    let outcome = Detector::new(&cube).with_config(config).run(&targets).unwrap();

    let Some(DetectionResults::WinnerTakeAll { merged, name, .. }) = outcome.into_results()
    else {
        panic!("expected merged results");
    };
    assert_eq!(name, "SAM Results");
    assert_eq!(merged.labels(), &[3, 0]);
    assert!(merged.best()[0].abs() < 1e-4);
    assert_eq!(merged.best()[1], 180.0);
    assert_eq!(merged.label_name(3), Some("exact-x"));
}

#[test]
fn winner_take_all_with_one_target_is_independent() {
    let (cube, signature) = scaled_scene();
    let config = DetectConfig::new(Algorithm::Sam).with_mode(OutputMode::WinnerTakeAll);
    let outcome = Detector::new(&cube)
        .with_config(config)
        .run(&[TargetSignature::in_scene("only", signature)])
        .unwrap();
    let results = outcome.results().unwrap();
    assert!(results.merged().is_none());
    assert_eq!(results.targets()[0].name, "SAM Results");
}

#[test]
fn sam_scaled_pixels_all_match() {
    let (cube, signature) = scaled_scene();
    let outcome = Detector::new(&cube)
        .with_config(DetectConfig::new(Algorithm::Sam).with_threshold(90.0))
        .run(&[TargetSignature::in_scene("target", signature)])
        .unwrap();
    let target = &outcome.results().unwrap().targets()[0];
    assert_eq!(target.raster.rows(), 2);
    assert_eq!(target.raster.columns(), 2);
    for &value in target.raster.as_slice() {
        assert!(value.abs() < 1e-3, "angle {value}");
    }
    assert_eq!(target.match_count(), 4);
    assert!(target.mask().iter().all(|&m| m));
}

#[test]
fn missing_statistics_fail_the_run() {
    let (cube, signature) = scaled_scene();
    let err = Detector::new(&cube)
        .with_config(DetectConfig::new(Algorithm::Cem))
        .without_statistics()
        .run(&[TargetSignature::in_scene("t", signature)])
        .unwrap_err();
    assert_eq!(
        err,
        SpectralError::StatisticsUnavailable {
            kind: "second moment"
        }
    );
}

#[test]
fn missing_resampler_fails_only_that_target() {
    let grid = BandGrid::new(vec![0.4, 0.5, 0.6, 0.7], Vec::new()).unwrap();
    let (cube, signature) = scaled_scene();
    let cube = cube.with_band_grid(grid).unwrap();
    let targets = [
        TargetSignature::new("library", vec![0.4, 0.5, 0.6, 0.7], signature.clone()),
        TargetSignature::in_scene("pixel", signature),
    ];
    let recorder = Recorder::default();
    let outcome = Detector::new(&cube)
        .with_config(DetectConfig::new(Algorithm::Sam))
        .without_resampler()
        .with_progress(&recorder)
        .run(&targets)
        .unwrap();
    let results = outcome.results().unwrap();
    assert_eq!(results.targets().len(), 1);
    assert_eq!(results.failures().len(), 1);
    assert_eq!(
        results.failures()[0].error.root(),
        &SpectralError::ResamplerUnavailable
    );
    assert_eq!(recorder.with_severity(Severity::Error).len(), 1);
}
